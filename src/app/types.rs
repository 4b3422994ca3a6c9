//! Application descriptions and lifecycle events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    #[serde(rename = "appId")]
    pub id: String,
    pub package_id: String,
    pub label: String,
    pub is_running: bool,
    /// Application type reported by the platform (e.g. "native", "web")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub app_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_resource_path: Option<String>,
    /// Hidden from launchers
    #[serde(default)]
    pub is_no_display: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ApplicationInfo {
    /// Create a description with only the core fields set.
    pub fn new(id: impl Into<String>, package_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            package_id: package_id.into(),
            label: label.into(),
            is_running: false,
            app_type: None,
            icon_path: None,
            executable_path: None,
            shared_resource_path: None,
            is_no_display: false,
            metadata: BTreeMap::new(),
        }
    }
}

/// The two lifecycle notifications observed by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppEventKind {
    Launched,
    Terminated,
}

impl std::fmt::Display for AppEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEventKind::Launched => f.write_str("launched"),
            AppEventKind::Terminated => f.write_str("terminated"),
        }
    }
}

/// A lifecycle event for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEvent {
    pub kind: AppEventKind,
    pub app: ApplicationInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_serializes_with_host_field_names() {
        let mut info = ApplicationInfo::new("org.app.x", "org.app", "X");
        info.app_type = Some("native".to_string());
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["appId"], "org.app.x");
        assert_eq!(json["packageId"], "org.app");
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["type"], "native");
        assert!(json.get("iconPath").is_none());
    }
}
