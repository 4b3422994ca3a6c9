//! Interface to the platform application manager.

use crate::app::types::{AppEventKind, ApplicationInfo};
use crate::error::NativeError;
use std::sync::Arc;

/// Reason code attached to a native application context notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextReason {
    Launched,
    Terminated,
    /// A reason this bridge does not forward
    Other(i32),
}

impl ContextReason {
    pub fn kind(&self) -> Option<AppEventKind> {
        match self {
            ContextReason::Launched => Some(AppEventKind::Launched),
            ContextReason::Terminated => Some(AppEventKind::Terminated),
            ContextReason::Other(_) => None,
        }
    }
}

/// A native "application context changed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextNotification {
    pub app_id: String,
    pub package_id: String,
    pub reason: ContextReason,
}

/// Callback for context notifications. May be called from any thread.
pub type ContextCallback = Arc<dyn Fn(ContextNotification) + Send + Sync>;

/// Identifies one native context listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextRegistration(pub u64);

/// The platform application manager.
pub trait AppManagerBackend: Send + Sync {
    /// Id of the application currently in the foreground.
    fn current_app_id(&self) -> Result<String, NativeError>;

    fn app_info(&self, app_id: &str) -> Result<ApplicationInfo, NativeError>;

    fn installed_apps(&self) -> Result<Vec<ApplicationInfo>, NativeError>;

    fn is_running(&self, app_id: &str) -> Result<bool, NativeError>;

    fn register_context_listener(
        &self,
        callback: ContextCallback,
    ) -> Result<ContextRegistration, NativeError>;

    fn unregister_context_listener(&self, registration: ContextRegistration);
}
