//! Configuration for the device event bridge.

use crate::sensor::native::SamplingOptions;
use crate::sensor::types::SensorType;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sensor channels the CLI listens to by default
    pub sensors: SensorSelection,

    /// Interval requested from native sensor listeners
    #[serde(with = "duration_millis")]
    pub sampling_interval: Duration,

    /// Queued data events a channel sink holds before dropping; unbounded when absent
    pub channel_capacity: Option<NonZeroUsize>,

    /// Default tracing filter when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensors: SensorSelection::default(),
            sampling_interval: Duration::from_millis(60),
            channel_capacity: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("device-event-bridge")
            .join("config.json")
    }

    /// Sampling options for native listeners, with the interval clamped to
    /// [`SamplingOptions::MIN_INTERVAL`].
    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions::new(self.sampling_interval)
    }
}

/// Which sensor channels are selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSelection {
    pub accelerometer: bool,
    pub gyroscope: bool,
    pub linear_acceleration: bool,
    pub magnetometer: bool,
}

impl Default for SensorSelection {
    fn default() -> Self {
        Self {
            accelerometer: true,
            gyroscope: true,
            linear_acceleration: true,
            magnetometer: true,
        }
    }
}

impl SensorSelection {
    /// Parse a selection from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let names: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let all = names.iter().any(|n| n == "all");
        let has = |sensor: SensorType| {
            all || names
                .iter()
                .any(|n| SensorType::from_name(n) == Some(sensor))
        };

        Self {
            accelerometer: has(SensorType::Accelerometer),
            gyroscope: has(SensorType::Gyroscope),
            linear_acceleration: has(SensorType::LinearAcceleration),
            magnetometer: has(SensorType::Magnetometer),
        }
    }

    pub fn contains(&self, sensor: SensorType) -> bool {
        match sensor {
            SensorType::Accelerometer => self.accelerometer,
            SensorType::Gyroscope => self.gyroscope,
            SensorType::LinearAcceleration => self.linear_acceleration,
            SensorType::Magnetometer => self.magnetometer,
        }
    }

    /// Selected sensors in registration order.
    pub fn selected(&self) -> Vec<SensorType> {
        SensorType::ALL
            .into_iter()
            .filter(|s| self.contains(*s))
            .collect()
    }

    pub fn any_enabled(&self) -> bool {
        !self.selected().is_empty()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
