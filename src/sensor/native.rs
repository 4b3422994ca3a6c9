//! Interface to the platform sensor subsystem.
//!
//! The bridge never talks to sensor hardware directly. A platform supplies a
//! [`SensorBackend`] that answers capability queries and hands out
//! [`SensorHandle`]s, one per active subscription.

use crate::error::NativeError;
use crate::sensor::types::{SensorReading, SensorType};
use std::sync::Arc;
use std::time::Duration;

/// A raw sample as delivered by the native subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSample {
    /// Per-axis values, in axis order
    pub values: Vec<f64>,
    /// Sample timestamp in microseconds
    pub timestamp_micros: u64,
}

impl NativeSample {
    pub fn new(values: Vec<f64>, timestamp_micros: u64) -> Self {
        Self {
            values,
            timestamp_micros,
        }
    }

    /// Translate into a reading. Samples with fewer than three axes yield `None`.
    pub fn to_reading(&self) -> Option<SensorReading> {
        match self.values.as_slice() {
            [x, y, z, ..] => Some(SensorReading::new(*x, *y, *z, self.timestamp_micros)),
            _ => None,
        }
    }
}

/// Callback invoked by the native subsystem once per sample.
///
/// May be called from any thread.
pub type NativeSampleCallback = Arc<dyn Fn(NativeSample) + Send + Sync>;

/// Options passed to the native listener when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    pub interval: Duration,
}

impl SamplingOptions {
    /// Shortest interval handed to a native listener.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Self::MIN_INTERVAL),
        }
    }
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self::new(Duration::from_millis(60))
    }
}

/// The platform sensor subsystem.
pub trait SensorBackend: Send + Sync {
    /// Whether the device has a sensor of this type.
    fn is_supported(&self, sensor: SensorType) -> Result<bool, NativeError>;

    /// Create a native handle for the default sensor of this type.
    fn open(&self, sensor: SensorType) -> Result<Box<dyn SensorHandle>, NativeError>;
}

/// An owned native sensor listener. Dropping the handle releases it.
pub trait SensorHandle: Send {
    /// Register `callback` and begin sample delivery.
    fn start(
        &mut self,
        options: SamplingOptions,
        callback: NativeSampleCallback,
    ) -> Result<(), NativeError>;

    /// Stop sample delivery.
    ///
    /// A late callback that races this call is tolerated; the stream adapter
    /// discards it.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_translation() {
        let sample = NativeSample::new(vec![0.1, 9.8, -0.2], 42);
        let reading = sample.to_reading().unwrap();
        assert_eq!(reading.x, 0.1);
        assert_eq!(reading.y, 9.8);
        assert_eq!(reading.z, -0.2);
        assert_eq!(reading.timestamp_micros, 42);
    }

    #[test]
    fn test_short_sample_is_rejected() {
        assert!(NativeSample::new(vec![1.0, 2.0], 1).to_reading().is_none());
        assert!(NativeSample::new(vec![], 1).to_reading().is_none());
    }

    #[test]
    fn test_interval_floor() {
        assert_eq!(SamplingOptions::new(Duration::ZERO).interval, SamplingOptions::MIN_INTERVAL);
        assert_eq!(
            SamplingOptions::new(Duration::from_millis(5)).interval,
            Duration::from_millis(5)
        );
        assert_eq!(SamplingOptions::default().interval, Duration::from_millis(60));
    }
}
