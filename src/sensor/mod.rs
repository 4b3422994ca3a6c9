//! Motion sensor sources.
//!
//! This module defines the reading type, the interface to the platform
//! sensor subsystem, and the subscription that owns one native handle.

pub mod native;
pub mod simulated;
pub mod subscription;
pub mod types;

// Re-export commonly used types
pub use native::{NativeSample, NativeSampleCallback, SamplingOptions, SensorBackend, SensorHandle};
pub use simulated::SimulatedSensorBackend;
pub use subscription::{ListenState, ReadingCallback, SensorSubscription};
pub use types::{SensorReading, SensorType};
