//! Device Event Bridge - device sensors and application lifecycle for a host application.
//!
//! This library exposes two kinds of device event sources to a host
//! application through named channels:
//!
//! - **Sensor streams**: accelerometer, gyroscope, user acceleration and
//!   magnetometer readings, pushed continuously while a consumer listens
//! - **Application manager**: launched/terminated event streams plus
//!   synchronous application queries
//!
//! # Stream Lifecycle
//!
//! - **Single consumer**: each stream serves at most one sink; a second
//!   listen replaces the first
//! - **Idempotent cancel**: cancelling an idle stream is a no-op
//! - **No stale delivery**: callbacks racing a cancel are discarded by epoch
//! - **No leaked handles**: native handles are released on cancel and on drop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Device Event Bridge                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐          │
//! │  │ SensorBackend│──▶│ Subscription │──▶│ StreamHandler│──▶ sink  │
//! │  └──────────────┘   └──────────────┘   └──────────────┘          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐          │
//! │  │  AppManager  │──▶│   Observer   │──▶│ launch/term. │──▶ sinks │
//! │  └──────────────┘   └──────────────┘   └──────────────┘          │
//! │                            ▲                                      │
//! │                     Registry (channels, methods)                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use device_event_bridge::{
//!     registry, ChannelEvent, ChannelSink, Registry, SamplingOptions, SimulatedAppManager,
//!     SimulatedSensorBackend,
//! };
//! use std::sync::Arc;
//!
//! let stats = device_event_bridge::stats::create_shared_stats();
//! let registry = Registry::new(
//!     Arc::new(SimulatedSensorBackend::periodic()),
//!     Arc::new(SimulatedAppManager::with_demo_apps()),
//!     SamplingOptions::default(),
//!     stats,
//! );
//!
//! let (sink, receiver) = ChannelSink::<ChannelEvent>::unbounded();
//! registry
//!     .listen(registry::ACCELEROMETER_CHANNEL, Arc::new(sink))
//!     .expect("Failed to listen");
//! let _first = receiver.recv();
//! registry.cancel(registry::ACCELEROMETER_CHANNEL).ok();
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod registry;
pub mod sensor;
pub mod stats;
pub mod stream;

// Re-export key types at crate root for convenience
pub use app::{
    AppEvent, AppEventKind, AppEventStreamHandler, AppManagerBackend, ApplicationInfo,
    ApplicationObserver, SimulatedAppManager,
};
pub use config::{Config, ConfigError, SensorSelection};
pub use error::{BridgeError, ChannelError, NativeError, NativeErrorKind};
pub use registry::{ChannelEvent, MethodCall, MethodResult, Registry};
pub use sensor::{
    NativeSample, SamplingOptions, SensorBackend, SensorReading, SensorSubscription, SensorType,
    SimulatedSensorBackend,
};
pub use stats::{BridgeStats, SharedStats, StatsSnapshot};
pub use stream::{ChannelSink, EventSink, SensorStreamHandler, StreamEvent, StreamHandler};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Teardown must still run after a panic on a callback thread.
pub(crate) fn lock_unpoisoned<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
