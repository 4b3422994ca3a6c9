//! Ownership of one native sensor handle.
//!
//! A [`SensorSubscription`] acquires its native handle lazily on `start`,
//! translates each native sample into a [`SensorReading`] and hands it to the
//! registered callback on the native thread. The handle is released on `stop`
//! or when the subscription is dropped.

use crate::error::{BridgeError, NativeError};
use crate::sensor::native::{
    NativeSample, NativeSampleCallback, SamplingOptions, SensorBackend, SensorHandle,
};
use crate::sensor::types::{SensorReading, SensorType};
use std::sync::Arc;

/// Callback receiving translated readings.
pub type ReadingCallback = Arc<dyn Fn(SensorReading) + Send + Sync>;

/// Listen state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    /// No native handle held.
    Idle,
    /// Native listener started.
    Listening,
    /// Handle acquired but the native listener refused to start.
    Failed,
}

/// One sensor type bound to at most one native handle.
///
/// Invariant: a native handle is held iff the state is not [`ListenState::Idle`].
pub struct SensorSubscription {
    sensor: SensorType,
    backend: Arc<dyn SensorBackend>,
    options: SamplingOptions,
    handle: Option<Box<dyn SensorHandle>>,
    state: ListenState,
    last_error: Option<BridgeError>,
}

impl SensorSubscription {
    pub fn new(sensor: SensorType, backend: Arc<dyn SensorBackend>) -> Self {
        Self::with_options(sensor, backend, SamplingOptions::default())
    }

    pub fn with_options(
        sensor: SensorType,
        backend: Arc<dyn SensorBackend>,
        options: SamplingOptions,
    ) -> Self {
        Self {
            sensor,
            backend,
            options,
            handle: None,
            state: ListenState::Idle,
            last_error: None,
        }
    }

    pub fn sensor(&self) -> SensorType {
        self.sensor
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    /// Whether a native handle is currently held.
    pub fn holds_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Acquire the native handle and begin delivering readings to `callback`.
    ///
    /// A failure is recorded and retrievable through [`last_error`](Self::last_error).
    /// There is no internal retry.
    pub fn start(&mut self, callback: ReadingCallback) -> Result<(), BridgeError> {
        if self.state == ListenState::Listening {
            let err = BridgeError::AlreadyAttached;
            self.last_error = Some(err.clone());
            return Err(err);
        }
        // A handle left over from a failed attempt is released before retrying.
        self.stop();

        match self.acquire(callback) {
            Ok(()) => {
                self.state = ListenState::Listening;
                self.last_error = None;
                tracing::debug!(sensor = %self.sensor, "sensor listener started");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(sensor = %self.sensor, error = %err, "sensor listener failed to start");
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn acquire(&mut self, callback: ReadingCallback) -> Result<(), BridgeError> {
        let supported = self
            .backend
            .is_supported(self.sensor)
            .map_err(BridgeError::from_native)?;
        if !supported {
            return Err(BridgeError::from_native(NativeError::not_supported(format!(
                "{} is not supported on this device",
                self.sensor
            ))));
        }

        let mut handle = self
            .backend
            .open(self.sensor)
            .map_err(BridgeError::from_native)?;

        let sensor = self.sensor;
        let native_callback: NativeSampleCallback =
            Arc::new(move |sample: NativeSample| match sample.to_reading() {
                Some(reading) => callback(reading),
                None => tracing::warn!(
                    sensor = %sensor,
                    axes = sample.values.len(),
                    "discarding malformed sample"
                ),
            });

        let started = handle.start(self.options, native_callback);
        self.handle = Some(handle);
        match started {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = ListenState::Failed;
                Err(BridgeError::from_native(e))
            }
        }
    }

    /// Release the native handle, if held. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
            tracing::debug!(sensor = %self.sensor, "sensor handle released");
        }
        self.state = ListenState::Idle;
    }

    /// The error recorded by the most recent failed `start`.
    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
