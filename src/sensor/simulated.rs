//! Simulated sensor subsystem.
//!
//! Used where no platform sensor backend is available, and by the tests.
//! In periodic mode every started handle runs a generator thread that emits
//! synthetic motion samples at the requested interval. In manual mode nothing
//! is generated; samples are pushed with [`SimulatedSensorBackend::emit`].

use crate::error::{NativeError, NativeErrorKind};
use crate::lock_unpoisoned as lock;
use crate::sensor::native::{
    NativeSample, NativeSampleCallback, SamplingOptions, SensorBackend, SensorHandle,
};
use crate::sensor::types::SensorType;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Periodic,
    Manual,
}

#[derive(Default)]
struct Shared {
    pending_failures: Mutex<HashMap<SensorType, NativeError>>,
    /// Started manual-mode listeners by handle id
    listeners: Mutex<HashMap<u64, (SensorType, NativeSampleCallback)>>,
    /// Most recent manual-mode callback per sensor, kept after stop
    last_callbacks: Mutex<HashMap<SensorType, NativeSampleCallback>>,
    open_handles: AtomicUsize,
    next_id: AtomicU64,
}

/// A sensor backend that fabricates samples.
pub struct SimulatedSensorBackend {
    mode: Mode,
    supported: HashSet<SensorType>,
    shared: Arc<Shared>,
}

impl SimulatedSensorBackend {
    /// A backend whose handles generate samples on a background thread.
    pub fn periodic() -> Self {
        Self::with_mode(Mode::Periodic)
    }

    /// A backend that only delivers samples passed to [`emit`](Self::emit).
    pub fn manual() -> Self {
        Self::with_mode(Mode::Manual)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            supported: SensorType::ALL.into_iter().collect(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Report `sensor` as absent from the device.
    pub fn without(mut self, sensor: SensorType) -> Self {
        self.supported.remove(&sensor);
        self
    }

    /// Make the next native listener start for `sensor` fail with `error`.
    pub fn fail_next_start(&self, sensor: SensorType, error: NativeError) {
        lock(&self.shared.pending_failures).insert(sensor, error);
    }

    /// Deliver `sample` synchronously to every started listener for `sensor`.
    ///
    /// Returns the number of listeners the sample reached.
    pub fn emit(&self, sensor: SensorType, sample: NativeSample) -> usize {
        let callbacks: Vec<NativeSampleCallback> = lock(&self.shared.listeners)
            .values()
            .filter(|(s, _)| *s == sensor)
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in &callbacks {
            callback(sample.clone());
        }
        callbacks.len()
    }

    /// Invoke the last callback registered for `sensor`, even if its handle
    /// has been stopped. Models a native callback that was already in flight
    /// when the listener was torn down.
    ///
    /// Only manual-mode listeners are remembered; a periodic backend always
    /// returns `false`.
    pub fn deliver_late(&self, sensor: SensorType, sample: NativeSample) -> bool {
        let callback = lock(&self.shared.last_callbacks).get(&sensor).cloned();
        match callback {
            Some(callback) => {
                callback(sample);
                true
            }
            None => false,
        }
    }

    /// Number of native handles currently alive.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }

    /// Number of started listeners in manual mode.
    pub fn active_listeners(&self) -> usize {
        lock(&self.shared.listeners).len()
    }
}

impl SensorBackend for SimulatedSensorBackend {
    fn is_supported(&self, sensor: SensorType) -> Result<bool, NativeError> {
        Ok(self.supported.contains(&sensor))
    }

    fn open(&self, sensor: SensorType) -> Result<Box<dyn SensorHandle>, NativeError> {
        if !self.supported.contains(&sensor) {
            return Err(NativeError::not_supported(format!("no {sensor} sensor")));
        }
        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedHandle {
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            sensor,
            mode: self.mode,
            shared: self.shared.clone(),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }))
    }
}

struct SimulatedHandle {
    id: u64,
    sensor: SensorType,
    mode: Mode,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SensorHandle for SimulatedHandle {
    fn start(
        &mut self,
        options: SamplingOptions,
        callback: NativeSampleCallback,
    ) -> Result<(), NativeError> {
        if let Some(err) = lock(&self.shared.pending_failures).remove(&self.sensor) {
            return Err(err);
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                16,
                "listener already started",
                NativeErrorKind::Other,
            ));
        }
        self.running.store(true, Ordering::SeqCst);

        match self.mode {
            Mode::Manual => {
                lock(&self.shared.last_callbacks).insert(self.sensor, callback.clone());
                lock(&self.shared.listeners).insert(self.id, (self.sensor, callback));
            }
            Mode::Periodic => {
                let running = self.running.clone();
                let sensor = self.sensor;
                let handle = thread::spawn(move || {
                    let mut tick: u64 = 0;
                    while running.load(Ordering::SeqCst) {
                        callback(synthesize(sensor, tick));
                        tick += 1;
                        thread::sleep(options.interval);
                    }
                });
                self.thread_handle = Some(handle);
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        lock(&self.shared.listeners).remove(&self.id);
        if let Some(handle) = self.thread_handle.take() {
            // The generator exits after its current sleep
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        self.stop();
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Produce a plausible sample for `sensor` at step `tick`.
fn synthesize(sensor: SensorType, tick: u64) -> NativeSample {
    let t = tick as f64 * 0.1;
    let values = match sensor {
        SensorType::Accelerometer => {
            vec![0.4 * t.sin(), 0.4 * t.cos(), 9.81 + 0.05 * (3.0 * t).sin()]
        }
        SensorType::Gyroscope => vec![0.02 * t.cos(), 0.01 * t.sin(), 0.005 * (2.0 * t).sin()],
        SensorType::LinearAcceleration => {
            vec![0.4 * t.sin(), 0.4 * t.cos(), 0.05 * (3.0 * t).sin()]
        }
        SensorType::Magnetometer => vec![22.0 + t.sin(), -5.0 + t.cos(), 41.0],
    };
    NativeSample::new(values, Utc::now().timestamp_micros().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unsupported_sensor_cannot_open() {
        let backend = SimulatedSensorBackend::manual().without(SensorType::Gyroscope);
        assert!(!backend.is_supported(SensorType::Gyroscope).unwrap());
        assert!(backend.open(SensorType::Gyroscope).is_err());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_manual_emit_reaches_started_listener_only() {
        let backend = SimulatedSensorBackend::manual();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut handle = backend.open(SensorType::Accelerometer).unwrap();

        assert_eq!(backend.emit(SensorType::Accelerometer, NativeSample::new(vec![0.0; 3], 1)), 0);

        handle
            .start(
                SamplingOptions::default(),
                Arc::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(backend.emit(SensorType::Accelerometer, NativeSample::new(vec![0.0; 3], 2)), 1);
        assert_eq!(backend.emit(SensorType::Gyroscope, NativeSample::new(vec![0.0; 3], 3)), 0);

        handle.stop();
        assert_eq!(backend.emit(SensorType::Accelerometer, NativeSample::new(vec![0.0; 3], 4)), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_periodic_generator_stops_on_stop() {
        let backend = SimulatedSensorBackend::periodic();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut handle = backend.open(SensorType::Magnetometer).unwrap();
        handle
            .start(
                SamplingOptions::new(Duration::from_millis(1)),
                Arc::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(30));
        handle.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_periodic_listener_is_not_kept_for_late_delivery() {
        let backend = SimulatedSensorBackend::periodic();
        let mut handle = backend.open(SensorType::Gyroscope).unwrap();
        handle
            .start(SamplingOptions::new(Duration::from_millis(5)), Arc::new(|_| {}))
            .unwrap();
        handle.stop();

        let sample = NativeSample::new(vec![0.0; 3], 1);
        assert!(!backend.deliver_late(SensorType::Gyroscope, sample));
    }

    #[test]
    fn test_manual_listener_is_kept_for_late_delivery() {
        let backend = SimulatedSensorBackend::manual();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut handle = backend.open(SensorType::Gyroscope).unwrap();
        handle
            .start(
                SamplingOptions::default(),
                Arc::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        handle.stop();

        assert!(backend.deliver_late(SensorType::Gyroscope, NativeSample::new(vec![0.0; 3], 1)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_synthetic_accelerometer_includes_gravity() {
        let reading = synthesize(SensorType::Accelerometer, 0).to_reading().unwrap();
        assert!(reading.z > 9.0);
    }
}
