//! Integration tests for sensor stream listen/cancel semantics

use device_event_bridge::error::{NativeError, NativeErrorKind};
use device_event_bridge::stats::create_shared_stats;
use device_event_bridge::{
    ChannelSink, NativeSample, SamplingOptions, SensorReading, SensorStreamHandler, SensorType,
    SimulatedSensorBackend, StreamEvent, StreamHandler,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn sample(x: f64, t: u64) -> NativeSample {
    NativeSample::new(vec![x, 0.5, -0.5], t)
}

fn manual_handler(sensor: SensorType) -> (SensorStreamHandler, Arc<SimulatedSensorBackend>) {
    let backend = Arc::new(SimulatedSensorBackend::manual());
    let handler = SensorStreamHandler::new(sensor, backend.clone(), create_shared_stats());
    (handler, backend)
}

#[test]
fn test_readings_arrive_in_native_order() {
    let (mut handler, backend) = manual_handler(SensorType::Accelerometer);
    let (sink, receiver) = ChannelSink::<SensorReading>::unbounded();
    handler.on_listen(Arc::new(sink)).unwrap();

    for (i, x) in [1.0, 2.0, 3.0].into_iter().enumerate() {
        backend.emit(SensorType::Accelerometer, sample(x, i as u64 + 1));
    }

    let readings: Vec<SensorReading> = receiver.try_iter().filter_map(StreamEvent::data).collect();
    assert_eq!(readings.len(), 3);
    assert_eq!(readings[0], SensorReading::new(1.0, 0.5, -0.5, 1));
    assert_eq!(readings[1], SensorReading::new(2.0, 0.5, -0.5, 2));
    assert_eq!(readings[2], SensorReading::new(3.0, 0.5, -0.5, 3));
}

#[test]
fn test_no_readings_after_cancel() {
    let (mut handler, backend) = manual_handler(SensorType::Gyroscope);
    let (sink, receiver) = ChannelSink::<SensorReading>::unbounded();
    handler.on_listen(Arc::new(sink)).unwrap();

    backend.emit(SensorType::Gyroscope, sample(1.0, 1));
    handler.on_cancel();

    // Neither a regular emit nor a callback already in flight may reach the sink.
    assert_eq!(backend.emit(SensorType::Gyroscope, sample(2.0, 2)), 0);
    assert!(backend.deliver_late(SensorType::Gyroscope, sample(3.0, 3)));

    let events: Vec<_> = receiver.try_iter().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_periodic_source_stops_delivering_after_cancel() {
    let backend = Arc::new(SimulatedSensorBackend::periodic());
    let mut handler = SensorStreamHandler::with_options(
        SensorType::Magnetometer,
        backend.clone(),
        SamplingOptions::new(Duration::from_millis(2)),
        create_shared_stats(),
    );
    let (sink, receiver) = ChannelSink::<SensorReading>::unbounded();
    handler.on_listen(Arc::new(sink)).unwrap();

    let first = receiver
        .recv_timeout(Duration::from_secs(2))
        .expect("Expected a reading from the generator");
    assert!(!first.is_error());

    handler.on_cancel();
    while receiver.try_recv().is_ok() {}

    thread::sleep(Duration::from_millis(30));
    assert!(receiver.try_recv().is_err());
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_cancel_without_listen_is_noop() {
    let (mut handler, backend) = manual_handler(SensorType::Magnetometer);
    handler.on_cancel();
    handler.on_cancel();
    assert!(!handler.is_attached());
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_second_listen_replaces_first_sink() {
    let (mut handler, backend) = manual_handler(SensorType::LinearAcceleration);
    let (first, first_rx) = ChannelSink::<SensorReading>::unbounded();
    let (second, second_rx) = ChannelSink::<SensorReading>::unbounded();

    handler.on_listen(Arc::new(first)).unwrap();
    backend.emit(SensorType::LinearAcceleration, sample(1.0, 1));
    handler.on_listen(Arc::new(second)).unwrap();
    backend.emit(SensorType::LinearAcceleration, sample(2.0, 2));

    let first_events: Vec<_> = first_rx.try_iter().collect();
    let second_events: Vec<_> = second_rx.try_iter().collect();
    assert_eq!(first_events.len(), 1);
    assert_eq!(second_events.len(), 1);
    assert_eq!(backend.open_handles(), 1);
}

#[test]
fn test_permission_denied_yields_single_error_event() {
    let (mut handler, backend) = manual_handler(SensorType::Accelerometer);
    backend.fail_next_start(
        SensorType::Accelerometer,
        NativeError::new(5, "permission denied", NativeErrorKind::PermissionDenied),
    );
    let (sink, receiver) = ChannelSink::<SensorReading>::unbounded();

    let err = handler.on_listen(Arc::new(sink)).unwrap_err();
    assert_eq!(err.code, "5");

    let events: Vec<_> = receiver.try_iter().collect();
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error(e) => {
            assert_eq!(e.code, "5");
            assert_eq!(e.message, "permission denied");
        }
        other => panic!("Expected an error event, got {other:?}"),
    }
    assert!(!handler.is_attached());
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_listen_recovers_after_failure() {
    let (mut handler, backend) = manual_handler(SensorType::Accelerometer);
    backend.fail_next_start(
        SensorType::Accelerometer,
        NativeError::new(5, "permission denied", NativeErrorKind::PermissionDenied),
    );
    let (failed, _) = ChannelSink::<SensorReading>::unbounded();
    assert!(handler.on_listen(Arc::new(failed)).is_err());

    let (sink, receiver) = ChannelSink::<SensorReading>::unbounded();
    handler.on_listen(Arc::new(sink)).unwrap();
    backend.emit(SensorType::Accelerometer, sample(1.0, 1));
    assert_eq!(receiver.try_iter().count(), 1);
}

#[test]
fn test_unsupported_sensor_reports_native_code() {
    let backend = Arc::new(SimulatedSensorBackend::manual().without(SensorType::Gyroscope));
    let mut handler =
        SensorStreamHandler::new(SensorType::Gyroscope, backend.clone(), create_shared_stats());
    let (sink, receiver) = ChannelSink::<SensorReading>::unbounded();

    let err = handler.on_listen(Arc::new(sink)).unwrap_err();
    assert_eq!(err.code, NativeError::CODE_NOT_SUPPORTED.to_string());
    assert_eq!(receiver.try_iter().filter(StreamEvent::is_error).count(), 1);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_bounded_sink_drops_overflow() {
    let backend = Arc::new(SimulatedSensorBackend::manual());
    let stats = create_shared_stats();
    let mut handler =
        SensorStreamHandler::new(SensorType::Accelerometer, backend.clone(), stats.clone());
    let (sink, receiver) = ChannelSink::<SensorReading>::new(NonZeroUsize::new(1));
    handler
        .on_listen(Arc::new(sink.with_stats(stats.clone())))
        .unwrap();

    for i in 0..3 {
        backend.emit(SensorType::Accelerometer, sample(i as f64, i));
    }

    assert_eq!(receiver.try_iter().count(), 1);
    assert_eq!(stats.snapshot().events_dropped, 2);
}

#[test]
fn test_failed_listen_reaches_bounded_sink() {
    let (mut handler, backend) = manual_handler(SensorType::Accelerometer);
    backend.fail_next_start(
        SensorType::Accelerometer,
        NativeError::new(5, "permission denied", NativeErrorKind::PermissionDenied),
    );
    let (sink, receiver) = ChannelSink::<SensorReading>::new(NonZeroUsize::new(1));

    let err = handler.on_listen(Arc::new(sink)).unwrap_err();
    assert_eq!(err.code, "5");

    let received: Vec<_> = receiver.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert!(received[0].is_error());
}

#[test]
fn test_drop_releases_native_handle() {
    let (mut handler, backend) = manual_handler(SensorType::Accelerometer);
    let (sink, _receiver) = ChannelSink::<SensorReading>::unbounded();
    handler.on_listen(Arc::new(sink)).unwrap();
    assert_eq!(backend.open_handles(), 1);

    drop(handler);
    assert_eq!(backend.open_handles(), 0);
}
