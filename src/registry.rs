//! Channel registry and request dispatch.
//!
//! The registry is built once at startup. It owns one stream handler per
//! stream channel and one handler per request method, and is handed to
//! whatever transport connects the bridge to the host application. Channel
//! identifiers are fixed for the lifetime of the registry.

use crate::app::native::AppManagerBackend;
use crate::app::observer::ApplicationObserver;
use crate::app::stream::AppEventStreamHandler;
use crate::app::types::{AppEvent, AppEventKind};
use crate::error::{BridgeError, ChannelError};
use crate::lock_unpoisoned;
use crate::sensor::native::{SamplingOptions, SensorBackend};
use crate::sensor::types::{SensorReading, SensorType};
use crate::stats::SharedStats;
use crate::stream::sensor::SensorStreamHandler;
use crate::stream::sink::{EventSink, IntoSink};
use crate::stream::StreamHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const ACCELEROMETER_CHANNEL: &str = "device_bridge/sensors/accelerometer";
pub const GYROSCOPE_CHANNEL: &str = "device_bridge/sensors/gyroscope";
pub const USER_ACCEL_CHANNEL: &str = "device_bridge/sensors/user_accel";
pub const MAGNETOMETER_CHANNEL: &str = "device_bridge/sensors/magnetometer";
pub const APP_LAUNCHED_CHANNEL: &str = "device_bridge/app_manager/launch_event";
pub const APP_TERMINATED_CHANNEL: &str = "device_bridge/app_manager/terminate_event";

/// Request channel carrying the application manager methods.
pub const APP_MANAGER_CHANNEL: &str = "device_bridge/app_manager";

/// Request method names.
pub mod methods {
    pub const GET_CURRENT_APP_ID: &str = "getCurrentAppId";
    pub const GET_APP_INFO: &str = "getAppInfo";
    pub const GET_INSTALLED_APPS: &str = "getInstalledApps";
    pub const IS_RUNNING: &str = "isRunning";
}

/// Argument key carrying the application id.
pub const APP_ID_ARGUMENT: &str = "appId";

/// Channel identifier for a sensor stream.
pub fn sensor_channel(sensor: SensorType) -> &'static str {
    match sensor {
        SensorType::Accelerometer => ACCELEROMETER_CHANNEL,
        SensorType::Gyroscope => GYROSCOPE_CHANNEL,
        SensorType::LinearAcceleration => USER_ACCEL_CHANNEL,
        SensorType::Magnetometer => MAGNETOMETER_CHANNEL,
    }
}

/// Channel identifier for an application event stream.
pub fn app_event_channel(kind: AppEventKind) -> &'static str {
    match kind {
        AppEventKind::Launched => APP_LAUNCHED_CHANNEL,
        AppEventKind::Terminated => APP_TERMINATED_CHANNEL,
    }
}

/// Any value delivered on a stream channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelEvent {
    Reading(SensorReading),
    App(AppEvent),
}

impl From<SensorReading> for ChannelEvent {
    fn from(reading: SensorReading) -> Self {
        ChannelEvent::Reading(reading)
    }
}

impl From<AppEvent> for ChannelEvent {
    fn from(event: AppEvent) -> Self {
        ChannelEvent::App(event)
    }
}

/// A request to the application manager channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

pub type MethodResult = Result<Value, ChannelError>;

type MethodHandler = fn(&ApplicationObserver, &Value) -> Result<Value, BridgeError>;

type ChannelHandler = Box<dyn StreamHandler<Event = ChannelEvent>>;

/// Presents a typed stream handler as a `ChannelEvent` stream.
struct ChannelStream<H>(H);

impl<H> StreamHandler for ChannelStream<H>
where
    H: StreamHandler,
    H::Event: Into<ChannelEvent> + 'static,
{
    type Event = ChannelEvent;

    fn on_listen(&mut self, sink: Arc<dyn EventSink<ChannelEvent>>) -> Result<(), ChannelError> {
        self.0.on_listen(Arc::new(IntoSink::new(sink)))
    }

    fn on_cancel(&mut self) {
        self.0.on_cancel();
    }
}

/// Maps channel identifiers and method names to their handlers.
pub struct Registry {
    streams: BTreeMap<&'static str, Mutex<ChannelHandler>>,
    methods: BTreeMap<&'static str, MethodHandler>,
    observer: Arc<ApplicationObserver>,
    stats: SharedStats,
}

impl Registry {
    pub fn new(
        sensor_backend: Arc<dyn SensorBackend>,
        app_backend: Arc<dyn AppManagerBackend>,
        options: SamplingOptions,
        stats: SharedStats,
    ) -> Self {
        let mut streams: BTreeMap<&'static str, Mutex<ChannelHandler>> = BTreeMap::new();

        for sensor in SensorType::ALL {
            let handler = SensorStreamHandler::with_options(
                sensor,
                sensor_backend.clone(),
                options,
                stats.clone(),
            );
            let handler: ChannelHandler = Box::new(ChannelStream(handler));
            streams.insert(sensor_channel(sensor), Mutex::new(handler));
        }

        let observer = Arc::new(ApplicationObserver::new(app_backend, stats.clone()));
        for kind in [AppEventKind::Launched, AppEventKind::Terminated] {
            let handler = AppEventStreamHandler::new(kind, observer.clone());
            let handler: ChannelHandler = Box::new(ChannelStream(handler));
            streams.insert(app_event_channel(kind), Mutex::new(handler));
        }

        let mut handlers: BTreeMap<&'static str, MethodHandler> = BTreeMap::new();
        handlers.insert(methods::GET_CURRENT_APP_ID, get_current_app_id);
        handlers.insert(methods::GET_APP_INFO, get_app_info);
        handlers.insert(methods::GET_INSTALLED_APPS, get_installed_apps);
        handlers.insert(methods::IS_RUNNING, is_running);

        tracing::debug!(
            streams = streams.len(),
            methods = handlers.len(),
            "channel registry built"
        );

        Self {
            streams,
            methods: handlers,
            observer,
            stats,
        }
    }

    /// Registered stream channel identifiers.
    pub fn stream_channels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.streams.keys().copied()
    }

    /// Registered request method names.
    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    /// The observer shared by the application event channels.
    pub fn observer(&self) -> &Arc<ApplicationObserver> {
        &self.observer
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Begin delivery on `channel` to `sink`.
    ///
    /// On failure `sink` has received exactly one error event.
    pub fn listen(
        &self,
        channel: &str,
        sink: Arc<dyn EventSink<ChannelEvent>>,
    ) -> Result<(), ChannelError> {
        let Some(handler) = self.streams.get(channel) else {
            let error = ChannelError::from(BridgeError::UnknownChannel(channel.to_string()));
            sink.error(error.clone());
            self.stats.record_stream_error();
            return Err(error);
        };
        lock_unpoisoned(handler).on_listen(sink)
    }

    /// End delivery on `channel`. Cancelling an idle channel is a no-op.
    pub fn cancel(&self, channel: &str) -> Result<(), ChannelError> {
        let handler = self
            .streams
            .get(channel)
            .ok_or_else(|| ChannelError::from(BridgeError::UnknownChannel(channel.to_string())))?;
        lock_unpoisoned(handler).on_cancel();
        Ok(())
    }

    /// Dispatch a request method.
    pub fn invoke(&self, call: &MethodCall) -> MethodResult {
        let result = match self.methods.get(call.method.as_str()) {
            Some(handler) => handler(&self.observer, &call.arguments),
            None => Err(BridgeError::NotImplemented(call.method.clone())),
        };
        self.stats.record_query(result.is_ok());
        result.map_err(|e| {
            tracing::debug!(method = %call.method, error = %e, "method call failed");
            ChannelError::from(e)
        })
    }
}

fn app_id_argument(arguments: &Value) -> Result<&str, BridgeError> {
    arguments
        .get(APP_ID_ARGUMENT)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            BridgeError::InvalidArgument(format!("missing string argument '{APP_ID_ARGUMENT}'"))
        })
}

fn encode<T: Serialize>(value: T) -> Result<Value, BridgeError> {
    serde_json::to_value(value).map_err(|e| BridgeError::Encoding(e.to_string()))
}

fn get_current_app_id(
    observer: &ApplicationObserver,
    _arguments: &Value,
) -> Result<Value, BridgeError> {
    Ok(Value::String(observer.current_foreground_id()?))
}

fn get_app_info(observer: &ApplicationObserver, arguments: &Value) -> Result<Value, BridgeError> {
    let app_id = app_id_argument(arguments)?;
    encode(observer.info(app_id)?)
}

fn get_installed_apps(
    observer: &ApplicationObserver,
    _arguments: &Value,
) -> Result<Value, BridgeError> {
    encode(observer.list_installed()?)
}

fn is_running(observer: &ApplicationObserver, arguments: &Value) -> Result<Value, BridgeError> {
    let app_id = app_id_argument(arguments)?;
    Ok(Value::Bool(observer.is_running(app_id)?))
}
