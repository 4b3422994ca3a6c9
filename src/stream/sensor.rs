//! Stream adapter for one sensor channel.

use crate::error::ChannelError;
use crate::sensor::native::{SamplingOptions, SensorBackend};
use crate::sensor::subscription::{ReadingCallback, SensorSubscription};
use crate::sensor::types::{SensorReading, SensorType};
use crate::stats::SharedStats;
use crate::stream::epoch::{EpochSlot, Forwarded};
use crate::stream::sink::EventSink;
use crate::stream::StreamHandler;
use std::sync::Arc;

/// Binds one [`SensorSubscription`] to at most one consumer sink.
pub struct SensorStreamHandler {
    subscription: SensorSubscription,
    slot: Arc<EpochSlot<SensorReading>>,
    stats: SharedStats,
}

impl SensorStreamHandler {
    pub fn new(sensor: SensorType, backend: Arc<dyn SensorBackend>, stats: SharedStats) -> Self {
        Self::with_options(sensor, backend, SamplingOptions::default(), stats)
    }

    pub fn with_options(
        sensor: SensorType,
        backend: Arc<dyn SensorBackend>,
        options: SamplingOptions,
        stats: SharedStats,
    ) -> Self {
        Self {
            subscription: SensorSubscription::with_options(sensor, backend, options),
            slot: Arc::new(EpochSlot::new()),
            stats,
        }
    }

    pub fn sensor(&self) -> SensorType {
        self.subscription.sensor()
    }

    pub fn subscription(&self) -> &SensorSubscription {
        &self.subscription
    }

    /// Whether a sink is currently attached.
    pub fn is_attached(&self) -> bool {
        self.slot.is_attached()
    }
}

impl StreamHandler for SensorStreamHandler {
    type Event = SensorReading;

    fn on_listen(&mut self, sink: Arc<dyn EventSink<SensorReading>>) -> Result<(), ChannelError> {
        let sensor = self.sensor();
        if self.slot.is_attached() {
            tracing::info!(sensor = %sensor, "replacing attached sink");
            self.on_cancel();
        }

        let token = self.slot.attach(sink.clone());
        let slot = self.slot.clone();
        let stats = self.stats.clone();
        let callback: ReadingCallback = Arc::new(move |reading| match slot.forward(token, reading) {
            Forwarded::Delivered => stats.record_reading(),
            Forwarded::Stale => {
                stats.record_stale_callback();
                tracing::trace!(sensor = %sensor, epoch = token.value(), "discarding stale reading");
            }
        });

        if let Err(err) = self.subscription.start(callback) {
            self.slot.detach();
            self.subscription.stop();

            let error = ChannelError::from(&err);
            sink.error(error.clone());
            self.stats.record_stream_error();
            return Err(error);
        }

        tracing::info!(sensor = %sensor, epoch = token.value(), "sensor stream listening");
        Ok(())
    }

    fn on_cancel(&mut self) {
        let detached = self.slot.detach();
        self.subscription.stop();
        if detached.is_some() {
            tracing::info!(sensor = %self.sensor(), "sensor stream cancelled");
        }
    }
}

impl Drop for SensorStreamHandler {
    fn drop(&mut self) {
        self.on_cancel();
    }
}
