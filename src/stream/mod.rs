//! Listen/cancel stream semantics over start/stop event sources.
//!
//! A [`StreamHandler`] owns one source and serves at most one consumer sink
//! at a time. A second `on_listen` replaces the attached sink; `on_cancel` is
//! idempotent.

pub mod epoch;
pub mod sensor;
pub mod sink;

use crate::error::ChannelError;
use std::sync::Arc;

pub use epoch::{EpochSlot, EpochToken, Forwarded};
pub use sensor::SensorStreamHandler;
pub use sink::{ChannelSink, EventSink, IntoSink, StreamEvent};

/// A stream that can be listened to and cancelled by a single consumer.
pub trait StreamHandler: Send {
    type Event;

    /// Attach `sink` and begin delivery.
    ///
    /// On failure the sink has already received exactly one error event and
    /// is no longer attached.
    fn on_listen(&mut self, sink: Arc<dyn EventSink<Self::Event>>) -> Result<(), ChannelError>;

    /// Detach the current sink, if any. Never fails.
    fn on_cancel(&mut self);
}
