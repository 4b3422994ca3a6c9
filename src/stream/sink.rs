//! Consumer-facing sinks.
//!
//! A sink receives the events of one stream attachment. Sinks are called
//! synchronously from whichever thread produced the event, and must not call
//! back into the stream that feeds them.

use crate::error::ChannelError;
use crate::lock_unpoisoned as lock;
use crate::stats::SharedStats;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Receives success and error events for one stream attachment.
pub trait EventSink<T>: Send + Sync {
    fn success(&self, event: T);
    fn error(&self, error: ChannelError);
}

/// An event as seen by a channel consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    Data(T),
    Error(ChannelError),
}

impl<T> StreamEvent<T> {
    pub fn data(self) -> Option<T> {
        match self {
            StreamEvent::Data(value) => Some(value),
            StreamEvent::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }
}

/// A sink that hands events to a consumer thread over a crossbeam channel.
///
/// Without a capacity nothing is dropped. With one, a data event that finds
/// `capacity` events already queued is dropped rather than blocking the
/// native thread, and counted in the attached stats. Error events are always
/// queued.
pub struct ChannelSink<T> {
    sender: Sender<StreamEvent<T>>,
    capacity: Option<NonZeroUsize>,
    /// Serializes the length check and send of bounded data events
    admit: Mutex<()>,
    stats: Option<SharedStats>,
}

impl<T: Send> ChannelSink<T> {
    /// Create a sink and its receiving end; `capacity` of `None` means unbounded.
    pub fn new(capacity: Option<NonZeroUsize>) -> (Self, Receiver<StreamEvent<T>>) {
        let (sender, receiver) = unbounded();
        let sink = Self {
            sender,
            capacity,
            admit: Mutex::new(()),
            stats: None,
        };
        (sink, receiver)
    }

    pub fn unbounded() -> (Self, Receiver<StreamEvent<T>>) {
        Self::new(None)
    }

    /// Count dropped events in `stats`.
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn deliver_data(&self, event: T) {
        let Some(capacity) = self.capacity else {
            self.send(StreamEvent::Data(event));
            return;
        };
        let _admit = lock(&self.admit);
        if self.sender.len() >= capacity.get() {
            tracing::trace!("channel sink full, dropping event");
            if let Some(ref stats) = self.stats {
                stats.record_dropped_event();
            }
            return;
        }
        self.send(StreamEvent::Data(event));
    }

    fn send(&self, event: StreamEvent<T>) {
        // A disconnected receiver means the consumer has gone; nothing to do.
        let _ = self.sender.send(event);
    }
}

impl<T: Send> EventSink<T> for ChannelSink<T> {
    fn success(&self, event: T) {
        self.deliver_data(event);
    }

    fn error(&self, error: ChannelError) {
        self.send(StreamEvent::Error(error));
    }
}

/// Wraps a sink of `U` so it accepts any `T: Into<U>`.
pub struct IntoSink<U> {
    inner: Arc<dyn EventSink<U>>,
    _marker: PhantomData<fn() -> U>,
}

impl<U> IntoSink<U> {
    pub fn new(inner: Arc<dyn EventSink<U>>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T, U> EventSink<T> for IntoSink<U>
where
    T: Into<U>,
{
    fn success(&self, event: T) {
        self.inner.success(event.into());
    }

    fn error(&self, error: ChannelError) {
        self.inner.error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::create_shared_stats;

    #[test]
    fn test_unbounded_sink_preserves_order() {
        let (sink, receiver) = ChannelSink::<u32>::unbounded();
        for i in 0..5 {
            sink.success(i);
        }
        sink.error(ChannelError::new("1", "boom"));

        let received: Vec<StreamEvent<u32>> = receiver.try_iter().collect();
        assert_eq!(received.len(), 6);
        assert_eq!(received[0], StreamEvent::Data(0));
        assert_eq!(received[4], StreamEvent::Data(4));
        assert!(received[5].is_error());
    }

    #[test]
    fn test_bounded_sink_counts_drops() {
        let stats = create_shared_stats();
        let (sink, receiver) = ChannelSink::<u32>::new(NonZeroUsize::new(2));
        let sink = sink.with_stats(stats.clone());
        for i in 0..5 {
            sink.success(i);
        }
        assert_eq!(receiver.try_iter().count(), 2);
        assert_eq!(stats.snapshot().events_dropped, 3);
    }

    #[test]
    fn test_full_sink_still_queues_errors() {
        let stats = create_shared_stats();
        let (sink, receiver) = ChannelSink::<u32>::new(NonZeroUsize::new(1));
        let sink = sink.with_stats(stats.clone());
        sink.success(1);
        sink.success(2);
        sink.error(ChannelError::new("5", "listener failed"));

        let received: Vec<StreamEvent<u32>> = receiver.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], StreamEvent::Data(1));
        assert!(received[1].is_error());
        assert_eq!(stats.snapshot().events_dropped, 1);
    }

    #[test]
    fn test_bounded_sink_accepts_again_after_drain() {
        let (sink, receiver) = ChannelSink::<u32>::new(NonZeroUsize::new(1));
        sink.success(1);
        sink.success(2);
        assert_eq!(receiver.try_recv().unwrap(), StreamEvent::Data(1));

        sink.success(3);
        assert_eq!(receiver.try_recv().unwrap(), StreamEvent::Data(3));
    }

    #[test]
    fn test_into_sink_converts() {
        let (sink, receiver) = ChannelSink::<u64>::unbounded();
        let inner: Arc<dyn EventSink<u64>> = Arc::new(sink);
        let widened = IntoSink::new(inner);
        EventSink::<u32>::success(&widened, 7u32);
        assert_eq!(receiver.try_recv().unwrap(), StreamEvent::Data(7u64));
    }
}
