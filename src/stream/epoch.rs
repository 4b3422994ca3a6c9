//! Epoch-guarded sink slot.
//!
//! Native callbacks may still be running when a stream is cancelled. Every
//! attach and detach advances the slot's epoch; a callback carries the token
//! it was registered with and is discarded once the epoch has moved on.
//! Forwarding happens under the slot lock, so once `detach` returns no
//! callback can reach the detached sink.

use crate::error::ChannelError;
use crate::lock_unpoisoned;
use crate::stream::sink::EventSink;
use std::sync::{Arc, Mutex};

/// The epoch a callback was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochToken(u64);

impl EpochToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Outcome of forwarding an event through the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    Delivered,
    /// The token is from an earlier attachment; the event was discarded.
    Stale,
}

struct SlotState<T> {
    epoch: u64,
    sink: Option<Arc<dyn EventSink<T>>>,
}

/// Holds at most one sink together with the current epoch.
pub struct EpochSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> EpochSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                epoch: 0,
                sink: None,
            }),
        }
    }

    /// Install `sink` under a fresh epoch, replacing any previous sink.
    pub fn attach(&self, sink: Arc<dyn EventSink<T>>) -> EpochToken {
        let mut state = lock_unpoisoned(&self.state);
        state.epoch += 1;
        state.sink = Some(sink);
        EpochToken(state.epoch)
    }

    /// Remove the sink and invalidate all outstanding tokens.
    pub fn detach(&self) -> Option<Arc<dyn EventSink<T>>> {
        let mut state = lock_unpoisoned(&self.state);
        state.epoch += 1;
        state.sink.take()
    }

    pub fn is_attached(&self) -> bool {
        lock_unpoisoned(&self.state).sink.is_some()
    }

    pub fn current_epoch(&self) -> u64 {
        lock_unpoisoned(&self.state).epoch
    }

    /// Deliver `event` if `token` is still current.
    pub fn forward(&self, token: EpochToken, event: T) -> Forwarded {
        let state = lock_unpoisoned(&self.state);
        match state.sink {
            Some(ref sink) if state.epoch == token.0 => {
                sink.success(event);
                Forwarded::Delivered
            }
            _ => Forwarded::Stale,
        }
    }

    /// Deliver `error` if `token` is still current.
    pub fn forward_error(&self, token: EpochToken, error: ChannelError) -> Forwarded {
        let state = lock_unpoisoned(&self.state);
        match state.sink {
            Some(ref sink) if state.epoch == token.0 => {
                sink.error(error);
                Forwarded::Delivered
            }
            _ => Forwarded::Stale,
        }
    }
}

impl<T> Default for EpochSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
