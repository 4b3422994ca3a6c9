//! Stream adapter for one application event kind.

use crate::app::observer::ApplicationObserver;
use crate::app::types::{AppEvent, AppEventKind};
use crate::error::ChannelError;
use crate::stream::sink::EventSink;
use crate::stream::StreamHandler;
use std::sync::Arc;

/// Exposes one [`AppEventKind`] of a shared observer as a stream.
pub struct AppEventStreamHandler {
    kind: AppEventKind,
    observer: Arc<ApplicationObserver>,
}

impl AppEventStreamHandler {
    pub fn new(kind: AppEventKind, observer: Arc<ApplicationObserver>) -> Self {
        Self { kind, observer }
    }

    pub fn kind(&self) -> AppEventKind {
        self.kind
    }
}

impl StreamHandler for AppEventStreamHandler {
    type Event = AppEvent;

    fn on_listen(&mut self, sink: Arc<dyn EventSink<AppEvent>>) -> Result<(), ChannelError> {
        self.observer
            .attach(self.kind, sink.clone())
            .map_err(|e| {
                let error = ChannelError::from(&e);
                sink.error(error.clone());
                error
            })
    }

    fn on_cancel(&mut self) {
        self.observer.detach(self.kind);
    }
}

impl Drop for AppEventStreamHandler {
    fn drop(&mut self) {
        self.observer.detach(self.kind);
    }
}
