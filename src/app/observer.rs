//! Application lifecycle observer.
//!
//! One native context registration is shared by the Launched and Terminated
//! streams. The observer owns that registration and a demux table of sinks
//! keyed by [`AppEventKind`]; streams only ever hold sink capabilities, never
//! the native registration.
//!
//! The observer also answers the synchronous application queries.

use crate::app::native::{AppManagerBackend, ContextCallback, ContextNotification, ContextRegistration};
use crate::app::types::{AppEvent, AppEventKind, ApplicationInfo};
use crate::error::{BridgeError, ChannelError};
use crate::lock_unpoisoned;
use crate::stats::SharedStats;
use crate::stream::sink::EventSink;
use std::sync::{Arc, Mutex, Weak};

struct ObserverState {
    launched: Option<Arc<dyn EventSink<AppEvent>>>,
    terminated: Option<Arc<dyn EventSink<AppEvent>>>,
    /// Number of attached kinds, 0..=2
    ref_count: u8,
    /// Generation of the installed registration; 0 when none is installed
    generation: u64,
    /// Last generation handed to a registration attempt
    issued: u64,
    registration: Option<ContextRegistration>,
}

impl ObserverState {
    fn sink(&self, kind: AppEventKind) -> Option<&Arc<dyn EventSink<AppEvent>>> {
        match kind {
            AppEventKind::Launched => self.launched.as_ref(),
            AppEventKind::Terminated => self.terminated.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: AppEventKind) -> &mut Option<Arc<dyn EventSink<AppEvent>>> {
        match kind {
            AppEventKind::Launched => &mut self.launched,
            AppEventKind::Terminated => &mut self.terminated,
        }
    }
}

struct ObserverShared {
    state: Mutex<ObserverState>,
    stats: SharedStats,
}

/// Multiplexes native application context notifications onto two streams.
pub struct ApplicationObserver {
    backend: Arc<dyn AppManagerBackend>,
    shared: Arc<ObserverShared>,
}

impl ApplicationObserver {
    pub fn new(backend: Arc<dyn AppManagerBackend>, stats: SharedStats) -> Self {
        Self {
            backend,
            shared: Arc::new(ObserverShared {
                state: Mutex::new(ObserverState {
                    launched: None,
                    terminated: None,
                    ref_count: 0,
                    generation: 0,
                    issued: 0,
                    registration: None,
                }),
                stats,
            }),
        }
    }

    /// Store `sink` for `kind`, creating the native registration on first use.
    ///
    /// If `kind` already has a sink it is replaced; the displaced sink is not
    /// notified and the reference count is unchanged.
    ///
    /// The native registration is made without holding the observer lock, so
    /// the backend may notify from inside `register_context_listener`. Such
    /// notifications carry a generation that is not installed yet and are
    /// discarded as stale.
    pub fn attach(
        &self,
        kind: AppEventKind,
        sink: Arc<dyn EventSink<AppEvent>>,
    ) -> Result<(), BridgeError> {
        let generation = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.sink(kind).is_some() {
                tracing::debug!(%kind, "replacing app event sink");
                *state.slot_mut(kind) = Some(sink);
                return Ok(());
            }
            if state.registration.is_some() {
                *state.slot_mut(kind) = Some(sink);
                state.ref_count += 1;
                tracing::info!(%kind, ref_count = state.ref_count, "app event stream attached");
                return Ok(());
            }
            state.issued += 1;
            state.issued
        };

        let registration = self
            .backend
            .register_context_listener(self.demux_callback(generation))
            .map_err(BridgeError::from_native)?;

        let surplus = {
            let mut state = lock_unpoisoned(&self.shared.state);
            // Another attach may have installed a registration meanwhile.
            let surplus = if state.registration.is_some() {
                Some(registration)
            } else {
                state.generation = generation;
                state.registration = Some(registration);
                tracing::debug!(registration = registration.0, "app context listener registered");
                None
            };
            if state.slot_mut(kind).replace(sink).is_none() {
                state.ref_count += 1;
            }
            tracing::info!(%kind, ref_count = state.ref_count, "app event stream attached");
            surplus
        };

        if let Some(registration) = surplus {
            self.backend.unregister_context_listener(registration);
            tracing::debug!(registration = registration.0, "surplus app context listener released");
        }
        Ok(())
    }

    /// Clear the sink for `kind`; the native registration is released when
    /// no kind remains attached. Detaching an unattached kind is a no-op.
    pub fn detach(&self, kind: AppEventKind) {
        let released = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.slot_mut(kind).take().is_none() {
                return;
            }
            state.ref_count -= 1;
            tracing::info!(%kind, ref_count = state.ref_count, "app event stream detached");
            if state.ref_count == 0 {
                state.generation = 0;
                state.registration.take()
            } else {
                None
            }
        };

        // Unregister outside the lock so an in-flight callback cannot deadlock us.
        if let Some(registration) = released {
            self.backend.unregister_context_listener(registration);
            tracing::debug!(registration = registration.0, "app context listener released");
        }
    }

    /// Number of attached kinds.
    pub fn ref_count(&self) -> u8 {
        lock_unpoisoned(&self.shared.state).ref_count
    }

    /// Whether the native registration is currently held.
    pub fn is_registered(&self) -> bool {
        lock_unpoisoned(&self.shared.state).registration.is_some()
    }

    pub fn is_attached(&self, kind: AppEventKind) -> bool {
        lock_unpoisoned(&self.shared.state).sink(kind).is_some()
    }

    /// Id of the foreground application.
    pub fn current_foreground_id(&self) -> Result<String, BridgeError> {
        self.backend
            .current_app_id()
            .map_err(BridgeError::from_native)
    }

    pub fn info(&self, app_id: &str) -> Result<ApplicationInfo, BridgeError> {
        self.backend
            .app_info(app_id)
            .map_err(|e| BridgeError::from_app_query(app_id, e))
    }

    pub fn list_installed(&self) -> Result<Vec<ApplicationInfo>, BridgeError> {
        self.backend
            .installed_apps()
            .map_err(BridgeError::from_native)
    }

    pub fn is_running(&self, app_id: &str) -> Result<bool, BridgeError> {
        self.backend
            .is_running(app_id)
            .map_err(|e| BridgeError::from_app_query(app_id, e))
    }

    fn demux_callback(&self, generation: u64) -> ContextCallback {
        let shared = Arc::downgrade(&self.shared);
        let backend = Arc::downgrade(&self.backend);
        Arc::new(move |notification: ContextNotification| {
            dispatch(&shared, &backend, generation, notification);
        })
    }
}

impl Drop for ApplicationObserver {
    fn drop(&mut self) {
        let released = {
            let mut state = lock_unpoisoned(&self.shared.state);
            state.launched = None;
            state.terminated = None;
            state.ref_count = 0;
            state.generation = 0;
            state.registration.take()
        };
        if let Some(registration) = released {
            self.backend.unregister_context_listener(registration);
        }
    }
}

/// Route one native notification to the sink registered for its kind.
fn dispatch(
    shared: &Weak<ObserverShared>,
    backend: &Weak<dyn AppManagerBackend>,
    generation: u64,
    notification: ContextNotification,
) {
    let (Some(shared), Some(backend)) = (shared.upgrade(), backend.upgrade()) else {
        return;
    };
    let Some(kind) = notification.reason.kind() else {
        tracing::trace!(app_id = %notification.app_id, "ignoring context notification");
        return;
    };

    {
        let state = lock_unpoisoned(&shared.state);
        if state.generation != generation {
            shared.stats.record_stale_callback();
            return;
        }
        if state.sink(kind).is_none() {
            tracing::trace!(%kind, app_id = %notification.app_id, "no sink attached, dropping event");
            return;
        }
    }

    // The info lookup is a native call; keep it outside the lock.
    let lookup = backend.app_info(&notification.app_id);

    let state = lock_unpoisoned(&shared.state);
    if state.generation != generation {
        shared.stats.record_stale_callback();
        return;
    }
    let Some(sink) = state.sink(kind) else {
        return;
    };
    match lookup {
        Ok(app) => {
            sink.success(AppEvent { kind, app });
            shared.stats.record_app_event();
        }
        Err(e) => {
            tracing::warn!(%kind, app_id = %notification.app_id, error = %e, "app info lookup failed");
            sink.error(ChannelError::from(BridgeError::from_app_query(
                &notification.app_id,
                e,
            )));
            shared.stats.record_stream_error();
        }
    }
}
