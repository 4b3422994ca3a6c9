//! In-memory application manager.
//!
//! Keeps a catalogue of applications and fires context notifications when
//! applications are launched or terminated through it. Notifications are
//! delivered synchronously on the calling thread.

use crate::app::native::{
    AppManagerBackend, ContextCallback, ContextNotification, ContextReason, ContextRegistration,
};
use crate::app::types::ApplicationInfo;
use crate::error::{NativeError, NativeErrorKind};
use crate::lock_unpoisoned;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Catalogue {
    apps: BTreeMap<String, ApplicationInfo>,
    foreground: Option<String>,
}

/// An application manager backed by an in-memory catalogue.
#[derive(Default)]
pub struct SimulatedAppManager {
    catalogue: Mutex<Catalogue>,
    listeners: Mutex<HashMap<u64, ContextCallback>>,
    /// Callback of the most recently released registration
    released: Mutex<Option<ContextCallback>>,
    pending_registration_failure: Mutex<Option<NativeError>>,
    next_registration: AtomicU64,
    registrations_created: AtomicUsize,
}

impl SimulatedAppManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager pre-populated with a few sample applications.
    pub fn with_demo_apps() -> Self {
        let manager = Self::new();
        for (id, label, app_type) in [
            ("org.example.clock", "Clock", "native"),
            ("org.example.gallery", "Gallery", "native"),
            ("org.example.settings", "Settings", "native"),
            ("org.example.weather", "Weather", "web"),
        ] {
            let mut info = ApplicationInfo::new(id, id, label);
            info.app_type = Some(app_type.to_string());
            info.executable_path = Some(format!("/opt/apps/{id}/bin/{label}").to_lowercase());
            info.icon_path = Some(format!("/opt/apps/{id}/shared/res/{id}.png"));
            info.shared_resource_path = Some(format!("/opt/apps/{id}/shared/res/"));
            manager.install(info);
        }
        manager
    }

    /// Add or replace an application in the catalogue.
    pub fn install(&self, info: ApplicationInfo) {
        lock_unpoisoned(&self.catalogue)
            .apps
            .insert(info.id.clone(), info);
    }

    /// Mark `app_id` running and in the foreground, then notify listeners.
    ///
    /// Returns the number of listeners notified.
    pub fn launch(&self, app_id: &str) -> Result<usize, NativeError> {
        let package_id = {
            let mut catalogue = lock_unpoisoned(&self.catalogue);
            let info = catalogue
                .apps
                .get_mut(app_id)
                .ok_or_else(|| NativeError::no_such_app(app_id))?;
            info.is_running = true;
            let package_id = info.package_id.clone();
            catalogue.foreground = Some(app_id.to_string());
            package_id
        };
        Ok(self.notify(ContextNotification {
            app_id: app_id.to_string(),
            package_id,
            reason: ContextReason::Launched,
        }))
    }

    /// Mark `app_id` stopped, then notify listeners.
    pub fn terminate(&self, app_id: &str) -> Result<usize, NativeError> {
        let package_id = {
            let mut catalogue = lock_unpoisoned(&self.catalogue);
            let info = catalogue
                .apps
                .get_mut(app_id)
                .ok_or_else(|| NativeError::no_such_app(app_id))?;
            info.is_running = false;
            let package_id = info.package_id.clone();
            if catalogue.foreground.as_deref() == Some(app_id) {
                catalogue.foreground = None;
            }
            package_id
        };
        Ok(self.notify(ContextNotification {
            app_id: app_id.to_string(),
            package_id,
            reason: ContextReason::Terminated,
        }))
    }

    /// Deliver a raw notification to every registered listener.
    pub fn notify(&self, notification: ContextNotification) -> usize {
        let callbacks: Vec<ContextCallback> =
            lock_unpoisoned(&self.listeners).values().cloned().collect();
        for callback in &callbacks {
            callback(notification.clone());
        }
        callbacks.len()
    }

    /// Invoke the callback of the most recently released registration.
    /// Models a notification that was already in flight when the listener
    /// was unregistered.
    ///
    /// Returns `false` if no registration has been released yet.
    pub fn deliver_late(&self, notification: ContextNotification) -> bool {
        let callback = lock_unpoisoned(&self.released).clone();
        match callback {
            Some(callback) => {
                callback(notification);
                true
            }
            None => false,
        }
    }

    /// Make the next listener registration fail with `error`.
    pub fn fail_next_registration(&self, error: NativeError) {
        *lock_unpoisoned(&self.pending_registration_failure) = Some(error);
    }

    /// Number of listener registrations currently held.
    pub fn active_registrations(&self) -> usize {
        lock_unpoisoned(&self.listeners).len()
    }

    /// Number of successful registrations over the manager's lifetime.
    pub fn registrations_created(&self) -> usize {
        self.registrations_created.load(Ordering::SeqCst)
    }
}

impl AppManagerBackend for SimulatedAppManager {
    fn current_app_id(&self) -> Result<String, NativeError> {
        lock_unpoisoned(&self.catalogue)
            .foreground
            .clone()
            .ok_or_else(|| NativeError::new(3, "no application in foreground", NativeErrorKind::Other))
    }

    fn app_info(&self, app_id: &str) -> Result<ApplicationInfo, NativeError> {
        lock_unpoisoned(&self.catalogue)
            .apps
            .get(app_id)
            .cloned()
            .ok_or_else(|| NativeError::no_such_app(app_id))
    }

    fn installed_apps(&self) -> Result<Vec<ApplicationInfo>, NativeError> {
        Ok(lock_unpoisoned(&self.catalogue).apps.values().cloned().collect())
    }

    fn is_running(&self, app_id: &str) -> Result<bool, NativeError> {
        lock_unpoisoned(&self.catalogue)
            .apps
            .get(app_id)
            .map(|info| info.is_running)
            .ok_or_else(|| NativeError::no_such_app(app_id))
    }

    fn register_context_listener(
        &self,
        callback: ContextCallback,
    ) -> Result<ContextRegistration, NativeError> {
        if let Some(err) = lock_unpoisoned(&self.pending_registration_failure).take() {
            return Err(err);
        }
        let id = self.next_registration.fetch_add(1, Ordering::SeqCst);
        lock_unpoisoned(&self.listeners).insert(id, callback);
        self.registrations_created.fetch_add(1, Ordering::SeqCst);
        Ok(ContextRegistration(id))
    }

    fn unregister_context_listener(&self, registration: ContextRegistration) {
        let removed = lock_unpoisoned(&self.listeners).remove(&registration.0);
        if removed.is_some() {
            *lock_unpoisoned(&self.released) = removed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_launch_and_terminate_update_state() {
        let manager = SimulatedAppManager::with_demo_apps();
        manager.launch("org.example.clock").unwrap();
        assert!(manager.is_running("org.example.clock").unwrap());
        assert_eq!(manager.current_app_id().unwrap(), "org.example.clock");

        manager.terminate("org.example.clock").unwrap();
        assert!(!manager.is_running("org.example.clock").unwrap());
        assert!(manager.current_app_id().is_err());
    }

    #[test]
    fn test_unknown_app_is_not_found() {
        let manager = SimulatedAppManager::with_demo_apps();
        let err = manager.app_info("unknown.id").unwrap_err();
        assert_eq!(err.kind, NativeErrorKind::NotFound);
        assert!(manager.launch("unknown.id").is_err());
    }

    #[test]
    fn test_listeners_receive_notifications_until_unregistered() {
        let manager = SimulatedAppManager::with_demo_apps();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let registration = manager
            .register_context_listener(Arc::new(move |n: ContextNotification| {
                s.lock().unwrap().push(n.reason);
            }))
            .unwrap();

        assert_eq!(manager.launch("org.example.weather").unwrap(), 1);
        manager.unregister_context_listener(registration);
        assert_eq!(manager.terminate("org.example.weather").unwrap(), 0);

        assert_eq!(*seen.lock().unwrap(), vec![ContextReason::Launched]);
        assert_eq!(manager.active_registrations(), 0);
        assert_eq!(manager.registrations_created(), 1);
    }

    #[test]
    fn test_released_listener_can_be_called_late() {
        let manager = SimulatedAppManager::with_demo_apps();
        let notification = ContextNotification {
            app_id: "org.example.clock".to_string(),
            package_id: "org.example.clock".to_string(),
            reason: ContextReason::Terminated,
        };
        assert!(!manager.deliver_late(notification.clone()));

        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let registration = manager
            .register_context_listener(Arc::new(move |_: ContextNotification| {
                s.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        manager.unregister_context_listener(registration);

        assert!(manager.deliver_late(notification));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
