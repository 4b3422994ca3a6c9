//! Application manager bridge.
//!
//! Lifecycle notifications (launched, terminated) are exposed as two streams
//! sharing one native registration; application queries are answered
//! synchronously.

pub mod native;
pub mod observer;
pub mod simulated;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use native::{
    AppManagerBackend, ContextCallback, ContextNotification, ContextReason, ContextRegistration,
};
pub use observer::ApplicationObserver;
pub use simulated::SimulatedAppManager;
pub use stream::AppEventStreamHandler;
pub use types::{AppEvent, AppEventKind, ApplicationInfo};
