pub mod actor;
pub mod frame_reload;
pub(crate) mod timer;

use std::sync::Arc;
use std::time::Duration;

pub use crate::core::*;
pub use crate::host::*;

/// Hook interface for observing what the client silently recovers from.
///
/// The client never surfaces errors to the page; this is the way to see
/// dropped messages, reconnect plans and fallbacks (in tests or a dev console).
pub trait ReloadObserver: Send + Sync + 'static {
    fn on_connected(&self, _endpoint: &str) {}

    fn on_disconnected(&self, _cause: &DisconnectCause) {}

    /// `attempt` is the counter value after scheduling (1 for the first retry).
    fn on_reconnect_scheduled(&self, _attempt: u32, _delay: Duration) {}

    fn on_message_dropped(&self, _error: &ReloadError) {}

    fn on_reload(&self, _target: ReloadTarget) {}

    fn on_frame_access_failed(&self, _stage: ScrollStage, _error: &FrameAccessError) {}

    /// The preview frame failed to load and the document is being reloaded instead.
    fn on_frame_fallback(&self) {}
}

/// Convenient alias for passing around a shared observer.
pub type ReloadObserverHook = Arc<dyn ReloadObserver>;

pub use actor::*;
