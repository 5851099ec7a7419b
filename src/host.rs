//! Boundary between the reload state machine and the page it reloads.
//!
//! The actor never touches a DOM directly. A browser binding, a native preview
//! shell, or the [`crate::testing::RecordingHost`] implements [`ReloadHost`].

use std::future::Future;
use std::pin::Pin;

use crate::core::{FrameAccessError, PreviewFrameMatcher};

/// Scroll offset of a frame's content viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollSnapshot {
    pub x: f64,
    pub y: f64,
}

impl ScrollSnapshot {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// How a frame navigation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoadOutcome {
    Loaded,
    Failed,
}

/// Resolves once the frame has either loaded the new source or failed to.
///
/// Hosts that lose track of a navigation should resolve to
/// [`FrameLoadOutcome::Failed`]; the client falls back to a document reload.
pub type FrameLoadFuture = Pin<Box<dyn Future<Output = FrameLoadOutcome> + Send + 'static>>;

/// Page operations the reload coordinator needs.
pub trait ReloadHost: Send + 'static {
    /// Handle to an embedded frame element.
    type Frame: Clone + Send + Sync + 'static;

    /// Look up the embedded preview frame. Called on every reload, never cached.
    fn find_preview_frame(&self, matcher: &PreviewFrameMatcher) -> Option<Self::Frame>;

    fn frame_src(&self, frame: &Self::Frame) -> String;

    fn frame_scroll(&self, frame: &Self::Frame) -> Result<ScrollSnapshot, FrameAccessError>;

    fn restore_frame_scroll(
        &mut self,
        frame: &Self::Frame,
        snapshot: ScrollSnapshot,
    ) -> Result<(), FrameAccessError>;

    fn set_frame_class(&mut self, frame: &Self::Frame, class: &str, enabled: bool);

    /// Point the frame at `src` and report how the load ends.
    fn navigate_frame(&mut self, frame: &Self::Frame, src: &str) -> FrameLoadFuture;

    /// Reload the whole document.
    fn reload_document(&mut self);
}
