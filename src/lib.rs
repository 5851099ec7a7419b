//! Kameo-based live reload client.
//!
//! Keeps a websocket to the preview server's `/ws/reload` endpoint open across
//! restarts, debounces `{"type":"reload"}` notifications and reloads either the
//! embedded preview frame (keeping its scroll position) or the whole document.

pub mod config;
pub mod core;
pub mod host;
pub mod testing;
pub mod tls;
pub mod transport;
pub mod ws;

pub use config::LiveReloadConfig;
pub use host::{FrameLoadOutcome, ReloadHost, ScrollSnapshot};
pub use ws::{
    GetLiveReloadStatus, LiveReloadActor, LiveReloadActorArgs, LiveReloadEvent, ReloadObserver,
    ReloadObserverHook, spawn_live_reload,
};
