use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for live reload operations.
pub type ReloadResult<T> = Result<T, ReloadError>;

/// Canonical error surface shared across the client.
///
/// None of these ever reach the page: the actor logs them, hands them to the
/// observer hook and recovers (backoff, drop, or fallback reload).
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error ({context}): {error}")]
    TransportError {
        context: &'static str,
        error: String,
    },

    #[error("Parse failed: {0}")]
    ParseFailed(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Failure to reach into an embedded frame's viewport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameAccessError {
    #[error("frame content is cross-origin")]
    CrossOrigin,

    #[error("frame has no content window")]
    NoContentWindow,

    #[error("frame no longer attached to the document")]
    Detached,
}

/// Connection lifecycle as seen by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Why a live connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    RemoteClosed { code: Option<u16>, reason: String },
    StreamEnded,
    ReadFailure { error: String },
    WriteFailure { error: String },
    HandshakeFailed { error: String },
}

/// Which part of the page a reload touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTarget {
    Document,
    PreviewFrame,
}

/// Where a scroll access failed during a frame reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStage {
    Capture,
    Restore,
}

/// Transport-independent buffer sizing parameters used for websocket configuration.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketBufferConfig {
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
    pub max_write_buffer_bytes: usize,
    pub max_message_bytes: usize,
    pub max_frame_bytes: usize,
}

impl Default for WebSocketBufferConfig {
    fn default() -> Self {
        // Reload notifications are tiny; keep buffers small.
        Self {
            read_buffer_bytes: 64 << 10,
            write_buffer_bytes: 16 << 10,
            max_write_buffer_bytes: 64 << 10,
            max_message_bytes: 1 << 20,
            max_frame_bytes: 1 << 20,
        }
    }
}

/// TLS configuration for websocket connections.
///
/// Certificate validation stays on unless explicitly disabled, e.g. for a dev
/// server on a self-signed certificate.
#[derive(Clone, Copy, Debug)]
pub struct WsTlsConfig {
    pub validate_certs: bool,
}

impl Default for WsTlsConfig {
    fn default() -> Self {
        Self {
            validate_certs: true,
        }
    }
}

/// Abstract reconnect strategy trait.
pub trait WsReconnectStrategy: Send + Sync + 'static {
    /// Delay before the next attempt; advances the attempt counter.
    fn next_delay(&mut self) -> Duration;
    /// Called on a successful open.
    fn reset(&mut self);
    fn should_retry(&self) -> bool;
    /// Number of reconnects scheduled since the last successful open.
    fn attempt(&self) -> u32;
}

/// Read-only view of the client state, returned by the status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveReloadStatus {
    pub state: ConnectionState,
    pub reconnect_attempt: u32,
    pub reconnect_pending: bool,
    pub reload_pending: bool,
    pub frame_reload_in_flight: bool,
}
