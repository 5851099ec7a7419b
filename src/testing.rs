//! Reusable test utilities for driving the live reload actor without a socket or a page.
//!
//! - [`MockTransport`] / [`MockServer`]: scripted in-memory connections, one
//!   [`MockConnection`] per accepted handshake.
//! - [`RecordingHost`]: a fake page with an optional preview frame.
//! - [`RecordingObserver`]: captures every observer callback.

use std::collections::{BTreeSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Sink;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::core::{
    DisconnectCause, FrameAccessError, PreviewFrameMatcher, ReloadError, ReloadTarget,
    ScrollStage, WebSocketBufferConfig, WsFrame, WsReconnectStrategy, WsTlsConfig,
};
use crate::host::{FrameLoadFuture, FrameLoadOutcome, ReloadHost, ScrollSnapshot};
use crate::transport::{WsTransport, WsTransportConnectFuture};
use crate::ws::ReloadObserver;

/// How the mock server answers a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockHandshake {
    Accept,
    Reject(String),
}

struct MockShared {
    script: VecDeque<MockHandshake>,
    connect_delay: Duration,
    connect_times: Vec<Instant>,
    urls: Vec<String>,
    accepted_tx: mpsc::UnboundedSender<MockConnection>,
}

/// A transport that uses in-memory channels so tests can emulate server behavior.
///
/// Handshakes follow the script queued on [`MockServer`]; once the script is
/// exhausted every handshake is accepted.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Mutex<MockShared>>,
}

impl MockTransport {
    /// Build a transport + server control pair.
    pub fn channel_pair() -> (Self, MockServer) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(MockShared {
            script: VecDeque::new(),
            connect_delay: Duration::ZERO,
            connect_times: Vec::new(),
            urls: Vec::new(),
            accepted_tx,
        }));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockServer {
                shared,
                accepted_rx,
            },
        )
    }
}

impl WsTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(
        &self,
        url: String,
        _buffers: WebSocketBufferConfig,
        _tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let (handshake, delay) = {
                let mut shared = shared.lock();
                shared.connect_times.push(Instant::now());
                shared.urls.push(url);
                let handshake = shared.script.pop_front().unwrap_or(MockHandshake::Accept);
                (handshake, shared.connect_delay)
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match handshake {
                MockHandshake::Reject(error) => Err(ReloadError::ConnectionFailed(error)),
                MockHandshake::Accept => {
                    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
                    let connection = MockConnection {
                        inbound_tx: Some(inbound_tx),
                        outbound_rx: sent_rx,
                    };
                    shared.lock().accepted_tx.send(connection).map_err(|_| {
                        ReloadError::ConnectionFailed("mock server dropped".to_string())
                    })?;
                    Ok((MockReader { rx: inbound_rx }, MockWriter { sent_tx }))
                }
            }
        })
    }
}

/// Error surface for operations on [`MockConnection`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MockServerError {
    /// The inbound socket side was intentionally dropped.
    SocketDropped,
    /// The actor side is no longer receiving inbound frames.
    ChannelClosed,
}

impl std::fmt::Display for MockServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockServerError::SocketDropped => f.write_str("mock socket already dropped"),
            MockServerError::ChannelClosed => f.write_str("mock actor channel is closed"),
        }
    }
}

impl std::error::Error for MockServerError {}

/// Server-side test handle paired with [`MockTransport`].
pub struct MockServer {
    shared: Arc<Mutex<MockShared>>,
    accepted_rx: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockServer {
    /// Queue a scripted handshake answer.
    pub fn script(&self, handshake: MockHandshake) {
        self.shared.lock().script.push_back(handshake);
    }

    /// Reject the next `count` handshakes.
    pub fn reject_next(&self, count: usize) {
        let mut shared = self.shared.lock();
        for _ in 0..count {
            shared
                .script
                .push_back(MockHandshake::Reject("connection refused".to_string()));
        }
    }

    /// Hold every handshake open for `delay` before answering.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.shared.lock().connect_delay = delay;
    }

    /// Number of `connect` calls seen so far.
    pub fn connect_count(&self) -> usize {
        self.shared.lock().connect_times.len()
    }

    /// When each `connect` call started.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.shared.lock().connect_times.clone()
    }

    pub fn connect_urls(&self) -> Vec<String> {
        self.shared.lock().urls.clone()
    }

    /// Wait for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MockConnection> {
        self.accepted_rx.recv().await
    }

    pub async fn accept_timeout(&mut self, timeout: Duration) -> Option<MockConnection> {
        tokio::time::timeout(timeout, self.accepted_rx.recv())
            .await
            .unwrap_or_default()
    }
}

/// One accepted socket, seen from the server.
pub struct MockConnection {
    inbound_tx: Option<mpsc::UnboundedSender<WsFrame>>,
    outbound_rx: mpsc::UnboundedReceiver<WsFrame>,
}

impl MockConnection {
    /// Receive a frame written by the actor.
    pub async fn recv_outbound(&mut self) -> Option<WsFrame> {
        self.outbound_rx.recv().await
    }

    pub async fn recv_outbound_timeout(&mut self, timeout: Duration) -> Option<WsFrame> {
        tokio::time::timeout(timeout, self.outbound_rx.recv())
            .await
            .unwrap_or_default()
    }

    /// Push an inbound frame to the actor.
    pub fn send_inbound(&self, frame: WsFrame) -> Result<(), MockServerError> {
        let Some(tx) = self.inbound_tx.as_ref() else {
            return Err(MockServerError::SocketDropped);
        };
        tx.send(frame).map_err(|_| MockServerError::ChannelClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), MockServerError> {
        self.send_inbound(WsFrame::text(text))
    }

    pub fn send_reload(&self) -> Result<(), MockServerError> {
        self.send_text(r#"{"type":"reload"}"#)
    }

    /// Send a close frame and drop the socket.
    pub fn close(&mut self, code: u16, reason: &'static str) -> Result<(), MockServerError> {
        let sent = self.send_inbound(WsFrame::close(code, Bytes::from_static(reason.as_bytes())));
        self.drop_socket();
        sent
    }

    /// Simulate server-side socket drop by closing the inbound channel.
    pub fn drop_socket(&mut self) {
        self.inbound_tx = None;
    }
}

/// Reader side for [`MockTransport`].
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<WsFrame>,
}

impl futures_util::Stream for MockReader {
    type Item = Result<WsFrame, ReloadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.rx).poll_recv(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Writer side for [`MockTransport`].
pub struct MockWriter {
    sent_tx: mpsc::UnboundedSender<WsFrame>,
}

impl Sink<WsFrame> for MockWriter {
    type Error = ReloadError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        self.get_mut()
            .sent_tx
            .send(item)
            .map_err(|_| ReloadError::TransportError {
                context: "mock_transport_write",
                error: "mock outbound channel closed".to_string(),
            })
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Reconnect strategy that never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoReconnect;

impl WsReconnectStrategy for NoReconnect {
    fn next_delay(&mut self) -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }

    fn reset(&mut self) {}

    fn should_retry(&self) -> bool {
        false
    }

    fn attempt(&self) -> u32 {
        0
    }
}

/// Handle to a frame inside a [`RecordingHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostFrame(usize);

/// How navigations on a [`RecordingHost`] settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Every navigation settles immediately with this outcome.
    Immediate(FrameLoadOutcome),
    /// Navigations stay pending until [`RecordingHost::complete_next_load`].
    Manual,
}

#[derive(Debug)]
struct FakeFrame {
    src: String,
    scroll: ScrollSnapshot,
    cross_origin: bool,
    classes: BTreeSet<String>,
}

struct HostState {
    frames: Vec<FakeFrame>,
    load_mode: LoadMode,
    pending_loads: VecDeque<oneshot::Sender<FrameLoadOutcome>>,
    navigations: Vec<String>,
    class_changes: Vec<(String, bool)>,
    restored: Vec<ScrollSnapshot>,
    document_reloads: usize,
}

/// In-memory page for exercising the reload path.
///
/// Clones share state, so a test keeps one handle while the actor owns another.
#[derive(Clone)]
pub struct RecordingHost {
    state: Arc<Mutex<HostState>>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    /// A page without any embedded frames.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                frames: Vec::new(),
                load_mode: LoadMode::Immediate(FrameLoadOutcome::Loaded),
                pending_loads: VecDeque::new(),
                navigations: Vec::new(),
                class_changes: Vec::new(),
                restored: Vec::new(),
                document_reloads: 0,
            })),
        }
    }

    pub fn add_frame(&self, src: impl Into<String>) -> HostFrame {
        let mut state = self.state.lock();
        state.frames.push(FakeFrame {
            src: src.into(),
            scroll: ScrollSnapshot::default(),
            cross_origin: false,
            classes: BTreeSet::new(),
        });
        HostFrame(state.frames.len() - 1)
    }

    /// Simulate the page pointing an existing frame somewhere else.
    pub fn set_frame_src(&self, frame: HostFrame, src: impl Into<String>) {
        if let Some(f) = self.state.lock().frames.get_mut(frame.0) {
            f.src = src.into();
        }
    }

    pub fn set_cross_origin(&self, frame: HostFrame, cross_origin: bool) {
        if let Some(f) = self.state.lock().frames.get_mut(frame.0) {
            f.cross_origin = cross_origin;
        }
    }

    /// Simulate the user scrolling inside a frame.
    pub fn scroll_frame(&self, frame: HostFrame, snapshot: ScrollSnapshot) {
        if let Some(f) = self.state.lock().frames.get_mut(frame.0) {
            f.scroll = snapshot;
        }
    }

    pub fn set_load_mode(&self, mode: LoadMode) {
        self.state.lock().load_mode = mode;
    }

    /// Settle the oldest pending navigation. Returns false if none was pending.
    pub fn complete_next_load(&self, outcome: FrameLoadOutcome) -> bool {
        let next = self.state.lock().pending_loads.pop_front();
        match next {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn pending_loads(&self) -> usize {
        self.state.lock().pending_loads.len()
    }

    pub fn current_src(&self, frame: HostFrame) -> Option<String> {
        self.state.lock().frames.get(frame.0).map(|f| f.src.clone())
    }

    pub fn current_scroll(&self, frame: HostFrame) -> Option<ScrollSnapshot> {
        self.state.lock().frames.get(frame.0).map(|f| f.scroll)
    }

    pub fn has_class(&self, frame: HostFrame, class: &str) -> bool {
        self.state
            .lock()
            .frames
            .get(frame.0)
            .is_some_and(|f| f.classes.contains(class))
    }

    /// Every `src` the client navigated a frame to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn class_changes(&self) -> Vec<(String, bool)> {
        self.state.lock().class_changes.clone()
    }

    pub fn restored_scrolls(&self) -> Vec<ScrollSnapshot> {
        self.state.lock().restored.clone()
    }

    pub fn document_reloads(&self) -> usize {
        self.state.lock().document_reloads
    }
}

impl ReloadHost for RecordingHost {
    type Frame = HostFrame;

    fn find_preview_frame(&self, matcher: &PreviewFrameMatcher) -> Option<Self::Frame> {
        self.state
            .lock()
            .frames
            .iter()
            .position(|f| matcher.matches(&f.src))
            .map(HostFrame)
    }

    fn frame_src(&self, frame: &Self::Frame) -> String {
        self.current_src(*frame).unwrap_or_default()
    }

    fn frame_scroll(&self, frame: &Self::Frame) -> Result<ScrollSnapshot, FrameAccessError> {
        let state = self.state.lock();
        let f = state.frames.get(frame.0).ok_or(FrameAccessError::Detached)?;
        if f.cross_origin {
            return Err(FrameAccessError::CrossOrigin);
        }
        Ok(f.scroll)
    }

    fn restore_frame_scroll(
        &mut self,
        frame: &Self::Frame,
        snapshot: ScrollSnapshot,
    ) -> Result<(), FrameAccessError> {
        let mut state = self.state.lock();
        let f = state
            .frames
            .get_mut(frame.0)
            .ok_or(FrameAccessError::Detached)?;
        if f.cross_origin {
            return Err(FrameAccessError::CrossOrigin);
        }
        f.scroll = snapshot;
        state.restored.push(snapshot);
        Ok(())
    }

    fn set_frame_class(&mut self, frame: &Self::Frame, class: &str, enabled: bool) {
        let mut state = self.state.lock();
        if let Some(f) = state.frames.get_mut(frame.0) {
            if enabled {
                f.classes.insert(class.to_string());
            } else {
                f.classes.remove(class);
            }
        }
        state.class_changes.push((class.to_string(), enabled));
    }

    fn navigate_frame(&mut self, frame: &Self::Frame, src: &str) -> FrameLoadFuture {
        let mut state = self.state.lock();
        if let Some(f) = state.frames.get_mut(frame.0) {
            f.src = src.to_string();
            // Fresh content starts at the top.
            f.scroll = ScrollSnapshot::default();
        }
        state.navigations.push(src.to_string());

        let mode = state.load_mode;
        match mode {
            LoadMode::Immediate(outcome) => Box::pin(async move { outcome }),
            LoadMode::Manual => {
                let (tx, rx) = oneshot::channel();
                state.pending_loads.push_back(tx);
                Box::pin(async move { rx.await.unwrap_or(FrameLoadOutcome::Failed) })
            }
        }
    }

    fn reload_document(&mut self) {
        self.state.lock().document_reloads += 1;
    }
}

/// Everything a [`RecordingObserver`] saw.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Connected(String),
    Disconnected(DisconnectCause),
    ReconnectScheduled { attempt: u32, delay: Duration },
    MessageDropped(String),
    Reload(ReloadTarget),
    FrameAccessFailed(ScrollStage, FrameAccessError),
    FrameFallback,
}

/// Observer that records every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    pub fn reconnect_delays(&self) -> Vec<Duration> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::ReconnectScheduled { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect()
    }

    pub fn reloads(&self) -> Vec<ReloadTarget> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Reload(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&ObservedEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().push(event);
    }
}

impl ReloadObserver for RecordingObserver {
    fn on_connected(&self, endpoint: &str) {
        self.push(ObservedEvent::Connected(endpoint.to_string()));
    }

    fn on_disconnected(&self, cause: &DisconnectCause) {
        self.push(ObservedEvent::Disconnected(cause.clone()));
    }

    fn on_reconnect_scheduled(&self, attempt: u32, delay: Duration) {
        self.push(ObservedEvent::ReconnectScheduled { attempt, delay });
    }

    fn on_message_dropped(&self, error: &ReloadError) {
        self.push(ObservedEvent::MessageDropped(error.to_string()));
    }

    fn on_reload(&self, target: ReloadTarget) {
        self.push(ObservedEvent::Reload(target));
    }

    fn on_frame_access_failed(&self, stage: ScrollStage, error: &FrameAccessError) {
        self.push(ObservedEvent::FrameAccessFailed(stage, error.clone()));
    }

    fn on_frame_fallback(&self) {
        self.push(ObservedEvent::FrameFallback);
    }
}
