//! Live reload actor.
//!
//! The websocket read loop runs outside kameo in its own task and feeds frames
//! back as messages; the actor owns connection state, backoff, the debounce
//! timer and the preview frame reload. Every timer and IO task reports back
//! through the mailbox, so all state changes happen on one logical thread.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use super::frame_reload::FrameReloadState;
use super::timer::TimerSlot;
use super::{ReloadObserverHook, ReloadTarget};
use crate::config::LiveReloadConfig;
use crate::core::{
    ConnectionState, DisconnectCause, ExponentialBackoffReconnect, InboundMessage,
    LiveReloadStatus, OutboundMessage, ReloadError, ReloadResult, WsFrame, WsReconnectStrategy,
    parse_inbound,
};
use crate::host::{FrameLoadOutcome, ReloadHost};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};

/// Arguments passed when constructing a live reload actor.
pub struct LiveReloadActorArgs<H, R = ExponentialBackoffReconnect, T = TungsteniteTransport>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    pub config: LiveReloadConfig,
    pub host: H,
    pub reconnect_strategy: R,
    pub transport: T,
    pub observer: Option<ReloadObserverHook>,
}

impl<H> LiveReloadActorArgs<H>
where
    H: ReloadHost,
{
    /// Production wiring: default backoff over tokio-tungstenite.
    pub fn new(config: LiveReloadConfig, host: H) -> Self {
        Self {
            config,
            host,
            reconnect_strategy: ExponentialBackoffReconnect::default(),
            transport: TungsteniteTransport::default(),
            observer: None,
        }
    }
}

/// Connection manager and reload coordinator for one page.
pub struct LiveReloadActor<H, R = ExponentialBackoffReconnect, T = TungsteniteTransport>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    pub(super) config: LiveReloadConfig,
    pub(super) host: H,
    reconnect: R,
    transport: T,
    pub(super) observer: Option<ReloadObserverHook>,
    pub(super) actor_ref: ActorRef<Self>,
    state: ConnectionState,
    connection_seq: u64,
    active_connection: Option<u64>,
    writer: Option<T::Writer>,
    reader_task: Option<JoinHandle<()>>,
    reader_shutdown: Option<watch::Sender<bool>>,
    reconnect_timer: TimerSlot,
    reload_timer: TimerSlot,
    pub(super) frame: FrameReloadState<H::Frame>,
}

impl<H, R, T> Actor for LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Args = LiveReloadActorArgs<H, R, T>;
    type Error = ReloadError;

    fn name() -> &'static str {
        "LiveReloadActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> ReloadResult<Self> {
        let LiveReloadActorArgs {
            config,
            host,
            reconnect_strategy,
            transport,
            observer,
        } = args;
        let frame = FrameReloadState::new(&config.cache_bust_param);

        Ok(Self {
            config,
            host,
            reconnect: reconnect_strategy,
            transport,
            observer,
            actor_ref: ctx,
            state: ConnectionState::Disconnected,
            connection_seq: 0,
            active_connection: None,
            writer: None,
            reader_task: None,
            reader_shutdown: None,
            reconnect_timer: TimerSlot::default(),
            reload_timer: TimerSlot::default(),
            frame,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: kameo::error::ActorStopReason,
    ) -> ReloadResult<()> {
        self.reconnect_timer.cancel();
        self.reload_timer.cancel();
        self.frame.class_timer.cancel();
        self.stop_reader();
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.send(WsFrame::normal_close()).await;
            let _ = writer.close().await;
        }
        self.active_connection = None;
        self.state = ConnectionState::Disconnected;
        info!(endpoint = %self.config.endpoint, "live reload client stopped");
        Ok(())
    }

    fn on_panic(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            tracing::error!(error = ?err, "LiveReloadActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

/// Events driving the actor. `connection` and `generation` tags let the actor
/// drop anything that belongs to a connection or timer it already replaced.
#[derive(Debug)]
pub enum LiveReloadEvent {
    /// Open a connection unless one is already open or opening.
    Connect,
    Inbound {
        connection: u64,
        frame: WsFrame,
    },
    Disconnect {
        connection: u64,
        reason: String,
        cause: DisconnectCause,
    },
    ReconnectDue {
        generation: u64,
    },
    /// Same as receiving a reload notification.
    ReloadRequested,
    ReloadDue {
        generation: u64,
    },
    FrameLoadSettled {
        reload: u64,
        outcome: FrameLoadOutcome,
    },
    ClearReloadingState {
        generation: u64,
    },
}

impl<H, R, T> KameoMessage<LiveReloadEvent> for LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ReloadResult<()>;

    async fn handle(
        &mut self,
        event: LiveReloadEvent,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        match event {
            LiveReloadEvent::Connect => self.handle_connect(),
            LiveReloadEvent::Inbound { connection, frame } => {
                if self.is_current(connection) {
                    self.process_inbound(frame);
                } else {
                    debug!(connection, "dropping frame from stale connection");
                }
            }
            LiveReloadEvent::Disconnect {
                connection,
                reason,
                cause,
            } => self.handle_disconnect(connection, &reason, cause),
            LiveReloadEvent::ReconnectDue { generation } => {
                if self.reconnect_timer.fire(generation) {
                    self.handle_connect();
                } else {
                    debug!(generation, "stale reconnect timer");
                }
            }
            LiveReloadEvent::ReloadRequested => self.schedule_reload(),
            LiveReloadEvent::ReloadDue { generation } => {
                if self.reload_timer.fire(generation) {
                    self.perform_reload();
                } else {
                    debug!(generation, "stale reload timer");
                }
            }
            LiveReloadEvent::FrameLoadSettled { reload, outcome } => {
                self.handle_frame_load_settled(reload, outcome)
            }
            LiveReloadEvent::ClearReloadingState { generation } => {
                self.handle_clear_reloading_state(generation)
            }
        }
        Ok(())
    }
}

pub(crate) struct ConnectionEstablished<T: WsTransport> {
    connection: u64,
    reader: T::Reader,
    writer: T::Writer,
}

impl<H, R, T> KameoMessage<ConnectionEstablished<T>> for LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ReloadResult<()>;

    async fn handle(
        &mut self,
        msg: ConnectionEstablished<T>,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.on_connection_established(msg.connection, msg.reader, msg.writer)
            .await;
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct ConnectionFailed {
    connection: u64,
    error: String,
}

impl<H, R, T> KameoMessage<ConnectionFailed> for LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ReloadResult<()>;

    async fn handle(
        &mut self,
        msg: ConnectionFailed,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if !self.is_current(msg.connection) {
            debug!(connection = msg.connection, "ignoring stale connect failure");
            return Ok(());
        }
        self.active_connection = None;
        self.state = ConnectionState::Disconnected;
        let reason = format!("handshake failed: {}", msg.error);
        let cause = DisconnectCause::HandshakeFailed { error: msg.error };
        if let Some(observer) = &self.observer {
            observer.on_disconnected(&cause);
        }
        self.schedule_reconnect("connection_failed", &reason);
        Ok(())
    }
}

/// Snapshot query for tests and dev tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetLiveReloadStatus;

impl<H, R, T> KameoMessage<GetLiveReloadStatus> for LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    type Reply = ReloadResult<LiveReloadStatus>;

    async fn handle(
        &mut self,
        _msg: GetLiveReloadStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(LiveReloadStatus {
            state: self.state,
            reconnect_attempt: self.reconnect.attempt(),
            reconnect_pending: self.reconnect_timer.is_armed(),
            reload_pending: self.reload_timer.is_armed(),
            frame_reload_in_flight: self.frame.in_flight.is_some(),
        })
    }
}

impl<H, R, T> LiveReloadActor<H, R, T>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    fn is_current(&self, connection: u64) -> bool {
        self.active_connection == Some(connection)
    }

    fn handle_connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            debug!(state = ?self.state, "connect ignored; connection already active");
            return;
        }
        // A manual connect supersedes any pending retry.
        self.reconnect_timer.cancel();

        self.connection_seq = self.connection_seq.wrapping_add(1);
        let connection = self.connection_seq;
        self.active_connection = Some(connection);
        self.state = ConnectionState::Connecting;

        let self_ref = self.actor_ref.clone();
        let url = self.config.endpoint.clone();
        let buffers = self.config.ws_buffers;
        let tls = self.config.tls;
        let transport = self.transport.clone();
        debug!(connection, url = %url, "opening live reload connection");

        tokio::spawn(async move {
            match transport.connect(url, buffers, tls).await {
                Ok((reader, writer)) => {
                    let _ = self_ref
                        .tell(ConnectionEstablished::<T> {
                            connection,
                            reader,
                            writer,
                        })
                        .send()
                        .await;
                }
                Err(err) => {
                    let _ = self_ref
                        .tell(ConnectionFailed {
                            connection,
                            error: err.to_string(),
                        })
                        .send()
                        .await;
                }
            }
        });
    }

    async fn on_connection_established(
        &mut self,
        connection: u64,
        reader: T::Reader,
        writer: T::Writer,
    ) {
        if !self.is_current(connection) || self.state != ConnectionState::Connecting {
            debug!(connection, "dropping stale connection");
            return;
        }
        info!(endpoint = %self.config.endpoint, connection, "live reload connected");
        self.state = ConnectionState::Connected;
        self.reconnect.reset();
        self.reconnect_timer.cancel();
        self.writer = Some(writer);
        self.spawn_reader(connection, reader);

        if let Some(observer) = &self.observer {
            observer.on_connected(&self.config.endpoint);
        }

        self.announce_page(connection).await;
    }

    fn spawn_reader(&mut self, connection: u64, mut reader: T::Reader) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let actor_ref = self.actor_ref.clone();
        self.reader_shutdown = Some(shutdown_tx);
        self.reader_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = shutdown_rx.changed() => {
                        if res.is_err() || *shutdown_rx.borrow_and_update() { break; }
                    }
                    frame = reader.next() => {
                        let (reason, cause) = match frame {
                            Some(Ok(WsFrame::Close(close))) => {
                                let code = close.as_ref().map(|f| f.code);
                                let reason = close
                                    .as_ref()
                                    .map(|f| String::from_utf8_lossy(&f.reason).into_owned())
                                    .unwrap_or_default();
                                (
                                    format!("server closed: code={code:?} reason={reason}"),
                                    DisconnectCause::RemoteClosed { code, reason },
                                )
                            }
                            Some(Ok(frame)) => {
                                let event = LiveReloadEvent::Inbound { connection, frame };
                                if actor_ref.tell(event).send().await.is_err() {
                                    break;
                                }
                                continue;
                            }
                            Some(Err(err)) => {
                                let error = err.to_string();
                                (
                                    format!("read error: {error}"),
                                    DisconnectCause::ReadFailure { error },
                                )
                            }
                            None => ("stream ended".to_string(), DisconnectCause::StreamEnded),
                        };
                        let _ = actor_ref
                            .tell(LiveReloadEvent::Disconnect { connection, reason, cause })
                            .send()
                            .await;
                        break;
                    }
                }
            }
        }));
    }

    fn stop_reader(&mut self) {
        if let Some(shutdown) = self.reader_shutdown.take() {
            let _ = shutdown.send(true);
        }
        // The reader may be parked on our own mailbox; never await it from a handler.
        self.reader_task.take();
    }

    async fn announce_page(&mut self, connection: u64) {
        let Some(page_info) = self.config.page_info.clone() else {
            return;
        };
        let payload = match OutboundMessage::PageInfo(page_info).encode() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode page info");
                return;
            }
        };
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(err) = writer.send(WsFrame::text(payload)).await {
            let error = err.to_string();
            self.handle_disconnect(
                connection,
                &format!("write error: {error}"),
                DisconnectCause::WriteFailure { error },
            );
        } else {
            debug!(connection, "page info sent");
        }
    }

    fn handle_disconnect(&mut self, connection: u64, reason: &str, cause: DisconnectCause) {
        if !self.is_current(connection) {
            debug!(connection, "ignoring disconnect from stale connection");
            return;
        }
        self.stop_reader();
        self.writer = None;
        self.active_connection = None;
        self.state = ConnectionState::Disconnected;
        info!(
            endpoint = %self.config.endpoint,
            connection,
            reason = %reason,
            "live reload disconnected"
        );
        if let Some(observer) = &self.observer {
            observer.on_disconnected(&cause);
        }
        self.schedule_reconnect("disconnect", reason);
    }

    fn schedule_reconnect(&mut self, event: &str, reason: &str) {
        if self.reconnect_timer.is_armed() {
            debug!(event = %event, "reconnect already scheduled");
            return;
        }
        if !self.reconnect.should_retry() {
            debug!(
                endpoint = %self.config.endpoint,
                event = %event,
                reason = %reason,
                "live reload reconnect suppressed"
            );
            return;
        }

        let delay = self.reconnect.next_delay();
        let attempt = self.reconnect.attempt();
        warn!(
            endpoint = %self.config.endpoint,
            event = %event,
            reason = %reason,
            attempt,
            delay_ms = duration_ms(delay),
            "live reload reconnect scheduled"
        );
        if let Some(observer) = &self.observer {
            observer.on_reconnect_scheduled(attempt, delay);
        }
        self.reconnect_timer
            .arm(&self.actor_ref, delay, |generation| {
                LiveReloadEvent::ReconnectDue { generation }
            });
    }

    fn process_inbound(&mut self, frame: WsFrame) {
        match frame {
            WsFrame::Text(bytes) => self.dispatch(&bytes),
            WsFrame::Binary(bytes) => {
                debug!(len = bytes.len(), "ignoring binary frame");
            }
            WsFrame::Ping(_) | WsFrame::Pong(_) | WsFrame::Close(_) => {}
        }
    }

    fn dispatch(&mut self, payload: &[u8]) {
        match parse_inbound(payload) {
            Ok(InboundMessage::Reload) => {
                debug!("reload notification received");
                self.schedule_reload();
            }
            Ok(InboundMessage::Other(kind)) => {
                debug!(kind = %kind, "ignoring notification");
            }
            Ok(InboundMessage::Untyped) => {
                debug!(len = payload.len(), "ignoring untyped notification");
            }
            Err(err) => {
                warn!(error = %err, len = payload.len(), "dropping malformed notification");
                if let Some(observer) = &self.observer {
                    observer.on_message_dropped(&err);
                }
            }
        }
    }

    fn schedule_reload(&mut self) {
        let debounce = self.config.reload_debounce;
        self.reload_timer
            .arm(&self.actor_ref, debounce, |generation| {
                LiveReloadEvent::ReloadDue { generation }
            });
    }

    fn perform_reload(&mut self) {
        if self.reload_frame() {
            return;
        }
        info!("reloading document");
        self.host.reload_document();
        if let Some(observer) = &self.observer {
            observer.on_reload(ReloadTarget::Document);
        }
    }
}

fn duration_ms(delay: Duration) -> u64 {
    delay.as_millis().min(u64::MAX as u128) as u64
}

/// Spawn the actor and start the first connection attempt.
pub async fn spawn_live_reload<H, R, T>(
    args: LiveReloadActorArgs<H, R, T>,
) -> ActorRef<LiveReloadActor<H, R, T>>
where
    H: ReloadHost,
    R: WsReconnectStrategy,
    T: WsTransport,
{
    let actor = LiveReloadActor::spawn(args);
    if let Err(err) = actor.tell(LiveReloadEvent::Connect).send().await {
        warn!(error = ?err, "failed to start live reload connection");
    }
    actor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, ObservedEvent, RecordingHost, RecordingObserver};

    /// Drives the scheduler directly, as a second loss signal would.
    struct ConnectionLost(&'static str);

    impl<H, R, T> KameoMessage<ConnectionLost> for LiveReloadActor<H, R, T>
    where
        H: ReloadHost,
        R: WsReconnectStrategy,
        T: WsTransport,
    {
        type Reply = ();

        async fn handle(&mut self, msg: ConnectionLost, _ctx: &mut Context<Self, Self::Reply>) {
            self.schedule_reconnect(msg.0, "connection lost");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_loss_signals_arm_one_reconnect_timer() {
        let (transport, mut server) = MockTransport::channel_pair();
        let observer = RecordingObserver::shared();
        let actor = spawn_live_reload(LiveReloadActorArgs {
            config: LiveReloadConfig::new("ws://mock/ws/reload"),
            host: RecordingHost::new(),
            reconnect_strategy: ExponentialBackoffReconnect::default(),
            transport,
            observer: Some(observer.clone() as ReloadObserverHook),
        })
        .await;

        let mut conn = server.accept().await.expect("connects");
        conn.drop_socket();
        tokio::time::sleep(Duration::from_millis(10)).await;

        actor.ask(ConnectionLost("read_error")).await.expect("handled");
        actor.ask(ConnectionLost("write_failure")).await.expect("handled");

        let status = actor.ask(GetLiveReloadStatus).await.expect("status");
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.reconnect_attempt, 1);
        assert!(status.reconnect_pending);
        assert_eq!(
            observer.count(|e| matches!(e, ObservedEvent::ReconnectScheduled { .. })),
            1
        );

        let _conn = server.accept().await.expect("reconnects once");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(server.connect_count(), 2);
    }
}
