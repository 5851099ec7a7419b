use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use kameo::prelude::ActorRef;
use reload_ws::core::{ConnectionState, ExponentialBackoffReconnect, ReloadTarget, WsFrame};
use reload_ws::testing::{
    MockConnection, MockServer, MockTransport, ObservedEvent, RecordingHost, RecordingObserver,
};
use reload_ws::{
    GetLiveReloadStatus, LiveReloadActor, LiveReloadActorArgs, LiveReloadConfig, LiveReloadEvent,
    ReloadObserverHook, spawn_live_reload,
};

type TestActor = LiveReloadActor<RecordingHost, ExponentialBackoffReconnect, MockTransport>;

struct Harness {
    actor: ActorRef<TestActor>,
    _server: MockServer,
    conn: MockConnection,
    host: RecordingHost,
    observer: Arc<RecordingObserver>,
}

async fn connected(config: LiveReloadConfig) -> Harness {
    let (transport, mut server) = MockTransport::channel_pair();
    let host = RecordingHost::new();
    let observer = RecordingObserver::shared();
    let actor = spawn_live_reload(LiveReloadActorArgs {
        config,
        host: host.clone(),
        reconnect_strategy: ExponentialBackoffReconnect::default(),
        transport,
        observer: Some(observer.clone() as ReloadObserverHook),
    })
    .await;
    let conn = server.accept().await.expect("connection accepted");
    Harness {
        actor,
        _server: server,
        conn,
        host,
        observer,
    }
}

fn default_config() -> LiveReloadConfig {
    LiveReloadConfig::new("ws://mock/ws/reload")
}

#[tokio::test(start_paused = true)]
async fn reload_without_frame_reloads_document_after_debounce() {
    let h = connected(default_config()).await;

    h.conn.send_reload().unwrap();
    tokio::time::sleep(Duration::from_millis(90)).await;
    assert_eq!(h.host.document_reloads(), 0, "still inside the debounce window");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.host.document_reloads(), 1);
    assert_eq!(h.observer.reloads(), vec![ReloadTarget::Document]);
}

#[tokio::test(start_paused = true)]
async fn burst_of_notifications_coalesces_into_one_reload() {
    let h = connected(default_config()).await;

    h.conn.send_reload().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.conn.send_reload().unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    h.conn.send_reload().unwrap();

    // Window is measured from the last notification, not the first.
    tokio::time::sleep(Duration::from_millis(90)).await;
    assert_eq!(h.host.document_reloads(), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.host.document_reloads(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.host.document_reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn debounce_window_is_configurable() {
    let h = connected(default_config().with_reload_debounce(Duration::from_millis(300))).await;

    h.conn.send_reload().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(h.host.document_reloads(), 0);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.host.document_reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn other_message_types_are_ignored() {
    let h = connected(default_config()).await;

    h.conn.send_text(r#"{"type":"ping"}"#).unwrap();
    h.conn.send_text(r#"{"type":"reload_css","path":"x.css"}"#).unwrap();
    h.conn.send_text(r#"{"kind":"reload"}"#).unwrap();
    h.conn.send_text(r#"["reload"]"#).unwrap();
    h.conn
        .send_inbound(WsFrame::Binary(Bytes::from_static(br#"{"type":"reload"}"#)))
        .unwrap();
    h.conn.send_inbound(WsFrame::Ping(Bytes::new())).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.host.document_reloads(), 0);
    assert!(h.observer.reloads().is_empty());
    let status = h.actor.ask(GetLiveReloadStatus).await.expect("status");
    assert_eq!(status.state, ConnectionState::Connected);
    assert!(!status.reload_pending);
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_dropped_and_connection_survives() {
    let h = connected(default_config()).await;

    h.conn.send_text("not json at all").unwrap();
    h.conn.send_text(r#"{"type":"reload""#).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(
        h.observer
            .count(|e| matches!(e, ObservedEvent::MessageDropped(_))),
        2
    );
    let status = h.actor.ask(GetLiveReloadStatus).await.expect("status");
    assert_eq!(status.state, ConnectionState::Connected);
    assert!(h.observer.reconnect_delays().is_empty());

    // Later notifications on the same socket still work.
    h.conn.send_reload().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.host.document_reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_fields_do_not_block_reload() {
    let h = connected(default_config()).await;

    h.conn
        .send_text(r#"{"type":"reload","changed":["a.md"],"build":42}"#)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.host.document_reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn reload_requested_event_goes_through_debounce() {
    let h = connected(default_config()).await;

    for _ in 0..3 {
        h.actor
            .tell(LiveReloadEvent::ReloadRequested)
            .send()
            .await
            .unwrap();
    }
    let status = h.actor.ask(GetLiveReloadStatus).await.expect("status");
    assert!(status.reload_pending);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.host.document_reloads(), 1);
    let status = h.actor.ask(GetLiveReloadStatus).await.expect("status");
    assert!(!status.reload_pending);
}

#[tokio::test(start_paused = true)]
async fn pending_reload_survives_a_disconnect() {
    let mut h = connected(default_config()).await;

    h.conn.send_reload().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.conn.drop_socket();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.host.document_reloads(), 1);
}
