//! End-to-end over a real loopback socket with tokio-tungstenite on both sides.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reload_ws::core::{ConnectionState, ExponentialBackoffReconnect};
use reload_ws::testing::RecordingHost;
use reload_ws::transport::tungstenite::TungsteniteTransport;
use reload_ws::{GetLiveReloadStatus, LiveReloadActorArgs, LiveReloadConfig, spawn_live_reload};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn wait_for(mut check: impl FnMut() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_over_real_websocket_and_graceful_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (close_tx, close_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
        ws.send(Message::text(r#"{"type":"reload"}"#)).await.unwrap();
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Close(frame)) = msg {
                let _ = close_tx.send(frame.map(|f| u16::from(f.code)));
                return;
            }
        }
    });

    let host = RecordingHost::new();
    let config = LiveReloadConfig::for_page(&format!("http://{addr}/index.html")).unwrap();
    assert_eq!(config.endpoint, format!("ws://{addr}/ws/reload"));

    let actor = spawn_live_reload(LiveReloadActorArgs {
        config,
        host: host.clone(),
        reconnect_strategy: ExponentialBackoffReconnect::default(),
        transport: TungsteniteTransport::default(),
        observer: None,
    })
    .await;

    wait_for(|| host.document_reloads() == 1, Duration::from_secs(5)).await;
    let status = actor.ask(GetLiveReloadStatus).await.expect("status");
    assert_eq!(status.state, ConnectionState::Connected);

    actor.stop_gracefully().await.unwrap();
    actor.wait_for_shutdown().await;

    let code = tokio::time::timeout(Duration::from_secs(5), close_rx)
        .await
        .expect("server saw close")
        .expect("close reported");
    assert_eq!(code, Some(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connection_schedules_backoff() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let actor = spawn_live_reload(LiveReloadActorArgs::new(
        LiveReloadConfig::new(format!("ws://{addr}/ws/reload")),
        RecordingHost::new(),
    ))
    .await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = actor.ask(GetLiveReloadStatus).await.expect("status");
        if status.reconnect_pending {
            assert_eq!(status.state, ConnectionState::Disconnected);
            assert_eq!(status.reconnect_attempt, 1);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no reconnect scheduled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
