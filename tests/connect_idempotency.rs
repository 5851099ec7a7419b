use std::sync::Arc;
use std::time::Duration;

use kameo::Actor;
use kameo::prelude::ActorRef;
use reload_ws::core::{ConnectionState, DisconnectCause, ExponentialBackoffReconnect};
use reload_ws::testing::{MockServer, MockTransport, ObservedEvent, RecordingHost, RecordingObserver};
use reload_ws::{
    GetLiveReloadStatus, LiveReloadActor, LiveReloadActorArgs, LiveReloadConfig, LiveReloadEvent,
    ReloadObserverHook,
};

type TestActor = LiveReloadActor<RecordingHost, ExponentialBackoffReconnect, MockTransport>;

fn spawn_actor() -> (ActorRef<TestActor>, MockServer, Arc<RecordingObserver>) {
    let (transport, server) = MockTransport::channel_pair();
    let observer = RecordingObserver::shared();
    let actor = LiveReloadActor::spawn(LiveReloadActorArgs {
        config: LiveReloadConfig::new("ws://mock/ws/reload"),
        host: RecordingHost::new(),
        reconnect_strategy: ExponentialBackoffReconnect::default(),
        transport,
        observer: Some(observer.clone() as ReloadObserverHook),
    });
    (actor, server, observer)
}

async fn wait_for_state(actor: &ActorRef<TestActor>, want: ConnectionState) {
    for _ in 0..400 {
        let status = actor.ask(GetLiveReloadStatus).await.expect("status");
        if status.state == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {want:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_is_single_flight_and_idempotent() {
    let (actor, mut server, _observer) = spawn_actor();
    server.set_connect_delay(Duration::from_millis(100));

    for _ in 0..50 {
        actor.tell(LiveReloadEvent::Connect).send().await.unwrap();
    }

    let _conn = server
        .accept_timeout(Duration::from_secs(1))
        .await
        .expect("connection accepted");
    wait_for_state(&actor, ConnectionState::Connected).await;
    assert_eq!(
        server.connect_count(),
        1,
        "connect() should only be invoked once while a handshake is in flight"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_while_connected_is_a_no_op() {
    let (actor, mut server, observer) = spawn_actor();
    actor.tell(LiveReloadEvent::Connect).send().await.unwrap();
    let _conn = server.accept().await.expect("connection accepted");
    wait_for_state(&actor, ConnectionState::Connected).await;

    for _ in 0..10 {
        actor.tell(LiveReloadEvent::Connect).send().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(server.connect_count(), 1);
    assert_eq!(server.connect_urls(), vec!["ws://mock/ws/reload".to_string()]);
    assert_eq!(
        observer.count(|e| matches!(e, ObservedEvent::Connected(_))),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_disconnect_does_not_tear_down_live_connection() {
    let (actor, mut server, observer) = spawn_actor();
    actor.tell(LiveReloadEvent::Connect).send().await.unwrap();
    let _conn = server.accept().await.expect("connection accepted");
    wait_for_state(&actor, ConnectionState::Connected).await;

    actor
        .tell(LiveReloadEvent::Disconnect {
            connection: 999,
            reason: "late error from an old socket".to_string(),
            cause: DisconnectCause::StreamEnded,
        })
        .send()
        .await
        .unwrap();

    let status = actor.ask(GetLiveReloadStatus).await.expect("status");
    assert_eq!(status.state, ConnectionState::Connected);
    assert!(!status.reconnect_pending);
    assert!(observer.reconnect_delays().is_empty());
}
