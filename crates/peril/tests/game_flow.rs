//! Full game flow: a server and two players on one in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use peril::prelude::*;
use peril::peril_pubsub::TopologyManager;

/// Polls `$cond` until it holds, failing the test after 2s.
macro_rules! eventually {
    ($what:expr, $cond:expr) => {{
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while !$cond {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {}", $what);
    }};
}

async fn start_game() -> (
    Arc<MemoryBroker>,
    PerilServer<MemoryBroker>,
    PerilClient<MemoryBroker>,
    PerilClient<MemoryBroker>,
) {
    let broker = Arc::new(MemoryBroker::new());
    let routing = RoutingConfig::default();
    let server = PerilServer::start(Arc::new(broker.connect().await), routing.clone())
        .await
        .unwrap();
    let alice = PerilClient::start(Arc::new(broker.connect().await), routing.clone(), "alice")
        .await
        .unwrap();
    let bob = PerilClient::start(Arc::new(broker.connect().await), routing, "bob")
        .await
        .unwrap();
    (broker, server, alice, bob)
}

#[tokio::test]
async fn test_startup_declares_topology() {
    let (broker, _server, _alice, _bob) = start_game().await;

    for exchange in ["peril_direct", "peril_topic", "dead_letter_exchange"] {
        assert!(broker.exchange_exists(exchange).await, "{exchange}");
    }
    assert!(broker.queue_exists("peril_dlq").await);
    assert_eq!(
        broker.bindings("game_logs").await,
        vec![("peril_topic".to_string(), "game_logs.*".to_string())]
    );
    assert_eq!(
        broker.bindings("pause.alice").await,
        vec![("peril_direct".to_string(), "pause".to_string())]
    );
    assert_eq!(
        broker.bindings("army_moves.bob").await,
        vec![("peril_topic".to_string(), "army_moves.*".to_string())]
    );

    let pause_queue = broker.queue_spec("pause.alice").await.unwrap();
    assert!(!pause_queue.durable && pause_queue.auto_delete);
    assert_eq!(
        pause_queue.dead_letter_exchange.as_deref(),
        Some("dead_letter_exchange")
    );
    assert!(broker.queue_spec("game_logs").await.unwrap().durable);
}

#[tokio::test]
async fn test_pause_blocks_moves_until_resume() {
    let (_broker, server, alice, bob) = start_game().await;
    alice.spawn(Location::new("europe"), UnitRank::Infantry).unwrap();

    server.pause().await.unwrap();
    eventually!(
        "both players paused",
        alice.game().lock().is_paused() && bob.game().lock().is_paused()
    );

    let err = alice.move_units(Location::new("asia"), &[1]).await.unwrap_err();
    assert!(matches!(err, PerilError::Game(GameError::Paused)));

    server.resume().await.unwrap();
    eventually!("alice resumed", !alice.game().lock().is_paused());
    alice.move_units(Location::new("asia"), &[1]).await.unwrap();
}

#[tokio::test]
async fn test_moves_are_classified_by_every_player() {
    let (broker, _server, alice, bob) = start_game().await;

    // Watch war recognitions the way an external consumer would.
    let topology = TopologyManager::new(Arc::new(broker.connect().await), RoutingConfig::default());
    topology
        .declare_and_bind_queue("peril_topic", "war_watch", "war.*", Durability::Durable)
        .await
        .ok()
        .unwrap()
        .close()
        .await;

    alice.spawn(Location::new("europe"), UnitRank::Artillery).unwrap();
    bob.spawn(Location::new("asia"), UnitRank::Cavalry).unwrap();

    // Far from alice: safe for her, and bob discards his own echo.
    bob.move_units(Location::new("africa"), &[1]).await.unwrap();
    eventually!("first echo dead-lettered", broker.ready_count("peril_dlq").await == Some(1));
    eventually!(
        "alice settled the safe move",
        broker.ready_count("army_moves.alice").await == Some(0)
            && broker.unacked_count("army_moves.alice").await == Some(0)
    );
    assert_eq!(broker.ready_count("war_watch").await, Some(0));

    // Onto alice's units: she acknowledges and recognizes the war.
    bob.move_units(Location::new("europe"), &[1]).await.unwrap();
    eventually!("war recognition", broker.ready_count("war_watch").await == Some(1));
    eventually!("second echo dead-lettered", broker.ready_count("peril_dlq").await == Some(2));
    eventually!(
        "move queues drained",
        broker.unacked_count("army_moves.alice").await == Some(0)
            && broker.unacked_count("army_moves.bob").await == Some(0)
    );

    let alice_reports = alice.shutdown().await.unwrap();
    assert_eq!(alice_reports[1].delivered, 2);
    assert_eq!(alice_reports[1].acknowledged, 2);
    assert_eq!(alice_reports[1].discarded, 0);

    let bob_reports = bob.shutdown().await.unwrap();
    assert_eq!(bob_reports[0].delivered, 0);
    assert_eq!(bob_reports[1].delivered, 2);
    assert_eq!(bob_reports[1].discarded, 2);
}

#[tokio::test]
async fn test_spam_reaches_server_logs() {
    let (broker, server, alice, _bob) = start_game().await;

    alice.spam(3).await.unwrap();
    eventually!("three logs recorded", server.logs().len() == 3);
    assert!(server.logs().entries().iter().all(|log| log.username == "alice"));
    eventually!("log queue drained", broker.unacked_count("game_logs").await == Some(0));

    let report = server.shutdown().await.unwrap();
    assert_eq!(report.acknowledged, 3);
    // The log queue is durable and outlives the server's consumer.
    assert!(broker.queue_exists("game_logs").await);
}

#[tokio::test]
async fn test_client_shutdown_removes_transient_queues() {
    let (broker, _server, alice, _bob) = start_game().await;

    alice.shutdown().await.unwrap();
    eventually!(
        "alice's queues deleted",
        !broker.queue_exists("pause.alice").await
            && !broker.queue_exists("army_moves.alice").await
    );
    assert!(broker.queue_exists("army_moves.bob").await);
}

#[tokio::test]
async fn test_client_shutdown_finishes_after_connection_loss() {
    let broker = Arc::new(MemoryBroker::new());
    let connection = Arc::new(broker.connect().await);
    let alice = PerilClient::start(Arc::clone(&connection), RoutingConfig::default(), "alice")
        .await
        .unwrap();

    connection.close().await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(2), alice.shutdown())
        .await
        .expect("shutdown should not hang")
        .err()
        .unwrap();
    assert!(err.is_fatal());
    eventually!(
        "alice's queues deleted",
        !broker.queue_exists("pause.alice").await
            && !broker.queue_exists("army_moves.alice").await
    );
}

#[tokio::test]
async fn test_failed_start_releases_the_pause_queue() {
    let broker = Arc::new(MemoryBroker::new());
    let routing = RoutingConfig::default();
    let _server = PerilServer::start(Arc::new(broker.connect().await), routing.clone())
        .await
        .unwrap();
    // A durable queue under the player's move-queue name makes the
    // transient declaration conflict.
    TopologyManager::new(Arc::clone(&broker), routing.clone())
        .declare_and_bind_queue("peril_topic", "army_moves.alice", "army_moves.*", Durability::Durable)
        .await
        .ok()
        .unwrap()
        .close()
        .await;

    let err = PerilClient::start(Arc::new(broker.connect().await), routing, "alice")
        .await
        .err()
        .unwrap();
    assert!(err.is_fatal());
    eventually!(
        "pause queue released",
        !broker.queue_exists("pause.alice").await
    );
}

#[tokio::test]
async fn test_rejoining_player_reuses_queue_names() {
    let broker = Arc::new(MemoryBroker::new());
    let routing = RoutingConfig::default();
    let _server = PerilServer::start(Arc::new(broker.connect().await), routing.clone())
        .await
        .unwrap();

    let first = PerilClient::start(Arc::new(broker.connect().await), routing.clone(), "alice")
        .await
        .unwrap();
    // A second process for the same player shares the transient queue.
    let second = PerilClient::start(Arc::new(broker.connect().await), routing, "alice")
        .await
        .unwrap();
    assert_eq!(broker.consumer_count("pause.alice").await, Some(2));

    first.shutdown().await.unwrap();
    assert!(broker.queue_exists("pause.alice").await);
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_blank_username_is_rejected() {
    let broker = Arc::new(MemoryBroker::new());
    let err = PerilClient::start(broker, RoutingConfig::default(), "   ")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PerilError::Game(GameError::Usage(_))));
}
