//! Integration tests for the in-memory broker.
//!
//! These drive `MemoryBroker` purely through the `Broker` /
//! `BrokerChannel` / `DeliveryStream` / `Delivery` traits, the same
//! surface the messaging core uses, and check the AMQP behaviours the
//! core relies on: routing, manual acknowledgment, requeue,
//! dead-lettering, and cleanup on close.

use std::time::Duration;

use peril_broker::{
    Broker, BrokerChannel, BrokerError, Delivery, DeliveryStream, ExchangeKind,
    ExchangeSpec, MemoryBroker, MemoryChannel, MemoryConsumer, MemoryDelivery,
    QueueSpec,
};

const JSON: &str = "application/json";

/// Helper: waits for the next delivery, failing the test after 2s.
async fn next(consumer: &mut MemoryConsumer) -> MemoryDelivery {
    tokio::time::timeout(Duration::from_secs(2), consumer.recv())
        .await
        .expect("delivery should arrive in time")
        .expect("recv should not error")
        .expect("stream should be open")
}

/// Helper: a channel with a direct exchange `x` and queue `q` bound on `k`.
async fn direct_setup(broker: &MemoryBroker, queue: QueueSpec) -> MemoryChannel {
    let ch = broker.open_channel().await.unwrap();
    ch.declare_exchange(&ExchangeSpec::new("x", ExchangeKind::Direct, true))
        .await
        .unwrap();
    ch.declare_queue(&queue).await.unwrap();
    ch.bind_queue(&queue.name, "x", "k").await.unwrap();
    ch
}

#[tokio::test]
async fn test_publish_consume_ack() {
    let broker = MemoryBroker::new();
    let ch = direct_setup(&broker, QueueSpec::durable("q")).await;

    ch.publish("x", "k", b"hello", JSON).await.unwrap();
    assert_eq!(broker.ready_count("q").await, Some(1));

    let mut consumer = ch.consume("q", "c1").await.unwrap();
    let delivery = next(&mut consumer).await;
    assert_eq!(delivery.payload(), b"hello");
    assert_eq!(delivery.routing_key(), "k");
    assert_eq!(delivery.content_type(), JSON);
    assert!(!delivery.redelivered());
    assert_eq!(broker.unacked_count("q").await, Some(1));

    delivery.ack().await.unwrap();
    assert_eq!(broker.unacked_count("q").await, Some(0));
    assert_eq!(broker.ready_count("q").await, Some(0));
}

#[tokio::test]
async fn test_topic_exchange_routes_by_pattern() {
    let broker = MemoryBroker::new();
    let ch = broker.open_channel().await.unwrap();
    ch.declare_exchange(&ExchangeSpec::new("t", ExchangeKind::Topic, true))
        .await
        .unwrap();
    ch.declare_queue(&QueueSpec::durable("moves")).await.unwrap();
    ch.declare_queue(&QueueSpec::durable("logs")).await.unwrap();
    ch.bind_queue("moves", "t", "army_moves.*").await.unwrap();
    ch.bind_queue("logs", "t", "game_logs.*").await.unwrap();

    ch.publish("t", "army_moves.alice", b"1", JSON).await.unwrap();
    ch.publish("t", "army_moves.bob", b"2", JSON).await.unwrap();
    ch.publish("t", "game_logs.alice", b"3", JSON).await.unwrap();
    ch.publish("t", "war.alice", b"4", JSON).await.unwrap();

    assert_eq!(broker.ready_count("moves").await, Some(2));
    assert_eq!(broker.ready_count("logs").await, Some(1));
}

#[tokio::test]
async fn test_publish_to_missing_exchange_closes_channel() {
    let broker = MemoryBroker::new();
    let ch = broker.open_channel().await.unwrap();

    let err = ch.publish("nowhere", "k", b"x", JSON).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound(_)));
    assert!(ch.is_closed());

    let err = ch.publish("nowhere", "k", b"x", JSON).await.unwrap_err();
    assert!(matches!(err, BrokerError::ChannelClosed));
}

#[tokio::test]
async fn test_check_queue_reports_existing_and_closes_on_missing() {
    let broker = MemoryBroker::new();
    let ch = direct_setup(&broker, QueueSpec::durable("q")).await;
    ch.publish("x", "k", b"one", JSON).await.unwrap();

    let status = ch.check_queue("q").await.unwrap();
    assert_eq!(status.name, "q");
    assert_eq!(status.message_count, 1);

    let err = ch.check_queue("missing").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound(_)));
    assert!(ch.is_closed());
    assert!(!broker.queue_exists("missing").await);
}

#[tokio::test]
async fn test_nack_requeue_redelivers_to_head() {
    let broker = MemoryBroker::new();
    let ch = direct_setup(&broker, QueueSpec::durable("q")).await;
    ch.publish("x", "k", b"first", JSON).await.unwrap();
    ch.publish("x", "k", b"second", JSON).await.unwrap();

    let mut consumer = ch.consume("q", "c1").await.unwrap();
    let first = next(&mut consumer).await;
    let second = next(&mut consumer).await;
    assert_eq!(first.payload(), b"first");

    first.nack(true).await.unwrap();
    second.ack().await.unwrap();

    let again = next(&mut consumer).await;
    assert_eq!(again.payload(), b"first");
    assert!(again.redelivered());
    again.ack().await.unwrap();
    assert_eq!(broker.unacked_count("q").await, Some(0));
}

#[tokio::test]
async fn test_nack_discard_dead_letters() {
    let broker = MemoryBroker::new();
    let ch = broker.open_channel().await.unwrap();
    ch.declare_exchange(&ExchangeSpec::new("dlx", ExchangeKind::Fanout, true))
        .await
        .unwrap();
    ch.declare_queue(&QueueSpec::durable("dlq")).await.unwrap();
    ch.bind_queue("dlq", "dlx", "").await.unwrap();
    ch.declare_exchange(&ExchangeSpec::new("x", ExchangeKind::Direct, true))
        .await
        .unwrap();
    ch.declare_queue(&QueueSpec::transient("q").with_dead_letter_exchange("dlx"))
        .await
        .unwrap();
    ch.bind_queue("q", "x", "k").await.unwrap();

    ch.publish("x", "k", b"poison", JSON).await.unwrap();
    let mut consumer = ch.consume("q", "c1").await.unwrap();
    next(&mut consumer).await.nack(false).await.unwrap();

    assert_eq!(broker.ready_count("q").await, Some(0));
    assert_eq!(broker.ready_count("dlq").await, Some(1));

    // The dead-lettered copy keeps its original routing key.
    let mut dlq = ch.consume("dlq", "inspector").await.unwrap();
    let dead = next(&mut dlq).await;
    assert_eq!(dead.payload(), b"poison");
    assert_eq!(dead.routing_key(), "k");
}

#[tokio::test]
async fn test_nack_discard_without_dead_letter_exchange_drops() {
    let broker = MemoryBroker::new();
    let ch = direct_setup(&broker, QueueSpec::durable("q")).await;
    ch.publish("x", "k", b"gone", JSON).await.unwrap();

    let mut consumer = ch.consume("q", "c1").await.unwrap();
    next(&mut consumer).await.nack(false).await.unwrap();

    assert_eq!(broker.ready_count("q").await, Some(0));
    assert_eq!(broker.unacked_count("q").await, Some(0));
}

#[tokio::test]
async fn test_channel_close_returns_unacked_and_ends_stream() {
    let broker = MemoryBroker::new();
    let setup = direct_setup(&broker, QueueSpec::durable("q")).await;
    setup.publish("x", "k", b"pending", JSON).await.unwrap();

    let ch = broker.open_channel().await.unwrap();
    let mut consumer = ch.consume("q", "c1").await.unwrap();
    let delivery = next(&mut consumer).await;
    assert_eq!(broker.unacked_count("q").await, Some(1));

    ch.close().await.unwrap();
    assert_eq!(broker.unacked_count("q").await, Some(0));
    assert_eq!(broker.ready_count("q").await, Some(1));
    assert!(consumer.recv().await.unwrap().is_none());

    // The stale delivery can no longer be settled.
    assert!(matches!(delivery.ack().await, Err(BrokerError::ChannelClosed)));
}

#[tokio::test]
async fn test_transient_queue_deleted_with_last_consumer() {
    let broker = MemoryBroker::new();
    let setup = direct_setup(&broker, QueueSpec::transient("pause.alice")).await;

    let ch = broker.open_channel().await.unwrap();
    let consumer = ch.consume("pause.alice", "c1").await.unwrap();
    assert_eq!(broker.consumer_count("pause.alice").await, Some(1));

    ch.close().await.unwrap();
    drop(consumer);
    assert!(!broker.queue_exists("pause.alice").await);
    assert!(broker.bindings("pause.alice").await.is_empty());

    // Durable queues stay put.
    setup.declare_queue(&QueueSpec::durable("logs")).await.unwrap();
    let ch = broker.open_channel().await.unwrap();
    let _consumer = ch.consume("logs", "c2").await.unwrap();
    ch.close().await.unwrap();
    assert!(broker.queue_exists("logs").await);
}

#[tokio::test]
async fn test_round_robin_between_consumers() {
    let broker = MemoryBroker::new();
    let ch = direct_setup(&broker, QueueSpec::durable("q")).await;

    let other = broker.open_channel().await.unwrap();
    let mut a = ch.consume("q", "a").await.unwrap();
    let mut b = other.consume("q", "b").await.unwrap();

    ch.publish("x", "k", b"1", JSON).await.unwrap();
    ch.publish("x", "k", b"2", JSON).await.unwrap();

    let first = next(&mut a).await;
    let second = next(&mut b).await;
    assert_eq!(first.payload(), b"1");
    assert_eq!(second.payload(), b"2");
    first.ack().await.unwrap();
    second.ack().await.unwrap();
}

#[tokio::test]
async fn test_queue_conflict_across_connections() {
    let broker = MemoryBroker::new();
    let other = broker.connect().await;

    let a = broker.open_channel().await.unwrap();
    let b = other.open_channel().await.unwrap();
    a.declare_queue(&QueueSpec::durable("shared")).await.unwrap();
    b.declare_queue(&QueueSpec::durable("shared")).await.unwrap();

    let err = b
        .declare_queue(&QueueSpec::transient("shared"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Conflict(_)));
    assert!(b.is_closed());
    assert!(!a.is_closed());
    assert_eq!(broker.queue_spec("shared").await, Some(QueueSpec::durable("shared")));
}

#[tokio::test]
async fn test_connection_close_leaves_other_connections_alone() {
    let broker = MemoryBroker::new();
    let other = broker.connect().await;
    let mine = broker.open_channel().await.unwrap();
    let theirs = other.open_channel().await.unwrap();

    broker.close().await.unwrap();
    assert!(broker.is_closed());
    assert!(mine.is_closed());
    assert!(!theirs.is_closed());
    assert!(matches!(
        broker.open_channel().await,
        Err(BrokerError::ConnectionClosed(_))
    ));
    assert!(other.open_channel().await.is_ok());
    assert!(matches!(
        mine.close().await,
        Err(BrokerError::ConnectionClosed(_))
    ));
}

#[tokio::test]
async fn test_restart_drops_connections_and_transient_topology() {
    let broker = MemoryBroker::new();
    let ch = broker.open_channel().await.unwrap();
    ch.declare_exchange(&ExchangeSpec::new("t", ExchangeKind::Topic, true))
        .await
        .unwrap();
    ch.declare_queue(&QueueSpec::durable("logs")).await.unwrap();
    ch.declare_queue(&QueueSpec::transient("moves.alice")).await.unwrap();
    ch.bind_queue("logs", "t", "game_logs.*").await.unwrap();

    broker.restart().await;

    assert!(broker.is_closed());
    assert!(ch.is_closed());
    assert!(broker.exchange_exists("t").await);
    assert!(broker.queue_exists("logs").await);
    assert!(!broker.queue_exists("moves.alice").await);

    let fresh = broker.connect().await;
    let ch = fresh.open_channel().await.unwrap();
    ch.publish("t", "game_logs.bob", b"after restart", JSON)
        .await
        .unwrap();
    assert_eq!(fresh.ready_count("logs").await, Some(1));
}
