//! The game server: topology owner, pause authority and log collector.

use std::sync::Arc;

use peril_broker::Broker;
use peril_game::{LogBook, handler_log};
use peril_protocol::{JsonCodec, PlayingState, RoutingConfig};
use peril_pubsub::{
    Durability, Publisher, Subscription, SubscriptionReport, TopologyManager,
    declare_dead_letter_sink, subscribe,
};

use crate::PerilError;

/// A running Peril server.
///
/// Starting the server declares the shared topology: the direct and topic
/// exchanges, the dead-letter sink, and the durable game-log queue, which
/// the server then consumes.
pub struct PerilServer<B: Broker> {
    broker: Arc<B>,
    routing: RoutingConfig,
    publisher: Publisher<B, JsonCodec>,
    logs: LogBook,
    log_subscription: Subscription<B::Channel>,
}

impl<B: Broker> PerilServer<B> {
    /// Declares the topology and starts consuming game logs.
    ///
    /// Any error here is fatal: without its topology the game cannot run.
    pub async fn start(broker: Arc<B>, routing: RoutingConfig) -> Result<Self, PerilError> {
        let topology = TopologyManager::new(Arc::clone(&broker), routing.clone());
        topology.declare_standard_exchanges().await?;
        declare_dead_letter_sink(&topology).await?;

        let logs = LogBook::new();
        let log_subscription = subscribe(
            &topology,
            JsonCodec,
            &routing.topic_exchange,
            &routing.game_log_queue,
            &routing.game_log_pattern(),
            Durability::Durable,
            handler_log(logs.clone()),
        )
        .await?;

        tracing::info!("peril server started");
        Ok(Self {
            publisher: Publisher::new(Arc::clone(&broker), JsonCodec),
            broker,
            routing,
            logs,
            log_subscription,
        })
    }

    /// Broadcasts the pause flag to every player.
    pub async fn set_paused(&self, paused: bool) -> Result<(), PerilError> {
        self.publisher
            .publish(
                &self.routing.direct_exchange,
                &self.routing.pause_key,
                &PlayingState { is_paused: paused },
            )
            .await?;
        tracing::info!(paused, "playing state published");
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), PerilError> {
        self.set_paused(true).await
    }

    pub async fn resume(&self) -> Result<(), PerilError> {
        self.set_paused(false).await
    }

    /// Game logs received so far.
    pub fn logs(&self) -> &LogBook {
        &self.logs
    }

    /// Stops consuming logs and closes the broker connection.
    ///
    /// The connection is closed even if closing the subscription fails;
    /// the first failure is returned.
    pub async fn shutdown(self) -> Result<SubscriptionReport, PerilError> {
        let closed = self.log_subscription.close().await;
        let report = self.log_subscription.join().await;
        let disconnected = self.broker.close().await;
        tracing::info!(logs = report.acknowledged, "peril server stopped");
        closed?;
        disconnected?;
        Ok(report)
    }
}
