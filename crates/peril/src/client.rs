//! A player's process: game state, subscriptions and outgoing events.

use std::sync::Arc;

use peril_broker::Broker;
use peril_game::{GameError, GameHandle, GameState, GameStatus, game_log, handler_move, handler_pause, malicious_log};
use peril_protocol::{ArmyMove, JsonCodec, Location, RecognitionOfWar, RoutingConfig, UnitRank};
use peril_pubsub::{
    Durability, Publisher, Subscription, SubscriptionReport, TopologyManager, subscribe,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::PerilError;

/// A connected player.
///
/// Holds two subscriptions, each on its own transient queue named after
/// the player: pause/resume from the server, and every player's moves.
pub struct PerilClient<B: Broker> {
    broker: Arc<B>,
    routing: RoutingConfig,
    game: GameHandle,
    publisher: Publisher<B, JsonCodec>,
    subscriptions: Vec<Subscription<B::Channel>>,
    war_forwarder: JoinHandle<()>,
}

impl<B: Broker> PerilClient<B> {
    /// Joins the game as `username`.
    pub async fn start(
        broker: Arc<B>,
        routing: RoutingConfig,
        username: &str,
    ) -> Result<Self, PerilError> {
        let username = username.trim();
        if username.is_empty() || username.contains(char::is_whitespace) {
            return Err(GameError::Usage("username must be a single word").into());
        }

        let topology = TopologyManager::new(Arc::clone(&broker), routing.clone());
        topology.declare_standard_exchanges().await?;

        let game = GameHandle::new(GameState::new(username));
        let publisher = Publisher::new(Arc::clone(&broker), JsonCodec);

        let pause = subscribe(
            &topology,
            JsonCodec,
            &routing.direct_exchange,
            &routing.pause_queue(username),
            &routing.pause_key,
            Durability::Transient,
            handler_pause(game.clone()),
        )
        .await?;

        let (war_tx, war_rx) = mpsc::unbounded_channel();
        let moves = match subscribe(
            &topology,
            JsonCodec,
            &routing.topic_exchange,
            &routing.army_moves_queue(username),
            &routing.army_moves_pattern(),
            Durability::Transient,
            handler_move(game.clone(), Some(war_tx)),
        )
        .await
        {
            Ok(moves) => moves,
            Err(e) => {
                if let Err(close_err) = pause.close().await {
                    tracing::debug!(error = %close_err, "closing pause subscription failed");
                }
                return Err(e.into());
            }
        };

        let war_forwarder = tokio::spawn(forward_war_recognitions(
            publisher.clone(),
            routing.topic_exchange.clone(),
            routing.war_key(username),
            war_rx,
        ));

        tracing::info!(player = username, "peril client started");
        Ok(Self {
            broker,
            routing,
            game,
            publisher,
            subscriptions: vec![pause, moves],
            war_forwarder,
        })
    }

    pub fn username(&self) -> String {
        self.game.lock().username().to_string()
    }

    /// Shared handle to this player's game state.
    pub fn game(&self) -> &GameHandle {
        &self.game
    }

    pub fn spawn(&self, location: Location, rank: UnitRank) -> Result<u32, PerilError> {
        Ok(self.game.lock().spawn(location, rank)?)
    }

    /// Moves units locally, then announces the move to every player.
    pub async fn move_units(
        &self,
        location: Location,
        unit_ids: &[u32],
    ) -> Result<ArmyMove, PerilError> {
        let army_move = self.game.lock().move_units(location, unit_ids)?;
        let key = self.routing.army_moves_key(&army_move.player.username);
        self.publisher
            .publish(&self.routing.topic_exchange, &key, &army_move)
            .await?;
        Ok(army_move)
    }

    pub fn status(&self) -> GameStatus {
        self.game.lock().status()
    }

    /// Publishes `count` random game logs.
    pub async fn spam(&self, count: u32) -> Result<(), PerilError> {
        let username = self.username();
        let key = self.routing.game_log_key(&username);
        for _ in 0..count {
            let log = game_log(username.as_str(), malicious_log());
            self.publisher
                .publish(&self.routing.topic_exchange, &key, &log)
                .await?;
        }
        tracing::info!(count, "game logs published");
        Ok(())
    }

    /// Ends both subscriptions and closes the broker connection. The
    /// player's transient queues go away with their consumers.
    ///
    /// Teardown runs to the end even if a step fails; the first failure is
    /// returned.
    pub async fn shutdown(self) -> Result<Vec<SubscriptionReport>, PerilError> {
        let mut first_error: Option<PerilError> = None;
        for subscription in &self.subscriptions {
            if let Err(e) = subscription.close().await {
                tracing::warn!(queue = subscription.queue_name(), error = %e, "closing subscription failed");
                first_error.get_or_insert(e.into());
            }
        }
        let mut reports = Vec::with_capacity(self.subscriptions.len());
        for subscription in self.subscriptions {
            reports.push(subscription.join().await);
        }
        // The move handler owned the sender; with it gone the forwarder
        // drains what is left and stops.
        if let Err(e) = self.war_forwarder.await {
            tracing::warn!(error = %e, "war forwarder failed");
        }
        if let Err(e) = self.broker.close().await {
            first_error.get_or_insert(e.into());
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}

async fn forward_war_recognitions<B: Broker>(
    publisher: Publisher<B, JsonCodec>,
    exchange: String,
    routing_key: String,
    mut recognitions: mpsc::UnboundedReceiver<RecognitionOfWar>,
) {
    while let Some(recognition) = recognitions.recv().await {
        match publisher.publish(&exchange, &routing_key, &recognition).await {
            Ok(()) => tracing::info!(
                attacker = %recognition.attacker.username,
                defender = %recognition.defender.username,
                "war recognized"
            ),
            Err(e) => tracing::warn!(error = %e, "war recognition not published"),
        }
    }
}
