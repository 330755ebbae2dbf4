//! Topology manager: exchanges, queues and the bindings between them.
//!
//! Declarations are broker-global and idempotent, so any number of
//! processes may declare the same topology as long as they agree on its
//! parameters. Disagreement is a [`PubSubError::Conflict`], reported and
//! never resolved silently.

use std::sync::Arc;

use peril_broker::{
    Broker, BrokerChannel, BrokerError, ExchangeKind, ExchangeSpec, QueueSpec, QueueStatus,
};
use peril_protocol::RoutingConfig;

use crate::{Operation, PubSubError};

/// Durability class of a queue, fixed when it is first declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Durability {
    /// Survives a broker restart; kept when its consumers disconnect.
    Durable,
    /// Not durable and deleted with its last consumer. Not exclusive, so
    /// several processes may share the queue name.
    Transient,
}

impl Durability {
    /// The queue declaration for this durability class.
    pub fn queue_spec(self, name: impl Into<String>) -> QueueSpec {
        match self {
            Self::Durable => QueueSpec::durable(name),
            Self::Transient => QueueSpec::transient(name),
        }
    }
}

/// A declared and bound queue, together with the channel that declared it.
///
/// The channel is meant to become the queue's dedicated consuming channel;
/// call [`close`](Self::close) if nothing will consume from it.
pub struct QueueHandle<Ch> {
    status: QueueStatus,
    channel: Ch,
}

impl<Ch: BrokerChannel> QueueHandle<Ch> {
    pub fn name(&self) -> &str {
        &self.status.name
    }

    /// What the broker reported when the queue was declared.
    pub fn status(&self) -> &QueueStatus {
        &self.status
    }

    pub fn channel(&self) -> &Ch {
        &self.channel
    }

    pub fn into_parts(self) -> (QueueStatus, Ch) {
        (self.status, self.channel)
    }

    /// Releases the declaring channel.
    pub async fn close(self) -> QueueStatus {
        if let Err(e) = self.channel.close().await {
            tracing::debug!(queue = %self.status.name, error = %e, "closing declaring channel failed");
        }
        self.status
    }
}

/// Declares topology on behalf of one process.
///
/// Cheap to clone; clones share the broker connection.
pub struct TopologyManager<B: Broker> {
    broker: Arc<B>,
    routing: RoutingConfig,
}

impl<B: Broker> Clone for TopologyManager<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            routing: self.routing.clone(),
        }
    }
}

impl<B: Broker> TopologyManager<B> {
    pub fn new(broker: Arc<B>, routing: RoutingConfig) -> Self {
        Self { broker, routing }
    }

    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    /// Opens a channel, attributing failure to `target`.
    pub async fn open_channel(&self, target: &str) -> Result<B::Channel, PubSubError> {
        self.broker
            .open_channel()
            .await
            .map_err(|e| PubSubError::from_broker(Operation::OpenChannel, target, e))
    }

    /// Declares an exchange. Must precede any publish or bind targeting it.
    ///
    /// # Errors
    /// [`PubSubError::Conflict`] if `name` exists with another kind or
    /// durability.
    pub async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), PubSubError> {
        let channel = self.open_channel(name).await?;
        let result = channel
            .declare_exchange(&ExchangeSpec::new(name, kind, durable))
            .await
            .map_err(|e| PubSubError::from_broker(Operation::DeclareExchange, name, e));
        close_quietly(&channel, name).await;
        result?;
        tracing::info!(exchange = name, %kind, durable, "exchange declared");
        Ok(())
    }

    /// Declares the durable direct and topic exchanges every process uses.
    pub async fn declare_standard_exchanges(&self) -> Result<(), PubSubError> {
        self.declare_exchange(&self.routing.direct_exchange, ExchangeKind::Direct, true)
            .await?;
        self.declare_exchange(&self.routing.topic_exchange, ExchangeKind::Topic, true)
            .await
    }

    /// Declares `queue` with the flags of `durability`, wires it to the
    /// shared dead-letter exchange, and binds it to `exchange` under
    /// `routing_key`.
    ///
    /// Any error means the topology is not established: nothing should be
    /// published or consumed against it.
    pub async fn declare_and_bind_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
        durability: Durability,
    ) -> Result<QueueHandle<B::Channel>, PubSubError> {
        let spec = durability
            .queue_spec(queue)
            .with_dead_letter_exchange(self.routing.dead_letter_exchange.as_str());
        self.declare_and_bind_spec(exchange, spec, routing_key).await
    }

    /// Like [`declare_and_bind_queue`](Self::declare_and_bind_queue) with
    /// the queue declaration spelled out, dead-letter wiring included.
    pub async fn declare_and_bind_spec(
        &self,
        exchange: &str,
        spec: QueueSpec,
        routing_key: &str,
    ) -> Result<QueueHandle<B::Channel>, PubSubError> {
        let channel = self.open_channel(&spec.name).await?;

        // Fail before the queue exists if the bind could never succeed.
        if let Err(e) = channel.check_exchange(exchange).await {
            close_quietly(&channel, &spec.name).await;
            return Err(PubSubError::from_broker(Operation::CheckExchange, exchange, e));
        }

        let existed = match self.queue_exists(&spec.name).await {
            Ok(existed) => existed,
            Err(e) => {
                close_quietly(&channel, &spec.name).await;
                return Err(e);
            }
        };

        let status = match channel.declare_queue(&spec).await {
            Ok(status) => status,
            Err(e) => {
                close_quietly(&channel, &spec.name).await;
                return Err(PubSubError::from_broker(Operation::DeclareQueue, &spec.name, e));
            }
        };

        if let Err(e) = channel.bind_queue(&spec.name, exchange, routing_key).await {
            close_quietly(&channel, &spec.name).await;
            // A queue someone else declared keeps its bindings.
            if !existed {
                self.remove_unbound_queue(&spec.name).await;
            }
            return Err(PubSubError::from_broker(
                Operation::BindQueue,
                format!("{} -> {exchange}", spec.name),
                e,
            ));
        }

        tracing::info!(
            queue = %spec.name,
            exchange,
            routing_key,
            durable = spec.durable,
            "queue declared and bound"
        );
        Ok(QueueHandle { status, channel })
    }

    /// Passive check on a throwaway channel, since a missing queue closes
    /// the channel that asked.
    async fn queue_exists(&self, queue: &str) -> Result<bool, PubSubError> {
        let channel = self.open_channel(queue).await?;
        let result = match channel.check_queue(queue).await {
            Ok(_) => Ok(true),
            Err(BrokerError::NotFound(_)) => Ok(false),
            Err(e) => Err(PubSubError::from_broker(Operation::CheckQueue, queue, e)),
        };
        close_quietly(&channel, queue).await;
        result
    }

    /// Best-effort cleanup after a failed bind on a queue this call
    /// created. Only an unused, empty queue is removed; the bind error is
    /// what the caller sees.
    async fn remove_unbound_queue(&self, queue: &str) {
        let channel = match self.broker.open_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(queue, error = %e, "cannot clean up unbound queue");
                return;
            }
        };
        match channel.delete_queue(queue, true, true).await {
            Ok(_) => tracing::debug!(queue, "unbound queue removed"),
            Err(e) => tracing::warn!(queue, error = %e, "unbound queue left in place"),
        }
        close_quietly(&channel, queue).await;
    }
}

async fn close_quietly<Ch: BrokerChannel>(channel: &Ch, name: &str) {
    if let Err(e) = channel.close().await {
        tracing::debug!(name, error = %e, "channel close failed");
    }
}
