//! The dead-letter sink.

use peril_broker::{Broker, ExchangeKind, QueueSpec, QueueStatus};

use crate::{PubSubError, TopologyManager};

/// Declares the fanout dead-letter exchange and the durable queue that
/// captures everything routed to it.
///
/// Every queue declared through
/// [`TopologyManager::declare_and_bind_queue`] dead-letters into this
/// exchange, so discarded messages from anywhere in the game end up in
/// one place. Nothing consumes the queue here; it is left for inspection.
/// The sink queue itself has no dead-letter target.
pub async fn declare_dead_letter_sink<B: Broker>(
    topology: &TopologyManager<B>,
) -> Result<QueueStatus, PubSubError> {
    let routing = topology.routing();
    topology
        .declare_exchange(&routing.dead_letter_exchange, ExchangeKind::Fanout, true)
        .await?;
    let handle = topology
        .declare_and_bind_spec(
            &routing.dead_letter_exchange,
            QueueSpec::durable(routing.dead_letter_queue.as_str()),
            "",
        )
        .await?;
    Ok(handle.close().await)
}
