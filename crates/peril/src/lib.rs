//! # Peril
//!
//! A multiplayer strategy game whose processes never talk to each other
//! directly: a server and any number of player clients coordinate through
//! an AMQP message broker.
//!
//! - [`PerilServer`] declares the shared topology, broadcasts pause and
//!   resume, and collects game logs.
//! - [`PerilClient`] holds one player's units, reacts to pause and to
//!   other players' moves, and publishes its own moves and logs.
//!
//! Both are generic over [`peril_broker::Broker`], so the same code runs
//! against RabbitMQ ([`peril_broker::AmqpBroker`], feature `amqp`) or the
//! in-process [`peril_broker::MemoryBroker`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use peril::prelude::*;
//!
//! # async fn run() -> Result<(), PerilError> {
//! let broker = Arc::new(MemoryBroker::new());
//! let server = PerilServer::start(Arc::clone(&broker), RoutingConfig::default()).await?;
//! let alice = PerilClient::start(Arc::new(broker.connect().await), RoutingConfig::default(), "alice").await?;
//! alice.spawn(Location::new("europe"), UnitRank::Infantry)?;
//! server.pause().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod logging;
mod server;
mod settings;

pub use client::PerilClient;
pub use error::PerilError;
pub use logging::init_tracing;
pub use server::PerilServer;
pub use settings::{AMQP_URL_ENV, DEFAULT_AMQP_URL, ENV_PREFIX, PerilConfig};

pub use peril_broker;
pub use peril_game;
pub use peril_protocol;
pub use peril_pubsub;

pub mod prelude {
    //! Common imports for Peril processes.

    pub use crate::{PerilClient, PerilConfig, PerilError, PerilServer, init_tracing};

    #[cfg(feature = "amqp")]
    pub use peril_broker::AmqpBroker;
    pub use peril_broker::{Broker, MemoryBroker};
    pub use peril_game::{CLIENT_HELP, ClientCommand, GameError, MoveOutcome, SERVER_HELP, ServerCommand};
    pub use peril_protocol::{ArmyMove, GameLog, Location, PlayingState, RoutingConfig, UnitRank};
    pub use peril_pubsub::{AckType, Durability, SubscriptionReport};
}
