//! Unified error type for Peril.

use peril_broker::BrokerError;
use peril_game::GameError;
use peril_protocol::ProtocolError;
use peril_pubsub::PubSubError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift any layer's error into this
/// one, so the binaries deal with a single type.
#[derive(Debug, thiserror::Error)]
pub enum PerilError {
    /// Connecting to or talking with the broker failed outside of a
    /// publish or subscribe call.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Topology, publish or subscribe failed.
    #[error(transparent)]
    PubSub(#[from] PubSubError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A player command was rejected.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The process configuration could not be loaded.
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl PerilError {
    /// Returns `true` if the broker connection is gone and the process
    /// cannot continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Broker(e) => e.is_connection_error(),
            Self::PubSub(e) => e.is_connection() || e.is_conflict(),
            Self::Config(_) => true,
            Self::Protocol(_) | Self::Game(_) => false,
        }
    }
}
