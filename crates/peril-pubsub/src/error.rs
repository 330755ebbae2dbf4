//! Error types for the publish/subscribe layer.

use std::fmt;

use peril_broker::BrokerError;
use peril_protocol::ProtocolError;

/// The broker-facing step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    OpenChannel,
    DeclareExchange,
    /// Passive existence check ahead of a queue binding.
    CheckExchange,
    CheckQueue,
    DeclareQueue,
    BindQueue,
    Encode,
    Publish,
    Consume,
    CloseChannel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenChannel => "open channel",
            Self::DeclareExchange => "declare exchange",
            Self::CheckExchange => "check exchange",
            Self::CheckQueue => "check queue",
            Self::DeclareQueue => "declare queue",
            Self::BindQueue => "bind queue",
            Self::Encode => "encode payload",
            Self::Publish => "publish",
            Self::Consume => "consume",
            Self::CloseChannel => "close channel",
        };
        f.write_str(name)
    }
}

/// Errors returned by topology, publish and subscribe calls.
///
/// Every variant names the attempted operation and its target (an
/// exchange, a queue, or `exchange/routing_key` for publishes).
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// The broker is unreachable or the connection dropped.
    #[error("{operation} {target}: connection error: {source}")]
    Connection {
        operation: Operation,
        target: String,
        #[source]
        source: BrokerError,
    },

    /// Topology was redeclared with incompatible parameters.
    /// Retrying with the same parameters fails the same way.
    #[error("{operation} {target}: conflicting declaration: {source}")]
    Conflict {
        operation: Operation,
        target: String,
        #[source]
        source: BrokerError,
    },

    /// The value could not be encoded. Nothing was sent.
    #[error("{operation} {target}: serialization failed: {source}")]
    Serialization {
        operation: Operation,
        target: String,
        #[source]
        source: ProtocolError,
    },

    /// Any other broker call failure.
    #[error("{operation} {target}: {source}")]
    Transport {
        operation: Operation,
        target: String,
        #[source]
        source: BrokerError,
    },
}

impl PubSubError {
    /// Classifies a broker error raised while performing `operation` on
    /// `target`.
    pub fn from_broker(
        operation: Operation,
        target: impl Into<String>,
        source: BrokerError,
    ) -> Self {
        let target = target.into();
        if source.is_connection_error() {
            Self::Connection {
                operation,
                target,
                source,
            }
        } else if matches!(source, BrokerError::Conflict(_)) {
            Self::Conflict {
                operation,
                target,
                source,
            }
        } else {
            Self::Transport {
                operation,
                target,
                source,
            }
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Connection { operation, .. }
            | Self::Conflict { operation, .. }
            | Self::Serialization { operation, .. }
            | Self::Transport { operation, .. } => *operation,
        }
    }

    /// The exchange, queue or `exchange/routing_key` the operation targeted.
    pub fn target(&self) -> &str {
        match self {
            Self::Connection { target, .. }
            | Self::Conflict { target, .. }
            | Self::Serialization { target, .. }
            | Self::Transport { target, .. } => target,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
