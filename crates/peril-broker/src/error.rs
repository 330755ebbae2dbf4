/// Errors that can occur in the broker layer.
///
/// Variants mirror the AMQP failure classes: connection-level failures
/// are fatal to everything sharing the connection, channel-level
/// exceptions (`Conflict`, `NotFound`, `PreconditionFailed`) close only
/// the channel that raised them.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker connection is gone (unreachable, dropped, or closed).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The channel was closed, by us or by a channel exception.
    #[error("channel closed")]
    ChannelClosed,

    /// An entity was redeclared with parameters that differ from the
    /// existing declaration.
    #[error("declaration conflict: {0}")]
    Conflict(String),

    /// The named exchange or queue does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional operation's precondition did not hold
    /// (e.g. deleting a queue that still has consumers with `if_unused`).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The delivery tag is not outstanding on this channel
    /// (already settled, or the channel was recycled).
    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    /// Any other error reported by the AMQP client library.
    #[cfg(feature = "amqp")]
    #[error("amqp error: {0}")]
    Amqp(#[source] lapin::Error),
}

impl BrokerError {
    /// Returns `true` if the whole connection is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }

    /// Returns `true` for channel exceptions, after which the channel that
    /// raised them is closed.
    pub fn is_channel_exception(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::NotFound(_) | Self::PreconditionFailed(_)
        )
    }
}
