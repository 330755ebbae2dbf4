//! Message broker abstraction layer for Peril.
//!
//! Provides the [`Broker`], [`BrokerChannel`], [`DeliveryStream`] and
//! [`Delivery`] traits that abstract over a concrete AMQP-style broker,
//! plus two implementations:
//!
//! - [`AmqpBroker`]: RabbitMQ (or any AMQP 0-9-1 broker) via `lapin`
//! - [`MemoryBroker`]: an in-process broker with the same routing,
//!   acknowledgment and dead-lettering semantics, for tests and offline
//!   play
//!
//! # Feature Flags
//!
//! - `amqp` (default): [`AmqpBroker`] via `lapin`

#![allow(async_fn_in_trait)]

#[cfg(feature = "amqp")]
mod amqp;
mod error;
mod memory;
mod topology;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBroker, AmqpChannel, AmqpConsumer, AmqpDelivery};
pub use error::BrokerError;
pub use memory::{MemoryBroker, MemoryChannel, MemoryConsumer, MemoryDelivery};
pub use topology::{ExchangeKind, ExchangeSpec, QueueSpec, QueueStatus};

use std::fmt;
use std::future::Future;

/// Opaque handle identifying one delivery on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryTag(u64);

impl DeliveryTag {
    /// Creates a new `DeliveryTag` from a raw `u64`.
    pub fn new(tag: u64) -> Self {
        Self(tag)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dt-{}", self.0)
    }
}

/// A broker connection. All channels derive from it.
pub trait Broker: Send + Sync + 'static {
    /// The channel type opened on this connection.
    type Channel: BrokerChannel;

    /// Opens a new channel.
    ///
    /// Channels are cheap; a channel must only be used by one logical
    /// operation at a time.
    fn open_channel(
        &self,
    ) -> impl Future<Output = Result<Self::Channel, BrokerError>> + Send;

    /// Closes the connection and, with it, every channel and consumer.
    fn close(&self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// A single channel on a broker connection.
///
/// Clones refer to the same underlying channel; closing one closes all.
pub trait BrokerChannel: Clone + Send + Sync + 'static {
    /// The delivery stream produced by [`consume`](Self::consume).
    type Consumer: DeliveryStream;

    /// Declares an exchange. Idempotent for identical parameters.
    ///
    /// # Errors
    /// [`BrokerError::Conflict`] if the exchange exists with a different
    /// kind or durability.
    fn declare_exchange(
        &self,
        spec: &ExchangeSpec,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Checks that an exchange exists without declaring it.
    ///
    /// # Errors
    /// [`BrokerError::NotFound`] if it doesn't.
    fn check_exchange(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Checks that a queue exists without declaring it, returning its
    /// current counts.
    ///
    /// # Errors
    /// [`BrokerError::NotFound`] if it doesn't. Like any channel
    /// exception, this closes the channel.
    fn check_queue(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<QueueStatus, BrokerError>> + Send;

    /// Declares a queue. Idempotent for identical parameters.
    ///
    /// # Errors
    /// [`BrokerError::Conflict`] if the queue exists with different flags
    /// or arguments.
    fn declare_queue(
        &self,
        spec: &QueueSpec,
    ) -> impl Future<Output = Result<QueueStatus, BrokerError>> + Send;

    /// Binds a queue to an exchange under a routing key (or pattern).
    fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Deletes a queue, optionally only if it has no consumers and/or no
    /// messages. Returns the number of messages dropped with it.
    fn delete_queue(
        &self,
        queue: &str,
        if_unused: bool,
        if_empty: bool,
    ) -> impl Future<Output = Result<u32, BrokerError>> + Send;

    /// Hands a message to the broker. Does not wait for any confirmation
    /// that it reached a queue.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        content_type: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Starts a push-based consumer on `queue` with manual acknowledgment.
    fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> impl Future<Output = Result<Self::Consumer, BrokerError>> + Send;

    /// Closes the channel. Unsettled deliveries return to their queues.
    fn close(&self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// A stream of deliveries pushed by the broker for one consumer.
pub trait DeliveryStream: Send + 'static {
    /// The delivery type yielded by this stream.
    type Delivery: Delivery;

    /// Waits for the next delivery.
    ///
    /// Returns `Ok(None)` once the channel or connection is closed.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Self::Delivery>, BrokerError>> + Send;
}

/// One message handed to a consumer, pending a terminal decision.
///
/// `ack` and `nack` consume the delivery: a delivery can reach exactly one
/// terminal state, and the compiler rejects settling it twice.
pub trait Delivery: Send + 'static {
    /// The raw message body.
    fn payload(&self) -> &[u8];

    /// The routing key the message was published with.
    fn routing_key(&self) -> &str;

    fn delivery_tag(&self) -> DeliveryTag;

    /// `true` if this message was delivered before and requeued.
    fn redelivered(&self) -> bool;

    /// Acknowledges the delivery; the broker forgets the message.
    fn ack(self) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Negatively acknowledges the delivery.
    ///
    /// With `requeue`, the message goes back to its queue. Without, it is
    /// dead-lettered if the queue has a dead-letter exchange, else dropped.
    fn nack(
        self,
        requeue: bool,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;
}
