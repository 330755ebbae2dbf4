//! Typed publish/subscribe layer for Peril.
//!
//! Sits between the game logic and a [`peril_broker::Broker`]: it declares
//! topology, publishes typed values, and runs one delivery loop per
//! subscription that turns every inbound message into exactly one
//! acknowledgment decision.
//!
//! # Key types
//!
//! - [`TopologyManager`]: declares exchanges and queue bindings
//! - [`Publisher`] / [`publish`]: encode a value and hand it to the broker
//! - [`subscribe`] / [`Subscription`]: consume a queue with a typed handler
//! - [`AckType`]: the decision a handler returns for each delivery
//! - [`declare_dead_letter_sink`]: the capture point for discarded messages

mod ack;
mod dead_letter;
mod error;
mod payload;
mod publisher;
mod subscriber;
mod topology;

pub use ack::{AckType, DeliveryOutcome};
pub use dead_letter::declare_dead_letter_sink;
pub use error::{Operation, PubSubError};
pub use payload::Payload;
pub use publisher::{Publisher, publish};
pub use subscriber::{Subscription, SubscriptionReport, subscribe};
pub use topology::{Durability, QueueHandle, TopologyManager};
