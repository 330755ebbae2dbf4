//! Wire vocabulary for Peril.
//!
//! This crate defines what travels through the broker and how it is
//! turned into bytes:
//!
//! - **Types** ([`PlayingState`], [`ArmyMove`], [`GameLog`], etc.):
//!   the payloads that producers publish and consumers decode.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those payloads
//!   are converted to/from bytes.
//! - **Routing** ([`RoutingConfig`]): exchange names, queue names and
//!   routing-key conventions shared by every process.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits below the messaging core. It knows nothing
//! about channels, queues or acknowledgments, only about payload shapes
//! and their encoding.
//!
//! ```text
//! Broker (bytes + routing key) → Protocol (typed payload) → Game state
//! ```

mod codec;
mod error;
mod routing;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use routing::RoutingConfig;
pub use types::{
    ArmyMove, GameLog, Location, Player, PlayingState, RecognitionOfWar,
    Unit, UnitRank,
};
