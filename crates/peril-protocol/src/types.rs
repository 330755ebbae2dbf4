//! Payload types that travel through the broker.
//!
//! Every type here is published by one process and decoded by another,
//! possibly written against a different build. Field names on the wire
//! are camelCase (`isPaused`, `toLocation`) so that non-Rust tooling
//! reading the dead-letter queue sees the same shape as the game.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Pause control
// ---------------------------------------------------------------------------

/// Pause/resume broadcast from the server to every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayingState {
    pub is_paused: bool,
}

// ---------------------------------------------------------------------------
// Units and players
// ---------------------------------------------------------------------------

/// The kind of a unit.
///
/// Serialized in lowercase (`"infantry"`), which is also what players
/// type at the prompt, so [`FromStr`] and serde agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRank {
    Infantry,
    Cavalry,
    Artillery,
}

impl UnitRank {
    /// All ranks, in display order.
    pub const ALL: [UnitRank; 3] =
        [UnitRank::Infantry, UnitRank::Cavalry, UnitRank::Artillery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infantry => "infantry",
            Self::Cavalry => "cavalry",
            Self::Artillery => "artillery",
        }
    }
}

impl fmt::Display for UnitRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitRank {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.as_str() == s)
            .ok_or_else(|| {
                ProtocolError::InvalidPayload(format!("unknown unit rank {s:?}"))
            })
    }
}

/// A map region.
///
/// Kept as an open string on the wire: which names are playable is a
/// game rule, and a consumer must be able to decode (and then reject) a
/// move to a location it does not recognise, including an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub String);

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A single unit on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub rank: UnitRank,
    pub location: Location,
}

/// A snapshot of a player and everything they own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    /// Units keyed by id. A `BTreeMap` keeps the encoded form stable,
    /// which makes dead-lettered messages diffable.
    pub units: BTreeMap<u32, Unit>,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            units: BTreeMap::new(),
        }
    }

    /// Returns the distinct locations this player occupies.
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        let mut seen: Vec<&Location> =
            self.units.values().map(|u| &u.location).collect();
        seen.sort();
        seen.dedup();
        seen.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Domain events
// ---------------------------------------------------------------------------

/// A declared move of one or more units, published on the topic exchange
/// under `army_moves.<username>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmyMove {
    /// The mover, as they looked right after the move.
    pub player: Player,
    pub units: Vec<Unit>,
    pub to_location: Location,
}

/// Published when a move lands on an occupied location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionOfWar {
    pub attacker: Player,
    pub defender: Player,
}

/// One line of the shared game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLog {
    /// Milliseconds since the Unix epoch, as seen by the publisher.
    pub current_time: u64,
    pub message: String,
    pub username: String,
}
