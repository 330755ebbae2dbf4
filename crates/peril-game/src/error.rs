//! Error types for the game layer.

/// Errors raised by player commands.
///
/// None of these involve the broker: a failed command never publishes
/// anything.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    /// The location is not on the map.
    #[error("unknown location {0:?}")]
    UnknownLocation(String),

    #[error("unknown rank {0:?}")]
    UnknownRank(String),

    /// The player has no unit with this ID.
    #[error("unit {0} not found")]
    UnknownUnit(u32),

    /// Units cannot move while the server has the game paused.
    #[error("the game is paused, units cannot move")]
    Paused,

    /// A command was missing arguments or had malformed ones.
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}
