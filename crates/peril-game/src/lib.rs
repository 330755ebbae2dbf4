//! Game state for Peril players.
//!
//! This crate is the application side of the messaging layer: it owns a
//! player's units and the pause flag, classifies inbound moves, and turns
//! each classification into an acknowledgment decision.
//!
//! # How it fits in the stack
//!
//! ```text
//! Processes (above)   ← REPL commands, server/client wiring
//!     ↕
//! Game Layer (this crate)  ← GameState, handlers, command parsing
//!     ↕
//! PubSub Layer (below)  ← AckType, typed subscriptions
//! ```

mod commands;
mod error;
mod handlers;
mod logs;
mod state;

pub use commands::{CLIENT_HELP, ClientCommand, SERVER_HELP, ServerCommand};
pub use error::GameError;
pub use handlers::{handler_log, handler_move, handler_pause};
pub use logs::{LogBook, game_log, malicious_log};
pub use state::{GameHandle, GameState, GameStatus, LOCATIONS, MoveOutcome, is_known_location};
