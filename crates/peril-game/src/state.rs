//! A player's view of the game: their units, and whether play is paused.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use peril_protocol::{ArmyMove, Location, Player, PlayingState, Unit, UnitRank};

use crate::GameError;

/// Every location units may occupy.
pub const LOCATIONS: [&str; 6] = [
    "americas",
    "europe",
    "africa",
    "asia",
    "antarctica",
    "australia",
];

pub fn is_known_location(location: &Location) -> bool {
    LOCATIONS.contains(&location.as_str())
}

// ---------------------------------------------------------------------------
// MoveOutcome
// ---------------------------------------------------------------------------

/// How an observed move affects the observing player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move is this player's own, echoed back by the topic exchange.
    SamePlayer,
    /// The moving player's units now share a location with ours.
    MakeWar,
    /// No contact.
    Safe,
    /// The move is malformed, e.g. it names no destination.
    Invalid(String),
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// One player's game state.
#[derive(Debug, Clone)]
pub struct GameState {
    player: Player,
    paused: bool,
    next_unit_id: u32,
}

impl GameState {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            player: Player::new(username),
            paused: false,
            next_unit_id: 1,
        }
    }

    pub fn username(&self) -> &str {
        &self.player.username
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Places a new unit and returns its ID. IDs are never reused.
    pub fn spawn(&mut self, location: Location, rank: UnitRank) -> Result<u32, GameError> {
        if !is_known_location(&location) {
            return Err(GameError::UnknownLocation(location.to_string()));
        }
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        self.player.units.insert(id, Unit { id, rank, location });
        tracing::debug!(player = %self.player.username, unit = id, %rank, "unit spawned");
        Ok(id)
    }

    /// Moves the given units and returns the move to announce.
    ///
    /// Nothing moves unless every unit exists and the game is running.
    pub fn move_units(&mut self, to: Location, unit_ids: &[u32]) -> Result<ArmyMove, GameError> {
        if self.paused {
            return Err(GameError::Paused);
        }
        if !is_known_location(&to) {
            return Err(GameError::UnknownLocation(to.to_string()));
        }
        if unit_ids.is_empty() {
            return Err(GameError::Usage("move <location> <unitID> [unitID...]"));
        }
        if let Some(missing) = unit_ids.iter().find(|id| !self.player.units.contains_key(*id)) {
            return Err(GameError::UnknownUnit(*missing));
        }

        let mut moved = Vec::with_capacity(unit_ids.len());
        for id in unit_ids {
            if let Some(unit) = self.player.units.get_mut(id) {
                unit.location = to.clone();
                moved.push(unit.clone());
            }
        }
        Ok(ArmyMove {
            player: self.player.clone(),
            units: moved,
            to_location: to,
        })
    }

    pub fn handle_pause(&mut self, state: PlayingState) {
        self.paused = state.is_paused;
    }

    /// Classifies a move published by any player, this one included.
    pub fn handle_move(&self, army_move: &ArmyMove) -> MoveOutcome {
        if army_move.to_location.is_empty() {
            return MoveOutcome::Invalid("move has no destination".to_string());
        }
        if !is_known_location(&army_move.to_location) {
            return MoveOutcome::Invalid(format!(
                "unknown destination {}",
                army_move.to_location
            ));
        }
        if army_move.player.username == self.player.username {
            return MoveOutcome::SamePlayer;
        }
        if self.overlapping_location(&army_move.player).is_some() {
            MoveOutcome::MakeWar
        } else {
            MoveOutcome::Safe
        }
    }

    /// The first location where both this player and `other` have units.
    pub fn overlapping_location(&self, other: &Player) -> Option<Location> {
        let ours: BTreeSet<&Location> = self.player.locations().collect();
        other.locations().find(|loc| ours.contains(loc)).cloned()
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            username: self.player.username.clone(),
            paused: self.paused,
            units: self.player.units.values().cloned().collect(),
        }
    }
}

/// A printable snapshot of a [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub username: String,
    pub paused: bool,
    pub units: Vec<Unit>,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.paused {
            return writeln!(f, "The game is paused.");
        }
        writeln!(f, "The game is not paused.")?;
        writeln!(
            f,
            "You are {}, and you have {} units.",
            self.username,
            self.units.len()
        )?;
        for unit in &self.units {
            writeln!(f, "* {}: {}, {}", unit.id, unit.location, unit.rank)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GameHandle
// ---------------------------------------------------------------------------

/// Shared access to one [`GameState`] from the REPL and from every
/// subscription handler.
///
/// Handlers run synchronously inside their subscription task, so a
/// blocking mutex is enough; the lock is never held across an await.
#[derive(Debug, Clone)]
pub struct GameHandle(Arc<Mutex<GameState>>);

impl GameHandle {
    pub fn new(state: GameState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Locks the state. A panic in another holder does not make the state
    /// unusable.
    pub fn lock(&self) -> MutexGuard<'_, GameState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_with_unit_in(name: &str, location: &str) -> GameState {
        let mut state = GameState::new(name);
        state
            .spawn(Location::new(location), UnitRank::Infantry)
            .unwrap();
        state
    }

    #[test]
    fn test_spawn_assigns_increasing_ids() {
        let mut state = GameState::new("alice");
        let a = state.spawn(Location::new("europe"), UnitRank::Infantry).unwrap();
        let b = state.spawn(Location::new("asia"), UnitRank::Cavalry).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(state.player().units.len(), 2);
    }

    #[test]
    fn test_spawn_rejects_unknown_location() {
        let mut state = GameState::new("alice");
        let err = state
            .spawn(Location::new("atlantis"), UnitRank::Artillery)
            .unwrap_err();
        assert_eq!(err, GameError::UnknownLocation("atlantis".into()));
    }

    #[test]
    fn test_move_relocates_units() {
        let mut state = player_with_unit_in("alice", "europe");
        let army_move = state.move_units(Location::new("asia"), &[1]).unwrap();
        assert_eq!(army_move.to_location, Location::new("asia"));
        assert_eq!(army_move.units.len(), 1);
        assert_eq!(state.player().units[&1].location, Location::new("asia"));
        assert_eq!(army_move.player.units[&1].location, Location::new("asia"));
    }

    #[test]
    fn test_move_is_all_or_nothing() {
        let mut state = player_with_unit_in("alice", "europe");
        let err = state.move_units(Location::new("asia"), &[1, 7]).unwrap_err();
        assert_eq!(err, GameError::UnknownUnit(7));
        assert_eq!(state.player().units[&1].location, Location::new("europe"));
    }

    #[test]
    fn test_move_rejected_while_paused() {
        let mut state = player_with_unit_in("alice", "europe");
        state.handle_pause(PlayingState { is_paused: true });
        assert_eq!(
            state.move_units(Location::new("asia"), &[1]).unwrap_err(),
            GameError::Paused
        );
        state.handle_pause(PlayingState { is_paused: false });
        assert!(state.move_units(Location::new("asia"), &[1]).is_ok());
    }

    #[test]
    fn test_own_move_is_same_player() {
        let mut state = player_with_unit_in("alice", "europe");
        let army_move = state.move_units(Location::new("europe"), &[1]).unwrap();
        assert_eq!(state.handle_move(&army_move), MoveOutcome::SamePlayer);
    }

    #[test]
    fn test_overlap_makes_war() {
        let alice = player_with_unit_in("alice", "europe");
        let mut bob = player_with_unit_in("bob", "asia");
        let army_move = bob.move_units(Location::new("europe"), &[1]).unwrap();
        assert_eq!(alice.handle_move(&army_move), MoveOutcome::MakeWar);
        assert_eq!(
            alice.overlapping_location(&army_move.player),
            Some(Location::new("europe"))
        );
    }

    #[test]
    fn test_distant_move_is_safe() {
        let alice = player_with_unit_in("alice", "europe");
        let mut bob = player_with_unit_in("bob", "asia");
        let army_move = bob.move_units(Location::new("africa"), &[1]).unwrap();
        assert_eq!(alice.handle_move(&army_move), MoveOutcome::Safe);
    }

    #[test]
    fn test_empty_destination_is_invalid() {
        let alice = player_with_unit_in("alice", "europe");
        let army_move = ArmyMove {
            player: Player::new("bob"),
            units: Vec::new(),
            to_location: Location::new(""),
        };
        assert!(matches!(alice.handle_move(&army_move), MoveOutcome::Invalid(_)));
    }

    #[test]
    fn test_status_lists_units() {
        let state = player_with_unit_in("alice", "europe");
        let text = state.status().to_string();
        assert!(text.contains("You are alice, and you have 1 units."));
        assert!(text.contains("* 1: europe, infantry"));

        let mut paused = state.clone();
        paused.handle_pause(PlayingState { is_paused: true });
        assert_eq!(paused.status().to_string(), "The game is paused.\n");
    }

    #[test]
    fn test_handle_recovers_from_poison() {
        let handle = GameHandle::new(GameState::new("alice"));
        let clone = handle.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock();
            panic!("boom");
        })
        .join();
        assert_eq!(handle.lock().username(), "alice");
    }
}
