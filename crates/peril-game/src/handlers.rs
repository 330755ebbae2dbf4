//! Subscription handlers: each classifies a value against the game and
//! returns the acknowledgment decision.

use peril_protocol::{ArmyMove, GameLog, PlayingState, RecognitionOfWar};
use peril_pubsub::AckType;
use tokio::sync::mpsc;

use crate::{GameHandle, LogBook, MoveOutcome};

/// Applies pause/resume to the game. Always acknowledged.
pub fn handler_pause(game: GameHandle) -> impl FnMut(PlayingState) -> AckType + Send + 'static {
    move |state| {
        let mut game = game.lock();
        game.handle_pause(state);
        if state.is_paused {
            tracing::info!(player = %game.username(), "game paused");
        } else {
            tracing::info!(player = %game.username(), "game resumed");
        }
        AckType::Ack
    }
}

/// Classifies a move from any player.
///
/// Safe moves and moves that start a war are acknowledged; a war also
/// sends a [`RecognitionOfWar`] to `war`, if given, for publishing. Our
/// own echoed moves and invalid moves are discarded to the dead-letter
/// queue.
pub fn handler_move(
    game: GameHandle,
    war: Option<mpsc::UnboundedSender<RecognitionOfWar>>,
) -> impl FnMut(ArmyMove) -> AckType + Send + 'static {
    move |army_move| {
        let game = game.lock();
        let from = &army_move.player.username;
        match game.handle_move(&army_move) {
            MoveOutcome::Safe => {
                tracing::info!(from = %from, to = %army_move.to_location, units = army_move.units.len(), "move detected, safe");
                AckType::Ack
            }
            MoveOutcome::MakeWar => {
                tracing::info!(from = %from, to = %army_move.to_location, "move detected, war");
                if let Some(war) = &war {
                    let recognition = RecognitionOfWar {
                        attacker: army_move.player.clone(),
                        defender: game.player().clone(),
                    };
                    if war.send(recognition).is_err() {
                        tracing::warn!(from = %from, "war recognition dropped, publisher gone");
                    }
                }
                AckType::Ack
            }
            MoveOutcome::SamePlayer => {
                tracing::debug!("own move ignored");
                AckType::NackDiscard
            }
            MoveOutcome::Invalid(reason) => {
                tracing::warn!(from = %from, reason = %reason, "invalid move discarded");
                AckType::NackDiscard
            }
        }
    }
}

/// Records a game log on the server. Always acknowledged.
pub fn handler_log(book: LogBook) -> impl FnMut(GameLog) -> AckType + Send + 'static {
    move |log| {
        tracing::info!(player = %log.username, time = log.current_time, message = %log.message, "game log");
        book.record(log);
        AckType::Ack
    }
}
