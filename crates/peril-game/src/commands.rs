//! Parsing of REPL lines into commands.

use peril_protocol::{Location, UnitRank};

use crate::GameError;

pub const CLIENT_HELP: &str = "\
Possible commands:
* move <location> <unitID> <unitID> <unitID>...
    example:
    move asia 1
* spawn <location> <rank>
    example:
    spawn europe infantry
* status
* spam <n>
    example:
    spam 5
* quit
* help";

pub const SERVER_HELP: &str = "\
Possible commands:
* pause   - Pauses the game
* resume  - Resumes the game
* quit    - Exits the server
* help    - Prints this help message";

/// A command typed at the client prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Spawn { location: Location, rank: UnitRank },
    Move { location: Location, unit_ids: Vec<u32> },
    Status,
    /// Publish this many random game logs.
    Spam(u32),
    Help,
    Quit,
}

impl ClientCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, GameError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            return Ok(None);
        };

        let parsed = match command {
            "spawn" => {
                let [location, rank] = args else {
                    return Err(GameError::Usage("spawn <location> <rank>"));
                };
                let rank = rank
                    .parse()
                    .map_err(|_| GameError::UnknownRank(rank.to_string()))?;
                Self::Spawn {
                    location: Location::new(*location),
                    rank,
                }
            }
            "move" => {
                let Some((location, ids)) = args.split_first() else {
                    return Err(GameError::Usage("move <location> <unitID> [unitID...]"));
                };
                if ids.is_empty() {
                    return Err(GameError::Usage("move <location> <unitID> [unitID...]"));
                }
                let unit_ids = ids
                    .iter()
                    .map(|id| id.parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| GameError::Usage("unit IDs must be numbers"))?;
                Self::Move {
                    location: Location::new(*location),
                    unit_ids,
                }
            }
            "status" => Self::Status,
            "spam" => {
                let count = args
                    .first()
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or(GameError::Usage("spam <n>"))?;
                Self::Spam(count)
            }
            "help" => Self::Help,
            "quit" => Self::Quit,
            other => return Err(GameError::UnknownCommand(other.to_string())),
        };
        Ok(Some(parsed))
    }
}

/// A command typed at the server prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Pause,
    Resume,
    Help,
    Quit,
}

impl ServerCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, GameError> {
        let Some(command) = line.split_whitespace().next() else {
            return Ok(None);
        };
        match command {
            "pause" => Ok(Some(Self::Pause)),
            "resume" => Ok(Some(Self::Resume)),
            "help" => Ok(Some(Self::Help)),
            "quit" => Ok(Some(Self::Quit)),
            other => Err(GameError::UnknownCommand(other.to_string())),
        }
    }
}
