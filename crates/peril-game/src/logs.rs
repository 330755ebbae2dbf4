//! Game log entries: construction, spam content, and the server's record.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use peril_protocol::GameLog;
use rand::Rng;

const MALICIOUS_LOGS: [&str; 6] = [
    "Never interrupt your enemy when he is making a mistake.",
    "The hardest thing of all for a soldier is to retreat.",
    "A soldier will fight long and hard for a bit of colored ribbon.",
    "It is well that war is so terrible, otherwise we should grow too fond of it.",
    "The art of war is simple enough. Find out where your enemy is. Get at him as soon as you can. Strike him as hard as you can, and keep moving on.",
    "All warfare is based on deception.",
];

/// A random log line, used by the `spam` command to load the log queue.
pub fn malicious_log() -> &'static str {
    let mut rng = rand::rng();
    MALICIOUS_LOGS[rng.random_range(0..MALICIOUS_LOGS.len())]
}

/// A log entry stamped with the current time in milliseconds.
pub fn game_log(username: impl Into<String>, message: impl Into<String>) -> GameLog {
    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    GameLog {
        current_time,
        message: message.into(),
        username: username.into(),
    }
}

/// Game logs received by the server, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct LogBook(Arc<Mutex<Vec<GameLog>>>);

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, log: GameLog) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(log);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every recorded entry.
    pub fn entries(&self) -> Vec<GameLog> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
