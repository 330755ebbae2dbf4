//! Exchange names, queue names and routing-key conventions.
//!
//! Every process in a game must agree on these, so they live in one
//! immutable struct that is built once and passed down explicitly.
//! Routing keys follow `<event-prefix>.<qualifier>`, where the qualifier
//! is usually the publishing player's username.

/// Shared broker naming for one Peril deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Direct exchange for low fan-out control messages (pause/resume).
    pub direct_exchange: String,
    /// Topic exchange for pattern-routed domain events.
    pub topic_exchange: String,
    /// Fanout exchange every primary queue dead-letters into.
    pub dead_letter_exchange: String,
    /// The single queue bound to [`dead_letter_exchange`](Self::dead_letter_exchange).
    pub dead_letter_queue: String,
    /// Exact key for pause/resume on the direct exchange.
    pub pause_key: String,
    pub army_moves_prefix: String,
    pub war_recognitions_prefix: String,
    pub game_log_slug: String,
    /// Durable, globally-named queue collecting every game log.
    pub game_log_queue: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            direct_exchange: "peril_direct".to_string(),
            topic_exchange: "peril_topic".to_string(),
            dead_letter_exchange: "dead_letter_exchange".to_string(),
            dead_letter_queue: "peril_dlq".to_string(),
            pause_key: "pause".to_string(),
            army_moves_prefix: "army_moves".to_string(),
            war_recognitions_prefix: "war".to_string(),
            game_log_slug: "game_logs".to_string(),
            game_log_queue: "game_logs".to_string(),
        }
    }
}

impl RoutingConfig {
    /// `<prefix>.<qualifier>`
    pub fn key(prefix: &str, qualifier: &str) -> String {
        format!("{prefix}.{qualifier}")
    }

    /// Pattern matching exactly one qualifier under `prefix`.
    pub fn any(prefix: &str) -> String {
        format!("{prefix}.*")
    }

    /// Per-player pause queue. Deterministic so a re-joining player
    /// rebinds the same queue instead of leaking a new one.
    pub fn pause_queue(&self, username: &str) -> String {
        Self::key(&self.pause_key, username)
    }

    pub fn army_moves_queue(&self, username: &str) -> String {
        Self::key(&self.army_moves_prefix, username)
    }

    pub fn army_moves_key(&self, username: &str) -> String {
        Self::key(&self.army_moves_prefix, username)
    }

    pub fn army_moves_pattern(&self) -> String {
        Self::any(&self.army_moves_prefix)
    }

    pub fn war_key(&self, username: &str) -> String {
        Self::key(&self.war_recognitions_prefix, username)
    }

    pub fn game_log_key(&self, username: &str) -> String {
        Self::key(&self.game_log_slug, username)
    }

    pub fn game_log_pattern(&self) -> String {
        Self::any(&self.game_log_slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let routing = RoutingConfig::default();
        assert_eq!(routing.direct_exchange, "peril_direct");
        assert_eq!(routing.topic_exchange, "peril_topic");
        assert_eq!(routing.dead_letter_exchange, "dead_letter_exchange");
        assert_eq!(routing.dead_letter_queue, "peril_dlq");
    }

    #[test]
    fn test_per_player_names_are_deterministic() {
        let routing = RoutingConfig::default();
        assert_eq!(routing.pause_queue("alice"), "pause.alice");
        assert_eq!(routing.pause_queue("alice"), routing.pause_queue("alice"));
        assert_eq!(routing.army_moves_queue("alice"), "army_moves.alice");
        assert_eq!(routing.war_key("bob"), "war.bob");
        assert_eq!(routing.game_log_key("bob"), "game_logs.bob");
    }

    #[test]
    fn test_patterns_use_single_segment_wildcard() {
        let routing = RoutingConfig::default();
        assert_eq!(routing.army_moves_pattern(), "army_moves.*");
        assert_eq!(routing.game_log_pattern(), "game_logs.*");
    }
}
