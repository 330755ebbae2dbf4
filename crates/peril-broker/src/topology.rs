//! Declarations: the parameters an exchange or queue is created with.

use std::fmt;

/// Exchange routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Routes on exact routing-key equality.
    Direct,
    /// Routes on dot-separated patterns: `*` matches one word,
    /// `#` matches zero or more.
    Topic,
    /// Routes to every bound queue, ignoring the key.
    Fanout,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Topic => "topic",
            Self::Fanout => "fanout",
        }
    }

    /// Returns `true` if a message published with `routing_key` should
    /// reach a queue bound with `binding_key`.
    pub fn routes(&self, binding_key: &str, routing_key: &str) -> bool {
        match self {
            Self::Direct => binding_key == routing_key,
            Self::Fanout => true,
            Self::Topic => {
                let pattern: Vec<&str> = binding_key.split('.').collect();
                let words: Vec<&str> = routing_key.split('.').collect();
                topic_matches(&pattern, &words)
            }
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn topic_matches(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((&"#", rest)) => {
            (0..=words.len()).any(|skip| topic_matches(rest, &words[skip..]))
        }
        Some((&"*", rest)) => {
            !words.is_empty() && topic_matches(rest, &words[1..])
        }
        Some((literal, rest)) => {
            words.first() == Some(literal) && topic_matches(rest, &words[1..])
        }
    }
}

/// Parameters of an exchange declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

impl ExchangeSpec {
    pub fn new(name: impl Into<String>, kind: ExchangeKind, durable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            durable,
        }
    }
}

/// Parameters of a queue declaration.
///
/// Two declarations of the same queue name must agree on every field,
/// otherwise the second one is a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    /// Survives a broker restart.
    pub durable: bool,
    /// Deleted when its last consumer goes away.
    pub auto_delete: bool,
    /// Usable only by the declaring connection.
    pub exclusive: bool,
    /// Exchange that receives messages discarded from this queue
    /// (`x-dead-letter-exchange`).
    pub dead_letter_exchange: Option<String>,
}

impl QueueSpec {
    /// A durable, shared queue with no dead-letter target.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            auto_delete: false,
            exclusive: false,
            dead_letter_exchange: None,
        }
    }

    /// A non-durable queue deleted when its last consumer disconnects.
    pub fn transient(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            auto_delete: true,
            exclusive: false,
            dead_letter_exchange: None,
        }
    }

    pub fn with_dead_letter_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.dead_letter_exchange = Some(exchange.into());
        self
    }
}

/// What the broker reports back for a declared queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub name: String,
    /// Messages ready for delivery (not counting unacknowledged ones).
    pub message_count: u32,
    pub consumer_count: u32,
}
