//! Fan-out channel names.

use std::fmt;

/// Name of the shared presence topic.
pub const USERS_TOPIC: &str = "users";

/// Prefix of every private inbox topic.
pub const CHAT_TOPIC_PREFIX: &str = "chat-";

/// A named fan-out channel.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Topic {
    /// The shared `users` topic every participant joins on open.
    Users,
    /// The private inbox `chat-<name>` of one participant.
    Chat(String),
}

impl Topic {
    /// Private inbox topic for `name`.
    pub fn chat(name: impl Into<String>) -> Self {
        Self::Chat(name.into())
    }

    /// Topic key used by the router.
    pub fn key(&self) -> String {
        match self {
            Self::Users => USERS_TOPIC.to_string(),
            Self::Chat(name) => format!("{CHAT_TOPIC_PREFIX}{name}"),
        }
    }

    /// Parse a router key back into a topic.
    pub fn parse(key: &str) -> Option<Self> {
        if key == USERS_TOPIC {
            return Some(Self::Users);
        }
        key.strip_prefix(CHAT_TOPIC_PREFIX)
            .filter(|name| !name.is_empty())
            .map(Self::chat)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Users => f.write_str(USERS_TOPIC),
            Self::Chat(name) => write!(f, "{CHAT_TOPIC_PREFIX}{name}"),
        }
    }
}
