//! Direct chat envelope.

use serde::{Deserialize, Serialize};

/// A direct message from one participant to another.
///
/// Lives only for the duration of a publish; nothing is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the author.
    pub sender: String,
    /// Display name of the intended reader.
    pub recipient: String,
    /// Message body.
    pub text: String,
    /// Epoch milliseconds at which the hub accepted the message.
    pub timestamp: i64,
}

impl ChatMessage {
    /// Build an envelope stamped with `timestamp`.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        text: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            text: text.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_all_fields() {
        let msg = ChatMessage::new("Lynx", "Kangourou", "hi", 123);
        assert_eq!(msg.sender, "Lynx");
        assert_eq!(msg.recipient, "Kangourou");
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.timestamp, 123);
    }
}
