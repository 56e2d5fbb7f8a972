//! Wire protocol between clients and the hub.
//!
//! Every frame is a JSON object. Client events carry a `type` discriminator;
//! server events do too, except the position delta which is a bare
//! [`Participant`] record.

use serde::{Deserialize, Serialize};

use crate::errors::HubError;
use crate::message::ChatMessage;
use crate::participant::Participant;

/// Event sent by a connected client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// Liveness signal.
    #[serde(rename = "heartbeat")]
    Heartbeat {},
    /// New coordinates for the sender.
    #[serde(rename = "position", rename_all = "camelCase")]
    Position {
        /// Horizontal coordinate.
        pos_x: f64,
        /// Vertical coordinate.
        pos_y: f64,
    },
    /// Replacement list of countries the sender has visited.
    #[serde(rename = "visitedCountry")]
    VisitedCountry {
        /// Full list; replaces whatever was stored.
        countries: Vec<String>,
    },
    /// Ask for another participant's visited countries.
    #[serde(rename = "getCountries")]
    GetCountries {
        /// Participant being queried.
        username: String,
    },
    /// Direct message to another participant.
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat {
        /// Display name of the recipient.
        recipient_username: String,
        /// Message body.
        message: String,
    },
}

impl InboundEvent {
    /// Parse a client frame.
    pub fn parse(text: &str) -> Result<Self, HubError> {
        serde_json::from_str(text).map_err(|e| HubError::MalformedPayload(e.to_string()))
    }

    /// The `type` discriminator, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heartbeat {} => "heartbeat",
            Self::Position { .. } => "position",
            Self::VisitedCountry { .. } => "visitedCountry",
            Self::GetCountries { .. } => "getCountries",
            Self::Chat { .. } => "chat",
        }
    }
}

/// Machine-readable reason carried by an `error` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The frame was not valid JSON or lacked required fields.
    InvalidPayload,
    /// A `getCountries` query named someone who is not connected.
    ParticipantNotFound,
    /// The allocated display name is already registered.
    DuplicateName,
    /// The session is not open.
    InvalidState,
}

/// Typed event sent by the hub.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    /// First frame after a connection opens.
    #[serde(rename = "init")]
    Init {
        /// Name assigned to the receiving client.
        username: String,
        /// Everyone connected, including the receiver.
        users: Vec<Participant>,
    },
    /// Someone left; carries the refreshed roster.
    #[serde(rename = "userDisconnected")]
    UserDisconnected {
        /// Everyone still connected.
        users: Vec<Participant>,
    },
    /// Reply to a heartbeat.
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck {},
    /// Reply to a `getCountries` query.
    #[serde(rename = "getCountries")]
    GetCountries {
        /// Participant that was queried.
        username: String,
        /// Their visited countries.
        countries: Vec<String>,
    },
    /// A direct message delivered to the recipient's private topic.
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat {
        /// Sender display name.
        username: String,
        /// Recipient display name.
        recipient_username: String,
        /// Message body.
        message: String,
        /// Epoch milliseconds at which the hub accepted the message.
        timestamp: i64,
    },
    /// Rejection of a client frame.
    #[serde(rename = "error")]
    Error {
        /// Reason code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
}

impl OutboundEvent {
    /// Build an `error` event.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<ChatMessage> for OutboundEvent {
    fn from(msg: ChatMessage) -> Self {
        Self::Chat {
            username: msg.sender,
            recipient_username: msg.recipient,
            message: msg.text,
            timestamp: msg.timestamp,
        }
    }
}

/// Anything the hub writes to a socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerEvent {
    /// A `type`-tagged event.
    Event(OutboundEvent),
    /// A bare participant record (position delta).
    Participant(Participant),
}

impl ServerEvent {
    /// Serialize to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> Result<String, HubError> {
        serde_json::to_string(self).map_err(|e| HubError::Serialization(e.to_string()))
    }
}

impl From<OutboundEvent> for ServerEvent {
    fn from(event: OutboundEvent) -> Self {
        Self::Event(event)
    }
}

impl From<Participant> for ServerEvent {
    fn from(participant: Participant) -> Self {
        Self::Participant(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn to_value(event: impl Into<ServerEvent>) -> Value {
        let json = event.into().to_json().unwrap();
        serde_json::from_str(&json).unwrap()
    }

    // ── inbound ─────────────────────────────────────────────────────

    #[test]
    fn parse_heartbeat() {
        let event = InboundEvent::parse(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(event, InboundEvent::Heartbeat {});
        assert_eq!(event.kind(), "heartbeat");
    }

    #[test]
    fn parse_position_accepts_integers() {
        let event = InboundEvent::parse(r#"{"type":"position","posX":5,"posY":3}"#).unwrap();
        assert_eq!(event, InboundEvent::Position { pos_x: 5.0, pos_y: 3.0 });
    }

    #[test]
    fn parse_visited_country() {
        let event =
            InboundEvent::parse(r#"{"type":"visitedCountry","countries":["FR","JP"]}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::VisitedCountry {
                countries: vec!["FR".into(), "JP".into()]
            }
        );
    }

    #[test]
    fn parse_get_countries() {
        let event = InboundEvent::parse(r#"{"type":"getCountries","username":"Tortue timide"}"#)
            .unwrap();
        assert_eq!(
            event,
            InboundEvent::GetCountries {
                username: "Tortue timide".into()
            }
        );
    }

    #[test]
    fn parse_chat() {
        let event = InboundEvent::parse(
            r#"{"type":"chat","recipientUsername":"Kangourou","message":"hi"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::Chat {
                recipient_username: "Kangourou".into(),
                message: "hi".into()
            }
        );
        assert_eq!(event.kind(), "chat");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let err = InboundEvent::parse("not json").unwrap_err();
        assert!(matches!(err, HubError::MalformedPayload(_)));
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = InboundEvent::parse(r#"{"type":"teleport"}"#).unwrap_err();
        assert!(matches!(err, HubError::MalformedPayload(_)));
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(InboundEvent::parse(r#"{"type":"position","posX":1}"#).is_err());
        assert!(InboundEvent::parse(r#"{"type":"chat","message":"hi"}"#).is_err());
        assert!(InboundEvent::parse(r#"{"type":"getCountries"}"#).is_err());
        assert!(InboundEvent::parse(r#"{"posX":1,"posY":2}"#).is_err());
    }

    #[test]
    fn parse_rejects_wrong_field_types() {
        assert!(InboundEvent::parse(r#"{"type":"position","posX":"a","posY":2}"#).is_err());
        assert!(InboundEvent::parse(r#"{"type":"visitedCountry","countries":"FR"}"#).is_err());
    }

    // ── outbound ────────────────────────────────────────────────────

    #[test]
    fn init_shape() {
        let v = to_value(OutboundEvent::Init {
            username: "Lynx".into(),
            users: vec![Participant::new("Lynx", 1)],
        });
        assert_eq!(v["type"], "init");
        assert_eq!(v["username"], "Lynx");
        assert_eq!(v["users"][0]["username"], "Lynx");
    }

    #[test]
    fn user_disconnected_shape() {
        let v = to_value(OutboundEvent::UserDisconnected { users: vec![] });
        assert_eq!(v, json!({"type": "userDisconnected", "users": []}));
    }

    #[test]
    fn heartbeat_ack_shape() {
        let v = to_value(OutboundEvent::HeartbeatAck {});
        assert_eq!(v, json!({"type": "heartbeat_ack"}));
    }

    #[test]
    fn get_countries_shape() {
        let v = to_value(OutboundEvent::GetCountries {
            username: "Chat sprinteur".into(),
            countries: vec!["PE".into()],
        });
        assert_eq!(
            v,
            json!({"type": "getCountries", "username": "Chat sprinteur", "countries": ["PE"]})
        );
    }

    #[test]
    fn chat_shape_from_envelope() {
        let msg = ChatMessage::new("Lynx", "Kangourou", "hi", 77);
        let v = to_value(OutboundEvent::from(msg));
        assert_eq!(
            v,
            json!({
                "type": "chat",
                "username": "Lynx",
                "recipientUsername": "Kangourou",
                "message": "hi",
                "timestamp": 77
            })
        );
    }

    #[test]
    fn error_shape() {
        let v = to_value(OutboundEvent::error(ErrorCode::ParticipantNotFound, "gone"));
        assert_eq!(
            v,
            json!({"type": "error", "code": "PARTICIPANT_NOT_FOUND", "message": "gone"})
        );
    }

    #[test]
    fn participant_delta_is_untagged() {
        let mut p = Participant::new("Lynx", 9);
        p.pos_x = 5.0;
        p.pos_y = 3.0;
        let v = to_value(p);
        assert!(v.get("type").is_none());
        assert_eq!(v["posX"], 5.0);
    }

    #[test]
    fn server_event_reads_back_both_forms() {
        let tagged: ServerEvent = serde_json::from_str(r#"{"type":"heartbeat_ack"}"#).unwrap();
        assert_eq!(tagged, ServerEvent::Event(OutboundEvent::HeartbeatAck {}));

        let bare: ServerEvent = serde_json::from_str(
            r#"{"username":"Lynx","posX":1.0,"posY":2.0,"visitedCountries":[],"lastHeartbeat":3}"#,
        )
        .unwrap();
        assert!(matches!(bare, ServerEvent::Participant(p) if p.username == "Lynx"));
    }
}
