//! Presence record for one connected participant.

use serde::{Deserialize, Serialize};

/// Display names handed out when no pool is configured.
pub const DEFAULT_NAMES: [&str; 10] = [
    "Lynx philosophe",
    "Kangourou turbulant",
    "Gorille végétarien",
    "Chat sprinteur",
    "Tortue timide",
    "Aligator mignon",
    "Aigle myope",
    "Éléphant acrobate",
    "Chameau surfeur",
    "Hibou bavard",
];

/// One connected participant as seen by every client.
///
/// Serialized as
/// `{"username", "posX", "posY", "visitedCountries", "lastHeartbeat"}`;
/// the same shape is broadcast bare (without a `type` tag) on position
/// updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Display name, unique across the registry.
    pub username: String,
    /// Horizontal coordinate.
    pub pos_x: f64,
    /// Vertical coordinate.
    pub pos_y: f64,
    /// Countries the participant has visited, in client order.
    pub visited_countries: Vec<String>,
    /// Epoch milliseconds of the most recent inbound activity.
    pub last_heartbeat: i64,
}

impl Participant {
    /// A freshly connected participant at the origin with no travel history.
    pub fn new(username: impl Into<String>, now_millis: i64) -> Self {
        Self {
            username: username.into(),
            pos_x: 0.0,
            pos_y: 0.0,
            visited_countries: Vec::new(),
            last_heartbeat: now_millis,
        }
    }

    /// Whether the participant has been silent since before `threshold_millis`.
    pub fn is_inactive_since(&self, threshold_millis: i64) -> bool {
        self.last_heartbeat < threshold_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_participant_defaults() {
        let p = Participant::new("Lynx philosophe", 1_000);
        assert_eq!(p.username, "Lynx philosophe");
        assert!(p.pos_x.abs() < f64::EPSILON);
        assert!(p.pos_y.abs() < f64::EPSILON);
        assert!(p.visited_countries.is_empty());
        assert_eq!(p.last_heartbeat, 1_000);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let mut p = Participant::new("Lynx", 1_700_000_000_000);
        p.pos_x = 5.0;
        p.pos_y = 3.0;
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["username"], "Lynx");
        assert_eq!(value["posX"], 5.0);
        assert_eq!(value["posY"], 3.0);
        assert_eq!(value["visitedCountries"], serde_json::json!([]));
        assert_eq!(value["lastHeartbeat"], 1_700_000_000_000_i64);
        assert!(value.get("type").is_none());
    }

    #[test]
    fn inactivity_is_strict() {
        let p = Participant::new("Aigle myope", 5_000);
        assert!(p.is_inactive_since(5_001));
        assert!(!p.is_inactive_since(5_000));
        assert!(!p.is_inactive_since(4_999));
    }
}
