//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section is `#[serde(default)]`
//! so a partial file only overrides what it names.

use std::time::Duration;

use globetrot_core::DEFAULT_NAMES;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 4000 },
///   "presence": { "heartbeatTimeoutMs": 10000 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobetrotSettings {
    /// Settings schema version.
    pub version: String,
    /// Network binding.
    pub server: ServerSettings,
    /// Liveness and delivery tuning.
    pub presence: PresenceSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Display name pool.
    pub names: NameSettings,
}

impl Default for GlobetrotSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            presence: PresenceSettings::default(),
            logging: LoggingSettings::default(),
            names: NameSettings::default(),
        }
    }
}

impl GlobetrotSettings {
    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.presence.heartbeat_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "presence.heartbeatTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.presence.cleanup_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "presence.cleanupIntervalMs must be greater than zero".into(),
            ));
        }
        if self.presence.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "presence.sendQueueCapacity must be greater than zero".into(),
            ));
        }
        if self.names.pool.is_empty() {
            return Err(SettingsError::InvalidValue("names.pool is empty".into()));
        }
        for (i, name) in self.names.pool.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SettingsError::InvalidValue(format!(
                    "names.pool[{i}] is blank"
                )));
            }
            if self.names.pool[..i].contains(name) {
                return Err(SettingsError::InvalidValue(format!(
                    "names.pool contains '{name}' more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Network binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

/// Liveness and delivery tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceSettings {
    /// Silence after which a participant is evicted, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Period of the liveness sweep, in milliseconds.
    pub cleanup_interval_ms: u64,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 10_000,
            cleanup_interval_ms: 15_000,
            send_queue_capacity: 256,
        }
    }
}

impl PresenceSettings {
    /// Heartbeat timeout as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Sweep period as a `Duration`.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Display name pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NameSettings {
    /// Names handed out to new connections. Its length caps concurrent
    /// participants.
    pub pool: Vec<String>,
}

impl Default for NameSettings {
    fn default() -> Self {
        Self {
            pool: DEFAULT_NAMES.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = GlobetrotSettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 4000);
        assert_eq!(s.presence.heartbeat_timeout(), Duration::from_secs(10));
        assert_eq!(s.presence.cleanup_interval(), Duration::from_secs(15));
        assert_eq!(s.presence.send_queue_capacity, 256);
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
        assert_eq!(s.names.pool.len(), 10);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(GlobetrotSettings::default()).unwrap();
        assert_eq!(value["presence"]["heartbeatTimeoutMs"], 10_000);
        assert_eq!(value["presence"]["cleanupIntervalMs"], 15_000);
        assert_eq!(value["presence"]["sendQueueCapacity"], 256);
        assert_eq!(value["names"]["pool"][0], "Lynx philosophe");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: GlobetrotSettings =
            serde_json::from_str(r#"{"presence": {"heartbeatTimeoutMs": 3000}}"#).unwrap();
        assert_eq!(s.presence.heartbeat_timeout_ms, 3000);
        assert_eq!(s.presence.cleanup_interval_ms, 15_000);
        assert_eq!(s.server.port, 4000);
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let mut s = GlobetrotSettings::default();
        s.presence.heartbeat_timeout_ms = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));

        let mut s = GlobetrotSettings::default();
        s.presence.cleanup_interval_ms = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let mut s = GlobetrotSettings::default();
        s.presence.send_queue_capacity = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_pools() {
        let mut s = GlobetrotSettings::default();
        s.names.pool.clear();
        assert!(s.validate().is_err());

        let mut s = GlobetrotSettings::default();
        s.names.pool = vec!["Lynx".into(), "Lynx".into()];
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let mut s = GlobetrotSettings::default();
        s.names.pool = vec!["Lynx".into(), "  ".into()];
        assert!(s.validate().is_err());
    }
}
