//! Metric names recorded by the hub.

/// Sessions opened total (counter).
pub const SESSIONS_OPENED_TOTAL: &str = "globetrot_sessions_opened_total";
/// Sessions closed total (counter).
pub const SESSIONS_CLOSED_TOTAL: &str = "globetrot_sessions_closed_total";
/// Registered participants (gauge).
pub const PARTICIPANTS_ACTIVE: &str = "globetrot_participants_active";
/// Participants evicted by the liveness sweeper (counter).
pub const EVICTIONS_TOTAL: &str = "globetrot_evictions_total";
/// Inbound client events total (counter, labels: type).
pub const INBOUND_EVENTS_TOTAL: &str = "globetrot_inbound_events_total";
/// Inbound frames rejected as malformed (counter).
pub const MALFORMED_PAYLOADS_TOTAL: &str = "globetrot_malformed_payloads_total";
/// Topic deliveries dropped because a subscriber queue was full or closed (counter).
pub const PUBLISH_DROPS_TOTAL: &str = "globetrot_publish_drops_total";
/// Sweep pass duration seconds (histogram).
pub const SWEEP_DURATION_SECONDS: &str = "globetrot_sweep_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            SESSIONS_OPENED_TOTAL,
            SESSIONS_CLOSED_TOTAL,
            PARTICIPANTS_ACTIVE,
            EVICTIONS_TOTAL,
            INBOUND_EVENTS_TOTAL,
            MALFORMED_PAYLOADS_TOTAL,
            PUBLISH_DROPS_TOTAL,
            SWEEP_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
            assert!(name.starts_with("globetrot_"));
        }
    }
}
