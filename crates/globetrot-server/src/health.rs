//! Occupancy report served at `/health`.

use std::time::Instant;

use globetrot_hub::Hub;
use serde::Serialize;

/// Body of `GET /health`.
///
/// `status` is `"full"` while the name pool is empty, since new clients are
/// refused until someone leaves; otherwise `"ok"`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `"ok"` or `"full"`.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Sockets currently attached to the hub.
    pub connections: usize,
    /// Registered participants.
    pub participants: usize,
    /// Display names left for new clients.
    pub names_available: usize,
}

impl HealthReport {
    /// Read the live counters off `hub`.
    pub fn collect(hub: &Hub, started: Instant) -> Self {
        let names_available = hub.names().available();
        Self {
            status: if names_available == 0 { "full" } else { "ok" },
            uptime_secs: started.elapsed().as_secs(),
            connections: hub.connection_count(),
            participants: hub.registry().len(),
            names_available,
        }
    }
}
