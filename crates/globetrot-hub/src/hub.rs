//! Shared hub state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use globetrot_core::{Clock, ConnectionId, OutboundEvent, Topic};
use metrics::gauge;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::connection::ClientConnection;
use crate::metrics::PARTICIPANTS_ACTIVE;
use crate::names::NameAllocator;
use crate::registry::ParticipantRegistry;
use crate::router::TopicRouter;

/// Timing and queue limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Silence after which a participant is evicted.
    pub heartbeat_timeout: Duration,
    /// Period of the liveness sweep.
    pub cleanup_interval: Duration,
    /// Outbound frames buffered per connection before drops.
    pub send_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(10_000),
            cleanup_interval: Duration::from_millis(15_000),
            send_queue_capacity: 256,
        }
    }
}

/// Everything sessions and the sweeper share.
pub struct Hub {
    registry: ParticipantRegistry,
    router: TopicRouter,
    names: Arc<dyn NameAllocator>,
    clock: Arc<dyn Clock>,
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    config: HubConfig,
}

impl Hub {
    /// Build a hub.
    pub fn new(config: HubConfig, names: Arc<dyn NameAllocator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: ParticipantRegistry::new(clock.clone()),
            router: TopicRouter::new(),
            names,
            clock,
            connections: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Participant registry.
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// Topic router.
    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Name allocator.
    pub fn names(&self) -> &dyn NameAllocator {
        self.names.as_ref()
    }

    /// Wall clock.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Timing and queue limits.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // ── connections ─────────────────────────────────────────────────

    /// Track a live connection so it can be closed on eviction.
    pub fn attach(&self, conn: Arc<ClientConnection>) {
        let _ = self.connections.write().insert(conn.id.clone(), conn);
    }

    /// Stop tracking a connection.
    pub fn forget(&self, id: &ConnectionId) {
        let _ = self.connections.write().remove(id);
    }

    /// Look up a tracked connection.
    pub fn connection(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Close every tracked connection.
    pub fn close_all(&self) {
        let conns: Vec<_> = self.connections.read().values().cloned().collect();
        info!(count = conns.len(), "closing all connections");
        for conn in conns {
            conn.close();
        }
    }

    // ── cleanup ─────────────────────────────────────────────────────

    /// Remove `name` if `owner` still holds it, then release the name and
    /// drop both topic subscriptions.
    ///
    /// Returns `false` if someone else already removed it; the caller must
    /// then skip the `userDisconnected` broadcast.
    pub fn detach(&self, name: &str, owner: &ConnectionId) -> bool {
        if self.registry.remove_owned(name, owner).is_none() {
            debug!(name, conn_id = %owner, "participant already gone");
            return false;
        }
        self.release(name, owner);
        true
    }

    /// Evict `name` if it is still silent since before `threshold_millis`,
    /// and close its connection.
    pub fn evict_inactive(&self, name: &str, threshold_millis: i64) -> bool {
        let Some((participant, owner)) = self.registry.remove_if_inactive(name, threshold_millis)
        else {
            return false;
        };
        // Close before the name goes back to the pool.
        if let Some(conn) = self.connection(&owner) {
            conn.close();
        }
        self.release(name, &owner);
        info!(
            name,
            conn_id = %owner,
            last_heartbeat = participant.last_heartbeat,
            "evicted inactive participant"
        );
        true
    }

    /// Publish the current roster as `userDisconnected` on the users topic.
    pub fn announce_roster(&self) -> usize {
        let users = self.registry.snapshot();
        self.router
            .publish(&Topic::Users, &OutboundEvent::UserDisconnected { users }.into())
    }

    fn release(&self, name: &str, owner: &ConnectionId) {
        self.names.release(name);
        let _ = self.router.unsubscribe(&Topic::Users, owner);
        let _ = self.router.unsubscribe(&Topic::chat(name), owner);
        gauge!(PARTICIPANTS_ACTIVE).set(self.registry.len() as f64);
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("participants", &self.registry.len())
            .field("connections", &self.connection_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
