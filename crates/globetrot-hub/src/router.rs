//! Named topic fan-out.
//!
//! Subscribers are held weakly so a connection that went away without
//! unsubscribing is pruned on the next publish. Events are serialized once
//! and the same `Arc<String>` is queued to every subscriber.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use globetrot_core::{ConnectionId, ServerEvent, Topic};
use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::connection::ClientConnection;
use crate::metrics::PUBLISH_DROPS_TOTAL;

struct Subscriber {
    id: ConnectionId,
    conn: Weak<ClientConnection>,
}

/// Topic router mapping topic names to subscribed connections.
#[derive(Default)]
pub struct TopicRouter {
    topics: RwLock<HashMap<Topic, Vec<Subscriber>>>,
}

impl TopicRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `conn` to `topic`. Subscribing twice is a no-op.
    pub fn subscribe(&self, topic: &Topic, conn: &Arc<ClientConnection>) {
        let mut topics = self.topics.write();
        let subs = topics.entry(topic.clone()).or_default();
        if subs.iter().any(|s| s.id == conn.id) {
            return;
        }
        subs.push(Subscriber {
            id: conn.id.clone(),
            conn: Arc::downgrade(conn),
        });
    }

    /// Remove `id` from `topic`. Returns whether it was subscribed.
    pub fn unsubscribe(&self, topic: &Topic, id: &ConnectionId) -> bool {
        let mut topics = self.topics.write();
        let Some(subs) = topics.get_mut(topic) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| &s.id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            let _ = topics.remove(topic);
        }
        removed
    }

    /// Serialize `event` once and deliver it to every subscriber of `topic`.
    ///
    /// Returns the number of subscribers the frame was queued to.
    pub fn publish(&self, topic: &Topic, event: &ServerEvent) -> usize {
        match event.to_json() {
            Ok(json) => self.publish_raw(topic, Arc::new(json)),
            Err(e) => {
                warn!(%topic, error = %e, "failed to serialize event");
                0
            }
        }
    }

    /// Deliver a pre-serialized frame to every subscriber of `topic`.
    pub fn publish_raw(&self, topic: &Topic, frame: Arc<String>) -> usize {
        let (live, has_dead) = {
            let topics = self.topics.read();
            let Some(subs) = topics.get(topic) else {
                return 0;
            };
            let live: Vec<Arc<ClientConnection>> =
                subs.iter().filter_map(|s| s.conn.upgrade()).collect();
            let has_dead = live.len() != subs.len();
            (live, has_dead)
        };

        let mut delivered = 0;
        for conn in &live {
            if conn.send(frame.clone()) {
                delivered += 1;
            } else {
                counter!(PUBLISH_DROPS_TOTAL).increment(1);
                warn!(%topic, conn_id = %conn.id, "subscriber queue full or closed, frame dropped");
            }
        }

        if has_dead {
            self.prune(topic);
        }
        debug!(%topic, recipients = live.len(), delivered, "published");
        delivered
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|s| s.conn.strong_count() > 0).count())
    }

    /// Number of topics with at least one subscriber entry.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    fn prune(&self, topic: &Topic) {
        let mut topics = self.topics.write();
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|s| s.conn.strong_count() > 0);
            if subs.is_empty() {
                let _ = topics.remove(topic);
            }
        }
    }
}

impl std::fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRouter")
            .field("topics", &self.topic_count())
            .finish()
    }
}
