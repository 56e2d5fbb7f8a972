//! Authoritative set of connected participants.
//!
//! Every operation takes the lock once, so each call is atomic with respect
//! to every other call. Records are kept in insertion order so snapshots list
//! participants in the order they joined.

use std::sync::Arc;

use globetrot_core::{Clock, ConnectionId, HubError, Participant, Result};
use parking_lot::RwLock;

struct Entry {
    participant: Participant,
    owner: ConnectionId,
}

/// Registry of connected participants keyed by display name.
pub struct ParticipantRegistry {
    entries: RwLock<Vec<Entry>>,
    clock: Arc<dyn Clock>,
}

impl ParticipantRegistry {
    /// Create an empty registry stamping liveness with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Insert a fresh participant owned by `owner`.
    pub fn register(&self, name: &str, owner: &ConnectionId) -> Result<Participant> {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.participant.username == name) {
            return Err(HubError::DuplicateName(name.to_string()));
        }
        let participant = Participant::new(name, self.clock.now_millis());
        entries.push(Entry {
            participant: participant.clone(),
            owner: owner.clone(),
        });
        Ok(participant)
    }

    /// Copy of the record for `name`.
    pub fn find(&self, name: &str) -> Option<Participant> {
        self.entries
            .read()
            .iter()
            .find(|e| e.participant.username == name)
            .map(|e| e.participant.clone())
    }

    /// Replace the coordinates of `name`, returning the updated record.
    ///
    /// Like every mutation below, this is a no-op unless `owner` still holds
    /// the name: a frame from an evicted connection must not touch a newer
    /// participant that was handed the same recycled name.
    pub fn update_position(
        &self,
        name: &str,
        owner: &ConnectionId,
        pos_x: f64,
        pos_y: f64,
    ) -> Option<Participant> {
        self.with_owned_entry(name, owner, |p| {
            p.pos_x = pos_x;
            p.pos_y = pos_y;
            p.clone()
        })
    }

    /// Replace the visited countries of `name` wholesale.
    pub fn update_countries(
        &self,
        name: &str,
        owner: &ConnectionId,
        countries: Vec<String>,
    ) -> bool {
        self.with_owned_entry(name, owner, |p| p.visited_countries = countries)
            .is_some()
    }

    /// Visited countries of `name`.
    pub fn countries(&self, name: &str) -> Option<Vec<String>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.participant.username == name)
            .map(|e| e.participant.visited_countries.clone())
    }

    /// Refresh the liveness timestamp of `name`.
    pub fn touch(&self, name: &str, owner: &ConnectionId) -> bool {
        let now = self.clock.now_millis();
        self.with_owned_entry(name, owner, |p| p.last_heartbeat = now)
            .is_some()
    }

    /// Remove `name` regardless of owner.
    pub fn remove(&self, name: &str) -> Option<Participant> {
        let mut entries = self.entries.write();
        let idx = entries.iter().position(|e| e.participant.username == name)?;
        Some(entries.remove(idx).participant)
    }

    /// Remove `name` only if it is still held by `owner`.
    ///
    /// Names are recycled, so a stale connection must not remove a newer
    /// participant that happens to carry the same name.
    pub fn remove_owned(&self, name: &str, owner: &ConnectionId) -> Option<Participant> {
        let mut entries = self.entries.write();
        let idx = entries
            .iter()
            .position(|e| e.participant.username == name && &e.owner == owner)?;
        Some(entries.remove(idx).participant)
    }

    /// Remove `name` only if it has been silent since before `threshold_millis`.
    ///
    /// Returns the removed record and the connection that owned it.
    pub fn remove_if_inactive(
        &self,
        name: &str,
        threshold_millis: i64,
    ) -> Option<(Participant, ConnectionId)> {
        let mut entries = self.entries.write();
        let idx = entries.iter().position(|e| {
            e.participant.username == name && e.participant.is_inactive_since(threshold_millis)
        })?;
        let entry = entries.remove(idx);
        Some((entry.participant, entry.owner))
    }

    /// Every participant at one point in time, in join order.
    pub fn snapshot(&self) -> Vec<Participant> {
        self.entries
            .read()
            .iter()
            .map(|e| e.participant.clone())
            .collect()
    }

    /// Names whose last activity is strictly before `threshold_millis`.
    pub fn list_inactive_since(&self, threshold_millis: i64) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.participant.is_inactive_since(threshold_millis))
            .map(|e| e.participant.username.clone())
            .collect()
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.participant.username == name)
    }

    fn with_owned_entry<R>(
        &self,
        name: &str,
        owner: &ConnectionId,
        f: impl FnOnce(&mut Participant) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.write();
        entries
            .iter_mut()
            .find(|e| e.participant.username == name && &e.owner == owner)
            .map(|e| f(&mut e.participant))
    }
}

impl std::fmt::Debug for ParticipantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
