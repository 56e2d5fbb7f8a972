//! Display name allocation.

use parking_lot::Mutex;
use rand::Rng;

pub use globetrot_core::participant::DEFAULT_NAMES;

/// Source of unique display names for new connections.
pub trait NameAllocator: Send + Sync {
    /// Take a free name, or `None` if every name is in use.
    fn acquire(&self) -> Option<String>;

    /// Return a name to the pool.
    fn release(&self, name: &str);

    /// Number of names currently free.
    fn available(&self) -> usize;
}

/// Finite pool of names picked at random.
pub struct NamePool {
    members: Vec<String>,
    free: Mutex<Vec<String>>,
}

impl NamePool {
    /// Pool over `names`. Duplicates are collapsed.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !members.contains(&name) {
                members.push(name);
            }
        }
        Self {
            free: Mutex::new(members.clone()),
            members,
        }
    }

    /// Total number of names in the pool.
    pub fn capacity(&self) -> usize {
        self.members.len()
    }
}

impl Default for NamePool {
    fn default() -> Self {
        Self::new(DEFAULT_NAMES)
    }
}

impl NameAllocator for NamePool {
    fn acquire(&self) -> Option<String> {
        let mut free = self.free.lock();
        if free.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..free.len());
        Some(free.swap_remove(idx))
    }

    fn release(&self, name: &str) {
        if !self.members.iter().any(|m| m == name) {
            return;
        }
        let mut free = self.free.lock();
        if !free.iter().any(|f| f == name) {
            free.push(name.to_string());
        }
    }

    fn available(&self) -> usize {
        self.free.lock().len()
    }
}

impl std::fmt::Debug for NamePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamePool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}
