//! Local Memory Tier
//!
//! The fastest tier: a map owned by one engine instance. It never checks
//! expiry on read, the engine does that uniformly for every tier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::cache::CacheEntry;

// == Local Memory Tier ==
/// Instance-local key to entry map.
#[derive(Debug, Default)]
pub struct LocalMemoryTier {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl LocalMemoryTier {
    /// Creates an empty tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the entry stored under `key`, expired or not.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `entry` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.write().insert(key.to_string(), entry);
    }

    /// Removes entries stale at `now`. Returns the number removed.
    pub fn clear_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Drops every entry. Returns the number removed.
    pub fn clear_all(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the tier holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
