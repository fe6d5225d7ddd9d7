//! Shared Property Tier
//!
//! A semi-durable tier kept in a process-wide property store. The store can
//! only get, set and clear string properties by name, so the tier keeps its
//! own registry of live keys under `<namespace>.cacheobjects` for the sweep
//! to enumerate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::config::Config;
use crate::error::Result;

// == Property Store Collaborator ==
/// A process-wide string property store keyed by name.
pub trait PropertyStore: Send + Sync {
    /// Returns the property value, `None` when unset.
    fn get_property(&self, name: &str) -> Result<Option<String>>;
    /// Sets the property value.
    fn set_property(&self, name: &str, value: &str) -> Result<()>;
    /// Clears the property. Clearing an unset property is not an error.
    fn clear_property(&self, name: &str) -> Result<()>;
}

/// Property store living in the current process.
#[derive(Debug, Default)]
pub struct InMemoryPropertyStore {
    properties: RwLock<HashMap<String, String>>,
}

impl InMemoryPropertyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of properties set.
    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    /// Returns true if no property is set.
    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }
}

impl PropertyStore for InMemoryPropertyStore {
    fn get_property(&self, name: &str) -> Result<Option<String>> {
        Ok(self.properties.read().get(name).cloned())
    }

    fn set_property(&self, name: &str, value: &str) -> Result<()> {
        self.properties
            .write()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn clear_property(&self, name: &str) -> Result<()> {
        self.properties.write().remove(name);
        Ok(())
    }
}

// == Registry ==
/// A key believed to be live in the shared tier, with its tier expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Normalized storage key
    pub key: String,
    /// When the shared-tier copy becomes eligible for removal
    pub expires_at: DateTime<Utc>,
}

/// Outcome of purging the shared tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedPurge {
    /// Properties cleared
    pub cleared: usize,
    /// Registry entries kept
    pub retained: usize,
}

// == Shared Property Store ==
/// The shared tier built on a [`PropertyStore`].
pub struct SharedPropertyStore {
    store: Arc<dyn PropertyStore>,
    registry_name: String,
    last_sweep_name: String,
    /// Serializes registry read-modify-write cycles within this process
    registry_lock: Mutex<()>,
}

impl SharedPropertyStore {
    /// Wraps `store`, deriving bookkeeping property names from `config`.
    pub fn new(store: Arc<dyn PropertyStore>, config: &Config) -> Self {
        Self {
            store,
            registry_name: config.registry_property(),
            last_sweep_name: config.last_sweep_property(),
            registry_lock: Mutex::new(()),
        }
    }

    /// Returns the raw serialized entry stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get_property(key)?
            .filter(|value| !value.is_empty()))
    }

    /// Stores a serialized entry under `key`.
    pub fn set(&self, key: &str, serialized: &str) -> Result<()> {
        self.store.set_property(key, serialized)
    }

    /// Removes whatever is stored under `key`.
    pub fn clear(&self, key: &str) -> Result<()> {
        self.store.clear_property(key)
    }

    /// Reads and decodes the entry under `key`. Unparsable values read as absent.
    pub fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(text) = self.get(key)? else {
            return Ok(None);
        };
        match CacheEntry::from_json(&text) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                debug!("Shared tier value for '{}' unreadable: {}", key, err);
                Ok(None)
            }
        }
    }

    /// Stores `entry` and records it in the registry until `tier_expires_at`.
    pub fn set_entry(&self, entry: &CacheEntry, tier_expires_at: DateTime<Utc>) -> Result<()> {
        self.set(&entry.key, &entry.to_json()?)?;
        self.register_key(&entry.key, tier_expires_at)
    }

    // == Registry Operations ==
    /// Records `key` as live until `expires_at`, replacing any earlier record.
    pub fn register_key(&self, key: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let _guard = self.registry_lock.lock();
        let mut registry = self.list_registered()?;
        registry.retain(|entry| entry.key != key);
        registry.push(RegistryEntry {
            key: key.to_string(),
            expires_at,
        });
        self.replace_registry(&registry)
    }

    /// Returns the registry. A missing or unparsable registry is empty.
    pub fn list_registered(&self) -> Result<Vec<RegistryEntry>> {
        let Some(text) = self.get(&self.registry_name)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!("Shared tier registry unreadable, starting empty: {}", err);
            Vec::new()
        }))
    }

    /// Persists `entries` as the whole registry.
    pub fn replace_registry(&self, entries: &[RegistryEntry]) -> Result<()> {
        let text = serde_json::to_string(entries)?;
        self.store.set_property(&self.registry_name, &text)
    }

    /// Clears every registered key whose tier expiry is at or before `now`
    /// and rewrites the registry with the survivors.
    ///
    /// A property that fails to clear stays registered for the next sweep.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<SharedPurge> {
        let _guard = self.registry_lock.lock();
        let registry = self.list_registered()?;
        let mut purge = SharedPurge::default();
        let mut live = Vec::with_capacity(registry.len());

        for entry in registry {
            if entry.expires_at > now {
                live.push(entry);
                continue;
            }
            match self.store.clear_property(&entry.key) {
                Ok(()) => purge.cleared += 1,
                Err(err) => {
                    warn!("Failed to clear shared tier key '{}': {}", entry.key, err);
                    live.push(entry);
                }
            }
        }

        purge.retained = live.len();
        self.replace_registry(&live)?;
        Ok(purge)
    }

    // == Sweep Bookkeeping ==
    /// Returns when the last sweep ran, if recorded and readable.
    pub fn last_sweep_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .get(&self.last_sweep_name)?
            .and_then(|text| DateTime::parse_from_rfc3339(&text).ok())
            .map(|at| at.with_timezone(&Utc)))
    }

    /// Records `at` as the last sweep time.
    pub fn set_last_sweep_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set_property(&self.last_sweep_name, &at.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn shared() -> (Arc<InMemoryPropertyStore>, SharedPropertyStore) {
        let store = Arc::new(InMemoryPropertyStore::new());
        let shared = SharedPropertyStore::new(store.clone(), &Config::default());
        (store, shared)
    }

    fn entry(key: &str, now: DateTime<Utc>) -> CacheEntry {
        CacheEntry::new(
            key.to_string(),
            key.to_string(),
            String::new(),
            now,
            now + Duration::hours(1),
            json!([1, 2, 3]),
        )
    }

    #[test]
    fn test_entry_roundtrip_through_store() {
        let (_, shared) = shared();
        let now = Utc::now();
        let e = entry("a", now);
        shared.set_entry(&e, e.expires_at).unwrap();

        assert_eq!(shared.get_entry("a").unwrap(), Some(e));
        assert_eq!(shared.list_registered().unwrap().len(), 1);
    }

    #[test]
    fn test_unparsable_entry_reads_absent() {
        let (_, shared) = shared();
        shared.set("a", "garbage").unwrap();
        assert!(shared.get_entry("a").unwrap().is_none());
    }

    #[test]
    fn test_missing_registry_is_empty() {
        let (_, shared) = shared();
        assert!(shared.list_registered().unwrap().is_empty());
    }

    #[test]
    fn test_unparsable_registry_is_empty() {
        let (store, shared) = shared();
        store
            .set_property(&Config::default().registry_property(), "[{broken")
            .unwrap();
        assert!(shared.list_registered().unwrap().is_empty());
    }

    #[test]
    fn test_register_key_keeps_one_record_per_key() {
        let (_, shared) = shared();
        let now = Utc::now();
        shared.register_key("a", now + Duration::hours(1)).unwrap();
        shared.register_key("a", now + Duration::hours(2)).unwrap();
        shared.register_key("b", now + Duration::hours(1)).unwrap();

        let registry = shared.list_registered().unwrap();
        assert_eq!(registry.len(), 2);
        let a = registry.iter().find(|r| r.key == "a").unwrap();
        assert_eq!(a.expires_at, now + Duration::hours(2));
    }

    #[test]
    fn test_purge_expired() {
        let (store, shared) = shared();
        let now = Utc::now();
        let old = entry("old", now);
        let fresh = entry("fresh", now);
        shared.set_entry(&old, now + Duration::minutes(5)).unwrap();
        shared.set_entry(&fresh, now + Duration::hours(3)).unwrap();

        let purge = shared.purge_expired(now + Duration::minutes(10)).unwrap();
        assert_eq!(purge, SharedPurge { cleared: 1, retained: 1 });
        assert!(store.get_property("old").unwrap().is_none());
        assert!(shared.get_entry("fresh").unwrap().is_some());
        assert_eq!(shared.list_registered().unwrap()[0].key, "fresh");
    }

    #[test]
    fn test_purge_tolerates_stale_registry_records() {
        let (_, shared) = shared();
        let now = Utc::now();
        shared.register_key("ghost", now).unwrap();

        let purge = shared.purge_expired(now + Duration::seconds(1)).unwrap();
        assert_eq!(purge.cleared, 1);
        assert!(shared.list_registered().unwrap().is_empty());
    }

    #[test]
    fn test_last_sweep_roundtrip() {
        let (_, shared) = shared();
        assert!(shared.last_sweep_at().unwrap().is_none());

        let now = Utc::now();
        shared.set_last_sweep_at(now).unwrap();
        assert_eq!(shared.last_sweep_at().unwrap(), Some(now));
    }
}
