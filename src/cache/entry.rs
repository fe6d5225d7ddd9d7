//! Cache Entry Module
//!
//! Defines the unit of storage shared by every tier and its persisted
//! text form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Cache Entry ==
/// An immutable cached result with its expiry metadata.
///
/// Serialized as a self-describing JSON record with the fields
/// `key`, `endpoint`, `checksum`, `createdAt`, `expiresAt` and `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Normalized storage key
    pub key: String,
    /// Original endpoint, kept for diagnostics
    pub endpoint: String,
    /// Caller-supplied checksum, empty when none was given
    pub checksum: String,
    /// Time of the write
    pub created_at: DateTime<Utc>,
    /// Instant from which the entry is stale
    pub expires_at: DateTime<Utc>,
    /// The cached result itself
    pub payload: Value,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written at `created_at` that lives until `expires_at`.
    pub fn new(
        key: String,
        endpoint: String,
        checksum: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        payload: Value,
    ) -> Self {
        Self {
            key,
            endpoint,
            checksum,
            created_at,
            expires_at,
            payload,
        }
    }

    // == Is Expired ==
    /// Checks if the entry is stale at `now`.
    ///
    /// Boundary condition: an entry whose expiry equals `now` is already
    /// expired, so a live entry always satisfies `expires_at > now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // == Checksum Gate ==
    /// An empty query checksum matches anything; otherwise exact equality.
    pub fn matches_checksum(&self, checksum: &str) -> bool {
        checksum.is_empty() || checksum == self.checksum
    }

    /// Returns true if the entry may be handed to a caller at `now`.
    pub fn is_servable(&self, now: DateTime<Utc>, checksum: &str) -> bool {
        !self.is_expired(now) && self.matches_checksum(checksum)
    }

    // == Serialization ==
    /// Encodes the entry into its persisted text form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes an entry, rejecting records that violate `expires_at > created_at`.
    pub fn from_json(text: &str) -> Result<Self> {
        let entry: CacheEntry = serde_json::from_str(text)?;
        if entry.expires_at <= entry.created_at {
            return Err(CacheError::Serialization(format!(
                "entry '{}' expires before it was created",
                entry.key
            )));
        }
        Ok(entry)
    }
}
