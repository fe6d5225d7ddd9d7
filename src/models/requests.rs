//! Request DTOs for the cache HTTP surface
//!
//! Defines the structure of incoming HTTP request bodies and queries.

use serde::Deserialize;
use serde_json::Value;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `endpoint`: The endpoint to cache the payload under
/// - `payload`: Any JSON value
/// - `checksum`: Optional checksum later lookups may require
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The endpoint identifier
    pub endpoint: String,
    /// The value to cache
    pub payload: Value,
    /// Checksum stored with the entry
    #[serde(default)]
    pub checksum: String,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.endpoint.is_empty() {
            return Some("Endpoint cannot be empty".to_string());
        }
        if self.ttl == Some(0) {
            return Some("TTL must be at least one second".to_string());
        }
        None
    }
}

/// Query string of the GET operation (GET /get?endpoint=..&checksum=..)
#[derive(Debug, Clone, Deserialize)]
pub struct GetQuery {
    /// The endpoint identifier
    pub endpoint: String,
    /// Checksum the entry must carry; empty accepts any
    #[serde(default)]
    pub checksum: String,
}
