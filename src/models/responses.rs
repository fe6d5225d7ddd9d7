//! Response DTOs for the cache HTTP surface
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Response body for the GET operation (GET /get)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested endpoint
    pub endpoint: String,
    /// The storage key it maps to
    pub key: String,
    /// The cached value
    pub payload: Value,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            payload,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The endpoint that was cached
    pub endpoint: String,
    /// The storage key it maps to
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            message: format!("Endpoint '{}' cached successfully", endpoint),
            endpoint,
            key: key.into(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Hits across all tiers
    pub hits: u64,
    /// Hits per tier
    pub memory_hits: u64,
    /// Hits served by the shared tier
    pub shared_hits: u64,
    /// Hits served by the file tier
    pub file_hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Hits copied into faster tiers
    pub promotions: u64,
    /// Completed background writes
    pub writes: u64,
    /// Background writes with a failed tier
    pub write_failures: u64,
    /// Sweeps run
    pub sweeps: u64,
    /// Entries currently in the local memory tier
    pub memory_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(stats: &CacheStats, memory_entries: usize) -> Self {
        Self {
            hits: stats.hits(),
            memory_hits: stats.memory_hits,
            shared_hits: stats.shared_hits,
            file_hits: stats.file_hits,
            misses: stats.misses,
            promotions: stats.promotions,
            writes: stats.writes,
            write_failures: stats.write_failures,
            sweeps: stats.sweeps,
            memory_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
