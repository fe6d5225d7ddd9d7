//! API Handlers
//!
//! HTTP request handlers exposing the cache engine.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::cache::{CacheEngine, SweepReport};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{GetQuery, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache engine; clones share the same instance
    pub engine: CacheEngine,
}

impl AppState {
    /// Creates a new AppState around an open engine.
    pub fn new(engine: CacheEngine) -> Self {
        Self { engine }
    }

    /// Opens an engine from configuration and wraps it.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(CacheEngine::open(config.clone())?))
    }
}

/// Handler for PUT /set
///
/// Caches a payload and waits until the background write has landed.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let key = state.engine.key_for(&req.endpoint);
    state
        .engine
        .set(
            &req.endpoint,
            req.payload,
            &req.checksum,
            req.ttl.map(Duration::from_secs),
        )
        .wait()
        .await?;

    Ok(Json(SetResponse::new(req.endpoint, key)))
}

/// Handler for GET /get
///
/// Looks an endpoint up across all tiers.
pub async fn get_handler(
    State(state): State<AppState>,
    Query(query): Query<GetQuery>,
) -> Result<Json<GetResponse>> {
    let key = state.engine.key_for(&query.endpoint);
    // The file tier reads from disk.
    let engine = state.engine.clone();
    let lookup = query.clone();
    let payload = tokio::task::spawn_blocking(move || engine.get(&lookup.endpoint, &lookup.checksum))
        .await
        .map_err(|err| CacheError::Internal(err.to_string()))?
        .ok_or_else(|| CacheError::NotFound(query.endpoint.clone()))?;

    Ok(Json(GetResponse::new(query.endpoint, key, payload)))
}

/// Handler for POST /sweep
///
/// Runs a sweep immediately, regardless of the sweep interval.
pub async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let engine = state.engine.clone();
    let report = tokio::task::spawn_blocking(move || engine.sweep_now())
        .await
        .map_err(|err| CacheError::Internal(err.to_string()))?;
    Ok(Json(report))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.engine.stats();
    Json(StatsResponse::new(&stats, state.engine.memory().len()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
