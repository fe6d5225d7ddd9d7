//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror. Most tier failures are
//! absorbed by the engine and turn into misses; the variants below surface
//! only through background write handles and the HTTP layer.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the tiered cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No live entry for the requested endpoint
    #[error("Endpoint not cached: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Filesystem failure in the file tier
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A storage tier backend failed while the others were still attempted
    #[error("Tier '{tier}' unavailable: {reason}")]
    TierUnavailable {
        /// Which tier failed.
        tier: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// The engine is closing or closed
    #[error("Cache engine is closed")]
    Closed,

    /// The engine was opened outside a tokio runtime
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    /// Background task failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Closed | CacheError::TierUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, CacheError>;
