//! Tiercache - A process-wide tiered cache
//!
//! Memoizes computed results under a stable key across three tiers: an
//! instance-local map, a process-wide property store and compressed files
//! on disk, with TTL expiration, checksum gating and a periodic sweep.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod memoize;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, PendingWrite, SweepReport};
pub use config::{CleanupMode, Config};
pub use error::{CacheError, Result};
pub use memoize::Memoized;
pub use tasks::spawn_cleanup_task;
