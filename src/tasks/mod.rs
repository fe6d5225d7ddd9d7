//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of an engine.
//!
//! # Tasks
//! - Cache Cleanup: Runs the cache sweep whenever the sweep interval has elapsed

mod cleanup;

pub use cleanup::spawn_cleanup_task;
