//! Cache Module
//!
//! Tiered caching: a local memory map, a process-wide property store and
//! compressed files on disk, orchestrated by [`CacheEngine`].

mod busy;
mod clock;
mod engine;
mod entry;
mod file;
mod memory;
mod shared;
mod stats;

pub mod key;


// Re-export public types
pub use busy::{BusyGuard, BusyTasks};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CacheEngine, EngineState, PendingWrite, SweepReport, MIN_TTL};
pub use entry::CacheEntry;
pub use file::FileStore;
pub use key::{normalize, MAX_KEY_LENGTH};
pub use memory::LocalMemoryTier;
pub use shared::{
    InMemoryPropertyStore, PropertyStore, RegistryEntry, SharedPropertyStore, SharedPurge,
};
pub use stats::{CacheStats, Tier};
