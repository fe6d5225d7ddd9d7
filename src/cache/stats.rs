//! Cache Statistics Module
//!
//! Tracks hits per tier, misses, promotions, writes and sweeps.

use serde::Serialize;

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Instance-local map
    Memory,
    /// Process-wide property store
    Shared,
    /// Compressed files on disk
    File,
}

impl Tier {
    /// Short tier name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Shared => "shared",
            Tier::File => "file",
        }
    }
}

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Hits served by the local memory tier
    pub memory_hits: u64,
    /// Hits served by the shared property tier
    pub shared_hits: u64,
    /// Hits served by the file tier
    pub file_hits: u64,
    /// Lookups no tier could answer
    pub misses: u64,
    /// Hits copied into faster tiers
    pub promotions: u64,
    /// Background writes that completed cleanly
    pub writes: u64,
    /// Background writes where at least one tier failed
    pub write_failures: u64,
    /// Sweeps run
    pub sweeps: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total hits across tiers.
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.shared_hits + self.file_hits
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter of `tier`.
    pub fn record_hit(&mut self, tier: Tier) {
        match tier {
            Tier::Memory => self.memory_hits += 1,
            Tier::Shared => self.shared_hits += 1,
            Tier::File => self.file_hits += 1,
        }
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Increments the promotion counter.
    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    /// Records the outcome of one background write.
    pub fn record_write(&mut self, ok: bool) {
        if ok {
            self.writes += 1;
        } else {
            self.write_failures += 1;
        }
    }

    /// Increments the sweep counter.
    pub fn record_sweep(&mut self) {
        self.sweeps += 1;
    }
}
