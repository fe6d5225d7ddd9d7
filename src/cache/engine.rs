//! Cache Engine Module
//!
//! Orchestrates the three tiers: lookup cascade with promotion, background
//! write-through, expiry bookkeeping and the cleanup sweep.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::busy::BusyTasks;
use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::{endpoint_text, normalize};
use crate::cache::shared::{InMemoryPropertyStore, PropertyStore, SharedPropertyStore};
use crate::cache::stats::Tier;
use crate::cache::{CacheEntry, CacheStats, FileStore, LocalMemoryTier};
use crate::config::{CleanupMode, Config};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_cleanup_task;

/// Shortest TTL accepted by `set`; smaller values are raised to it
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Longest TTL representable; larger values are lowered to it
const MAX_TTL_DAYS: i64 = 100 * 365;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

// == Engine State ==
/// Lifecycle of an engine handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Serving reads and accepting writes
    Open,
    /// Rejecting writes, waiting for in-flight tasks
    Closing,
    /// All background work has landed
    Closed,
}

// == Sweep Report ==
/// What a sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries dropped from the local memory tier
    pub memory_cleared: usize,
    /// Properties cleared from the shared tier
    pub shared_cleared: usize,
    /// Files inspected in the file tier
    pub files_scanned: usize,
    /// Expired files deleted
    pub files_removed: usize,
    /// False if a shutdown was observed before the last tier
    pub completed: bool,
}

// == Pending Write ==
/// Handle on a background write issued by [`CacheEngine::set`].
///
/// Dropping it does not cancel the write.
#[derive(Debug)]
pub struct PendingWrite {
    state: PendingState,
}

#[derive(Debug)]
enum PendingState {
    Spawned(JoinHandle<Result<()>>),
    Rejected(CacheError),
}

impl PendingWrite {
    /// Waits for the write to land in every tier it targets.
    ///
    /// Returns the first tier failure, or [`CacheError::Closed`] if the
    /// engine was no longer open when `set` was called.
    pub async fn wait(self) -> Result<()> {
        match self.state {
            PendingState::Spawned(handle) => match handle.await {
                Ok(result) => result,
                Err(err) => Err(CacheError::Internal(format!(
                    "background write did not complete: {}",
                    err
                ))),
            },
            PendingState::Rejected(err) => Err(err),
        }
    }

    /// Returns true once the background write has finished.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            PendingState::Spawned(handle) => handle.is_finished(),
            PendingState::Rejected(_) => true,
        }
    }
}

struct EngineInner {
    config: Config,
    clock: Arc<dyn Clock>,
    memory: LocalMemoryTier,
    shared: SharedPropertyStore,
    files: FileStore,
    busy: BusyTasks,
    state: AtomicU8,
    sweeping: AtomicBool,
    stats: Mutex<CacheStats>,
    runtime: Handle,
    shutdown: watch::Sender<bool>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

// == Cache Engine ==
/// A handle on one tiered cache instance. Cheap to clone.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

impl CacheEngine {
    // == Open ==
    /// Opens an engine backed by a fresh in-process property store.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(
            config,
            Arc::new(InMemoryPropertyStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Opens an engine on the given property store and clock.
    ///
    /// In [`CleanupMode::Active`] the background sweep loop is started here.
    pub fn open_with(
        config: Config,
        store: Arc<dyn PropertyStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|err| CacheError::Runtime(err.to_string()))?;
        let (shutdown, _) = watch::channel(false);

        let inner = EngineInner {
            shared: SharedPropertyStore::new(store, &config),
            files: FileStore::new(&config.cache_dir),
            memory: LocalMemoryTier::new(),
            busy: BusyTasks::new(),
            state: AtomicU8::new(STATE_OPEN),
            sweeping: AtomicBool::new(false),
            stats: Mutex::new(CacheStats::new()),
            scheduler: Mutex::new(None),
            runtime,
            shutdown,
            clock,
            config,
        };
        let engine = Self {
            inner: Arc::new(inner),
        };

        if engine.inner.config.cleanup_mode == CleanupMode::Active {
            let handle = spawn_cleanup_task(
                engine.clone(),
                engine.inner.config.cleanup_tick,
                engine.inner.shutdown.subscribe(),
            );
            *engine.inner.scheduler.lock() = Some(handle);
        }

        info!(
            "Cache engine opened: dir={}, cleanup={:?}, shared_tier={}, file_tier={}",
            engine.inner.config.cache_dir.display(),
            engine.inner.config.cleanup_mode,
            engine.inner.config.use_shared_tier,
            engine.inner.config.use_file_tier
        );
        Ok(engine)
    }

    // == Get ==
    /// Looks `endpoint` up in memory, then the shared tier, then on disk.
    ///
    /// An empty `checksum` accepts any stored checksum; otherwise the stored
    /// checksum must match exactly. Expired entries are never returned but
    /// are left for the sweep. A hit in a slower tier is promoted into the
    /// faster ones.
    pub fn get(&self, endpoint: impl AsRef<[u8]>, checksum: &str) -> Option<Value> {
        if self.state() != EngineState::Open {
            debug!("Lookup on a closed cache engine");
            return None;
        }
        self.inner.get(&normalize(endpoint), checksum)
    }

    // == Set ==
    /// Caches `payload` for `endpoint` for `ttl` (the configured default when `None`).
    ///
    /// The local memory tier is updated before returning; the shared and
    /// file tiers are written in the background. Only TTLs longer than the
    /// shared-tier horizon reach the disk, unless the shared tier is
    /// disabled. Await the returned handle to observe completion.
    pub fn set(
        &self,
        endpoint: impl AsRef<[u8]>,
        payload: Value,
        checksum: &str,
        ttl: Option<Duration>,
    ) -> PendingWrite {
        // Enter before checking state so close() cannot miss this write.
        let guard = self.inner.busy.enter();
        if self.state() != EngineState::Open {
            return PendingWrite {
                state: PendingState::Rejected(CacheError::Closed),
            };
        }

        let key = normalize(endpoint.as_ref());
        let endpoint = endpoint_text(endpoint);
        let now = self.inner.clock.now();
        let ttl = ttl.unwrap_or(self.inner.config.default_ttl).max(MIN_TTL);
        let entry = CacheEntry::new(
            key.clone(),
            endpoint,
            checksum.to_string(),
            now,
            expiry_after(now, ttl),
            payload,
        );
        self.inner.memory.set(&key, entry.clone());

        let inner = self.inner.clone();
        let handle = self.inner.runtime.spawn_blocking(move || {
            let _guard = guard;
            inner.write_through(entry, ttl)
        });
        PendingWrite {
            state: PendingState::Spawned(handle),
        }
    }

    // == Sweep ==
    /// Purges entries stale at `now` from every tier.
    ///
    /// Runs even if not due; use [`CacheEngine::sweep_if_due`] for the
    /// interval-guarded variant.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let _guard = self.inner.busy.enter();
        self.inner.sweep(now)
    }

    /// Sweeps at the engine clock's current time.
    pub fn sweep_now(&self) -> SweepReport {
        self.sweep(self.inner.clock.now())
    }

    /// Runs a sweep if the sweep interval has elapsed since the last one.
    pub fn sweep_if_due(&self) -> Option<SweepReport> {
        let _guard = self.inner.busy.enter();
        if self.state() != EngineState::Open {
            return None;
        }
        self.inner.run_due_sweep()
    }

    // == Close ==
    /// Stops the cleanup loop and waits for every in-flight write and sweep.
    ///
    /// Further `set` calls are rejected and `get` reports misses.
    pub async fn close(&self) {
        let first = self
            .inner
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            info!(
                "Closing cache engine, {} background tasks in flight",
                self.inner.busy.count()
            );
            self.inner.shutdown.send_replace(true);
        }

        let scheduler = self.inner.scheduler.lock().take();
        if let Some(handle) = scheduler {
            if let Err(err) = handle.await {
                warn!("Cleanup task ended abnormally: {}", err);
            }
        }

        self.inner.busy.wait_idle().await;
        self.inner.state.store(STATE_CLOSED, Ordering::SeqCst);
        if first {
            info!("Cache engine closed");
        }
    }

    /// Waits for every in-flight background task without closing.
    pub async fn flush(&self) {
        self.inner.busy.wait_idle().await;
    }

    // == Accessors ==
    /// Returns the lifecycle state.
    pub fn state(&self) -> EngineState {
        match self.inner.state.load(Ordering::SeqCst) {
            STATE_OPEN => EngineState::Open,
            STATE_CLOSING => EngineState::Closing,
            _ => EngineState::Closed,
        }
    }

    /// Returns the storage key used for `endpoint`.
    pub fn key_for(&self, endpoint: impl AsRef<[u8]>) -> String {
        normalize(endpoint)
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.lock().clone()
    }

    /// Returns the number of background tasks in flight.
    pub fn busy_count(&self) -> usize {
        self.inner.busy.count()
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the local memory tier.
    pub fn memory(&self) -> &LocalMemoryTier {
        &self.inner.memory
    }

    /// Returns the shared property tier.
    pub fn shared(&self) -> &SharedPropertyStore {
        &self.inner.shared
    }

    /// Returns the file tier.
    pub fn files(&self) -> &FileStore {
        &self.inner.files
    }
}

impl EngineInner {
    fn is_shutting_down(&self) -> bool {
        self.state.load(Ordering::SeqCst) != STATE_OPEN
    }

    /// Expiry recorded for the shared-tier copy of an entry.
    fn shared_expiry(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        expires_at.min(expiry_after(now, self.config.shared_horizon))
    }

    fn get(&self, key: &str, checksum: &str) -> Option<Value> {
        let now = self.clock.now();

        if let Some(entry) = self.memory.get(key) {
            if entry.is_servable(now, checksum) {
                self.stats.lock().record_hit(Tier::Memory);
                return Some(entry.payload);
            }
        }

        if self.config.use_shared_tier {
            match self.shared.get_entry(key) {
                Ok(Some(entry)) if entry.is_servable(now, checksum) => {
                    self.memory.set(key, entry.clone());
                    let mut stats = self.stats.lock();
                    stats.record_hit(Tier::Shared);
                    stats.record_promotion();
                    return Some(entry.payload);
                }
                Ok(_) => {}
                Err(err) => warn!("Shared tier lookup failed for '{}': {}", key, err),
            }
        }

        if self.config.use_file_tier {
            if let Some(entry) = self.files.read(key) {
                if entry.is_servable(now, checksum) {
                    self.promote(&entry, now);
                    let mut stats = self.stats.lock();
                    stats.record_hit(Tier::File);
                    stats.record_promotion();
                    return Some(entry.payload);
                }
            }
        }

        self.stats.lock().record_miss();
        None
    }

    /// Copies a disk hit into the faster tiers.
    fn promote(&self, entry: &CacheEntry, now: DateTime<Utc>) {
        self.memory.set(&entry.key, entry.clone());
        if self.config.use_shared_tier {
            let tier_expiry = self.shared_expiry(entry.expires_at, now);
            if let Err(err) = self.shared.set_entry(entry, tier_expiry) {
                warn!("Failed to promote '{}' into shared tier: {}", entry.key, err);
            }
        }
    }

    /// Background half of `set`. Every enabled tier is attempted; the first
    /// failure is reported.
    fn write_through(&self, entry: CacheEntry, ttl: Duration) -> Result<()> {
        if self.config.cleanup_mode == CleanupMode::Passive
            && self.run_due_sweep().is_some()
        {
            // The sweep emptied the memory tier.
            self.memory.set(&entry.key, entry.clone());
        }

        let mut failure = None;

        if self.config.use_shared_tier {
            let tier_expiry = self.shared_expiry(entry.expires_at, entry.created_at);
            if let Err(err) = self.shared.set_entry(&entry, tier_expiry) {
                warn!("Shared tier write failed for '{}': {}", entry.key, err);
                failure.get_or_insert(CacheError::TierUnavailable {
                    tier: Tier::Shared.name(),
                    reason: err.to_string(),
                });
            }
        }

        // Without the shared tier, disk is the only copy that survives a sweep.
        let needs_disk = !self.config.use_shared_tier || ttl > self.config.shared_horizon;
        if self.config.use_file_tier && needs_disk {
            if let Err(err) = self.files.write(&entry.key, &entry) {
                warn!("File tier write failed for '{}': {}", entry.key, err);
                failure.get_or_insert(CacheError::TierUnavailable {
                    tier: Tier::File.name(),
                    reason: err.to_string(),
                });
            }
        }

        self.stats.lock().record_write(failure.is_none());
        match failure {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    fn run_due_sweep(&self) -> Option<SweepReport> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        let now = self.clock.now();
        let report = self.sweep_due(now).then(|| self.sweep(now));
        self.sweeping.store(false, Ordering::SeqCst);
        report
    }

    fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        match self.shared.last_sweep_at() {
            Ok(Some(last)) => {
                let interval = chrono::Duration::from_std(self.config.cleanup_interval)
                    .unwrap_or_else(|_| chrono::Duration::days(MAX_TTL_DAYS));
                last.checked_add_signed(interval)
                    .map_or(false, |due| due < now)
            }
            Ok(None) => {
                // Fresh store: start the interval instead of sweeping at once.
                if let Err(err) = self.shared.set_last_sweep_at(now) {
                    warn!("Failed to record sweep time: {}", err);
                }
                false
            }
            Err(err) => {
                warn!("Failed to read last sweep time: {}", err);
                false
            }
        }
    }

    fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        if let Err(err) = self.shared.set_last_sweep_at(now) {
            warn!("Failed to record sweep time: {}", err);
        }

        let mut report = SweepReport {
            memory_cleared: self.memory.clear_all(),
            ..SweepReport::default()
        };
        if self.is_shutting_down() {
            return self.finish_sweep(report);
        }

        if self.config.use_shared_tier {
            match self.shared.purge_expired(now) {
                Ok(purge) => report.shared_cleared = purge.cleared,
                Err(err) => warn!("Shared tier sweep failed: {}", err),
            }
        }
        if self.is_shutting_down() {
            return self.finish_sweep(report);
        }

        if self.config.use_file_tier {
            for key in self.files.list_keys() {
                report.files_scanned += 1;
                // Unreadable files are removed by read() itself.
                let Some(entry) = self.files.read(&key) else {
                    continue;
                };
                if entry.expires_at < now {
                    match self.files.delete(&key) {
                        Ok(()) => report.files_removed += 1,
                        Err(err) => warn!("Failed to delete expired file '{}': {}", key, err),
                    }
                }
            }
        }

        report.completed = true;
        self.finish_sweep(report)
    }

    fn finish_sweep(&self, report: SweepReport) -> SweepReport {
        self.stats.lock().record_sweep();
        if report.completed {
            info!(
                "Cache sweep: memory={}, shared={}, files={}/{}",
                report.memory_cleared,
                report.shared_cleared,
                report.files_removed,
                report.files_scanned
            );
        } else {
            info!("Cache sweep interrupted by shutdown");
        }
        report
    }
}

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl)
        .unwrap_or_else(|_| chrono::Duration::days(MAX_TTL_DAYS))
        .min(chrono::Duration::days(MAX_TTL_DAYS));
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
