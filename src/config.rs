//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default TTL for entries without explicit TTL (30 days)
pub const DEFAULT_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default cap on shared-tier lifetime (4 hours)
pub const DEFAULT_SHARED_HORIZON_SECS: u64 = 4 * 60 * 60;

/// Default interval between sweeps (2 hours)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 2 * 60 * 60;

/// Default wake tick of the active cleanup loop
pub const DEFAULT_CLEANUP_TICK_SECS: u64 = 60;

// == Cleanup Mode ==
/// How periodic sweeps are driven for an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupMode {
    /// Checked opportunistically on every `set`
    #[default]
    Passive,
    /// Checked by a dedicated background loop
    Active,
}

impl FromStr for CleanupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passive" => Ok(CleanupMode::Passive),
            "active" => Ok(CleanupMode::Active),
            other => Err(format!("unknown cleanup mode '{}'", other)),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one compressed file per cached endpoint
    pub cache_dir: PathBuf,
    /// Prefix for the shared-tier bookkeeping properties
    pub namespace: String,
    /// TTL applied when `set` is called without one
    pub default_ttl: Duration,
    /// Maximum lifetime of a shared-tier entry; longer TTLs also go to disk
    pub shared_horizon: Duration,
    /// Minimum time between two sweeps
    pub cleanup_interval: Duration,
    /// Wake tick of the active cleanup loop
    pub cleanup_tick: Duration,
    /// Which scheduler drives sweeps
    pub cleanup_mode: CleanupMode,
    /// Read and write the shared property tier
    pub use_shared_tier: bool,
    /// Read and write the file tier
    pub use_file_tier: bool,
    /// HTTP server port of the host binary
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - File tier directory (default: ./cache)
    /// - `CACHE_NAMESPACE` - Shared-tier property prefix (default: tiercache)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 30 days)
    /// - `SHARED_TIER_HORIZON` - Shared-tier cap in seconds (default: 4 hours)
    /// - `CLEANUP_INTERVAL` - Sweep interval in seconds (default: 2 hours)
    /// - `CLEANUP_TICK` - Active loop tick in seconds (default: 60)
    /// - `CLEANUP_MODE` - `passive` or `active` (default: passive)
    /// - `USE_SHARED_TIER` / `USE_FILE_TIER` - Tier toggles (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.namespace),
            default_ttl: env_secs("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            shared_horizon: env_secs("SHARED_TIER_HORIZON").unwrap_or(defaults.shared_horizon),
            cleanup_interval: env_secs("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            cleanup_tick: env_secs("CLEANUP_TICK").unwrap_or(defaults.cleanup_tick),
            cleanup_mode: env_parse("CLEANUP_MODE").unwrap_or(defaults.cleanup_mode),
            use_shared_tier: env_parse("USE_SHARED_TIER").unwrap_or(defaults.use_shared_tier),
            use_file_tier: env_parse("USE_FILE_TIER").unwrap_or(defaults.use_file_tier),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Returns a default config rooted at the given cache directory.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Property name holding the shared-tier registry.
    pub fn registry_property(&self) -> String {
        format!("{}.cacheobjects", self.namespace)
    }

    /// Property name holding the last sweep timestamp.
    pub fn last_sweep_property(&self) -> String {
        format!("{}.clean.lastexecuted", self.namespace)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            namespace: "tiercache".to_string(),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            shared_horizon: Duration::from_secs(DEFAULT_SHARED_HORIZON_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            cleanup_tick: Duration::from_secs(DEFAULT_CLEANUP_TICK_SECS),
            cleanup_mode: CleanupMode::Passive,
            use_shared_tier: true,
            use_file_tier: true,
            server_port: 3000,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}
