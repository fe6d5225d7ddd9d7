//! Integration Tests for the Cache Engine
//!
//! Exercises the tier cascade, promotion, sweeps and failure handling
//! through the public engine API.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use tiercache::cache::{
    CacheEngine, Clock, InMemoryPropertyStore, ManualClock, PropertyStore,
};
use tiercache::{CacheError, Config, Memoized, Result};
use tokio_test::{assert_err, assert_ok};

const DAY: Duration = Duration::from_secs(24 * 3600);

// == Helper Functions ==

struct Fixture {
    dir: TempDir,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryPropertyStore>,
    engine: CacheEngine,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(InMemoryPropertyStore::new());
    let engine = open(&dir, store.clone(), clock.clone());
    Fixture {
        dir,
        clock,
        store,
        engine,
    }
}

fn open(dir: &TempDir, store: Arc<dyn PropertyStore>, clock: Arc<ManualClock>) -> CacheEngine {
    CacheEngine::open_with(Config::with_cache_dir(dir.path()), store, clock).unwrap()
}

/// A property store whose backend is down.
struct UnavailableStore;

impl PropertyStore for UnavailableStore {
    fn get_property(&self, _name: &str) -> Result<Option<String>> {
        Err(CacheError::TierUnavailable {
            tier: "shared",
            reason: "store offline".to_string(),
        })
    }

    fn set_property(&self, name: &str, _value: &str) -> Result<()> {
        self.get_property(name).map(|_| ())
    }

    fn clear_property(&self, name: &str) -> Result<()> {
        self.get_property(name).map(|_| ())
    }
}

// == TTL ==

#[tokio::test]
async fn test_top250_scenario() {
    let f = fixture();
    let movies = json!(["The Shawshank Redemption", "The Godfather", "The Dark Knight"]);

    assert_ok!(
        f.engine
            .set("movies/top250", movies.clone(), "", Some(DAY * 30))
            .wait()
            .await
    );
    assert_eq!(f.engine.get("movies/top250", ""), Some(movies));

    f.clock.advance(chrono::Duration::days(31));
    assert_eq!(f.engine.get("movies/top250", ""), None);
}

#[tokio::test]
async fn test_default_ttl_applies() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!(1), "", None).wait().await);

    f.clock.advance(chrono::Duration::days(29));
    assert_eq!(f.engine.get("a", ""), Some(json!(1)));

    f.clock.advance(chrono::Duration::days(2));
    assert_eq!(f.engine.get("a", ""), None);
}

#[tokio::test]
async fn test_overwrite_replaces_entry() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!("v1"), "", Some(DAY)).wait().await);
    assert_ok!(f.engine.set("a", json!("v2"), "", Some(DAY)).wait().await);

    assert_eq!(f.engine.get("a", ""), Some(json!("v2")));
    f.engine.memory().clear_all();
    assert_eq!(f.engine.get("a", ""), Some(json!("v2")));
}

// == Checksums ==

#[tokio::test]
async fn test_checksum_gating_across_tiers() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!("v"), "a", Some(DAY)).wait().await);

    for _ in 0..2 {
        assert_eq!(f.engine.get("a", "b"), None);
        assert_eq!(f.engine.get("a", "a"), Some(json!("v")));
        assert_eq!(f.engine.get("a", ""), Some(json!("v")));

        // Repeat against the disk tier only.
        f.engine.memory().clear_all();
        f.engine.shared().clear(&f.engine.key_for("a")).unwrap();
    }
}

#[tokio::test]
async fn test_query_checksum_against_unchecked_entry() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!("v"), "", Some(DAY)).wait().await);
    assert_eq!(f.engine.get("a", "anything"), None);
}

// == Promotion ==

#[tokio::test]
async fn test_disk_hit_repopulates_faster_tiers() {
    let f = fixture();
    let key = f.engine.key_for("movies/top250");
    assert_ok!(
        f.engine
            .set("movies/top250", json!([1, 2, 3]), "", Some(DAY * 30))
            .wait()
            .await
    );

    f.engine.memory().clear_all();
    f.engine.shared().clear(&key).unwrap();
    assert!(f.engine.shared().get(&key).unwrap().is_none());

    assert_eq!(f.engine.get("movies/top250", ""), Some(json!([1, 2, 3])));
    assert!(f.engine.memory().get(&key).is_some());
    assert!(f.engine.shared().get_entry(&key).unwrap().is_some());
    assert_eq!(f.engine.stats().file_hits, 1);

    // Second lookup is answered from memory.
    assert_eq!(f.engine.get("movies/top250", ""), Some(json!([1, 2, 3])));
    assert_eq!(f.engine.stats().memory_hits, 1);
}

#[tokio::test]
async fn test_new_instance_reads_from_disk() {
    let f = fixture();
    assert_ok!(
        f.engine
            .set("persisted", json!({"n": 1}), "", Some(DAY * 2))
            .wait()
            .await
    );
    f.engine.close().await;

    // Fresh process: empty property store, same directory.
    let engine = open(
        &f.dir,
        Arc::new(InMemoryPropertyStore::new()),
        f.clock.clone(),
    );
    assert_eq!(engine.get("persisted", ""), Some(json!({"n": 1})));
    engine.close().await;
}

#[tokio::test]
async fn test_shared_tier_is_visible_to_other_instances() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!(1), "", Some(Duration::from_secs(600))).wait().await);

    let other = open(&f.dir, f.store.clone(), f.clock.clone());
    assert_eq!(other.get("a", ""), Some(json!(1)));
    assert_eq!(other.stats().shared_hits, 1);
}

// == Sweep ==

#[tokio::test]
async fn test_sweep_correctness() {
    let f = fixture();
    let now = f.clock.now();
    let cases = [
        ("short-mem", Duration::from_secs(600)),
        ("short-disk", DAY),
        ("long-mem", Duration::from_secs(3 * 3600)),
        ("long-disk", DAY * 10),
    ];
    for (endpoint, ttl) in cases {
        assert_ok!(f.engine.set(endpoint, json!(endpoint), "", Some(ttl)).wait().await);
    }

    let sweep_at = now + chrono::Duration::days(2);
    let report = f.engine.sweep(sweep_at);
    assert!(report.completed);

    // Nothing expired at sweep time survives anywhere.
    for endpoint in ["short-mem", "short-disk", "long-mem"] {
        let key = f.engine.key_for(endpoint);
        assert!(f.engine.memory().get(&key).is_none());
        assert!(f.engine.shared().get(&key).unwrap().is_none());
        assert!(!f.engine.files().path_for(&key).exists());
    }

    // The live disk entry is still served after the sweep.
    f.clock.set(sweep_at);
    assert_eq!(f.engine.get("long-disk", ""), Some(json!("long-disk")));
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!(1), "", Some(DAY)).wait().await);
    let later = f.clock.now() + chrono::Duration::days(2);

    let first = f.engine.sweep(later);
    let second = f.engine.sweep(later);
    assert_eq!(first.files_removed, 1);
    assert_eq!(second.files_removed, 0);
    assert_eq!(second.shared_cleared, 0);
}

#[tokio::test]
async fn test_lost_registry_does_not_serve_expired_data() {
    let f = fixture();
    assert_ok!(f.engine.set("a", json!(1), "", Some(Duration::from_secs(60))).wait().await);
    f.engine.shared().replace_registry(&[]).unwrap();

    f.clock.advance(chrono::Duration::minutes(5));
    f.engine.sweep(f.clock.now());
    assert_eq!(f.engine.get("a", ""), None);
}

// == Corruption ==

#[tokio::test]
async fn test_corrupted_file_reads_as_miss_and_is_removed() {
    let f = fixture();
    let key = f.engine.key_for("movies/top250");
    fs::write(f.dir.path().join(&key), b"\x00\x01garbage bytes").unwrap();

    assert_eq!(f.engine.get("movies/top250", ""), None);
    assert!(!f.dir.path().join(&key).exists());
}

#[tokio::test]
async fn test_sweep_removes_corrupted_files() {
    let f = fixture();
    fs::write(f.dir.path().join("abcd"), b"garbage").unwrap();

    let report = f.engine.sweep(f.clock.now());
    assert_eq!(report.files_scanned, 1);
    assert!(!f.dir.path().join("abcd").exists());
}

// == Backend Failures ==

#[tokio::test]
async fn test_unavailable_shared_tier_falls_through_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = open(&dir, Arc::new(UnavailableStore), clock);

    let result = engine.set("a", json!(1), "", Some(DAY)).wait().await;
    assert!(matches!(
        result,
        Err(CacheError::TierUnavailable { tier: "shared", .. })
    ));
    assert!(engine.files().path_for(&engine.key_for("a")).exists());

    engine.memory().clear_all();
    assert_eq!(engine.get("a", ""), Some(json!(1)));
    assert_eq!(engine.stats().write_failures, 1);
}

#[tokio::test]
async fn test_unwritable_directory_reports_file_tier() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"file in the way").unwrap();

    let engine = CacheEngine::open_with(
        Config::with_cache_dir(&blocker),
        Arc::new(InMemoryPropertyStore::new()),
        Arc::new(ManualClock::new(Utc::now())),
    )
    .unwrap();

    let result = engine.set("a", json!(1), "", Some(DAY)).wait().await;
    assert!(matches!(
        result,
        Err(CacheError::TierUnavailable { tier: "file", .. })
    ));
    // The fast tiers still took the write.
    assert_eq!(engine.get("a", ""), Some(json!(1)));
}

// == Lifecycle ==

#[tokio::test]
async fn test_close_rejects_new_writes() {
    let f = fixture();
    f.engine.close().await;
    assert_err!(f.engine.set("a", json!(1), "", None).wait().await);
}

#[tokio::test]
async fn test_memoized_adapter_uses_cache() {
    let f = fixture();
    let fib = Memoized::new(f.engine.clone(), "fib", |n: &u32| {
        (0..*n).fold((0u64, 1u64), |(a, b), _| (b, a + b)).0
    })
    .with_ttl(DAY);

    assert_eq!(fib.call(&50), 12_586_269_025);
    f.engine.flush().await;
    assert!(f
        .engine
        .files()
        .path_for(&f.engine.key_for(fib.endpoint(&50).unwrap()))
        .exists());
}
