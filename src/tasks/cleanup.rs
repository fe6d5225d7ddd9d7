//! Cache Cleanup Task
//!
//! Background loop driving the engine's sweep in active cleanup mode. It
//! wakes on a fixed tick, runs the sweep when the sweep interval has
//! elapsed, and exits once the engine starts closing.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;

/// Spawns the active-mode cleanup loop for `engine`.
///
/// # Arguments
/// * `engine` - The engine whose sweep is driven
/// * `tick` - Interval between due-checks
/// * `shutdown` - Flips to `true` when the engine starts closing
///
/// # Returns
/// A JoinHandle that resolves once the loop has observed the shutdown.
pub fn spawn_cleanup_task(
    engine: CacheEngine,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache cleanup task with tick of {:?}", tick);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let sweeper = engine.clone();
            match tokio::task::spawn_blocking(move || sweeper.sweep_if_due()).await {
                Ok(Some(report)) => {
                    info!(
                        "Cleanup tick: swept {} shared entries and {} files",
                        report.shared_cleared, report.files_removed
                    );
                }
                Ok(None) => debug!("Cleanup tick: sweep not due"),
                Err(err) => warn!("Cleanup sweep failed: {}", err),
            }
        }

        info!("Cache cleanup task stopped");
    })
}
