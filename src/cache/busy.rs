//! Busy-Task Set
//!
//! Counts background work that must land before the engine releases its
//! tiers. Each task holds a [`BusyGuard`]; closing waits until none remain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    count: AtomicUsize,
    idle: Notify,
}

// == Busy Tasks ==
/// Shared in-flight counter.
#[derive(Debug, Clone, Default)]
pub struct BusyTasks {
    inner: Arc<Inner>,
}

impl BusyTasks {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one in-flight task until the returned guard is dropped.
    pub fn enter(&self) -> BusyGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        BusyGuard {
            inner: self.inner.clone(),
        }
    }

    /// Returns the number of in-flight tasks.
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Waits until no task is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

// == Busy Guard ==
/// Marks one task as in flight for as long as it lives.
#[derive(Debug)]
pub struct BusyGuard {
    inner: Arc<Inner>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let busy = BusyTasks::new();
        tokio::time::timeout(Duration::from_millis(100), busy.wait_idle())
            .await
            .expect("should not wait");
    }

    #[tokio::test]
    async fn test_guard_tracks_count() {
        let busy = BusyTasks::new();
        let a = busy.enter();
        let b = busy.enter();
        assert_eq!(busy.count(), 2);
        drop(a);
        assert_eq!(busy.count(), 1);
        drop(b);
        assert_eq!(busy.count(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_guards() {
        let busy = BusyTasks::new();
        let guard = busy.enter();

        let waiter = {
            let busy = busy.clone();
            tokio::spawn(async move { busy.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
