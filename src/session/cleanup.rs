//! Background eviction of expired sessions
//!
//! Sessions are otherwise only dropped when they are found expired on access
//! or deleted explicitly. Abandoned ids that are never revisited would stay
//! in memory forever, so a periodic sweep removes anything idle past the TTL.

use crate::session::store::SessionStore;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default interval between sweeps (10 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;

/// Result of a single sweep
#[derive(Debug, Clone, Copy)]
pub struct SweepResult {
    /// Sessions present before the sweep
    pub sessions_scanned: usize,
    /// Expired sessions removed
    pub sessions_removed: usize,
}

pub struct Cleanup {
    store: SessionStore,
    interval: Duration,
}

impl Cleanup {
    pub fn new(store: SessionStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Runs one sweep over the store
    pub async fn run(&self) -> SweepResult {
        let started = Instant::now();
        let sessions_scanned = self.store.session_count().await;
        let sessions_removed = self.store.sweep_expired().await;

        if sessions_removed > 0 {
            info!(
                sessions_scanned = sessions_scanned,
                sessions_removed = sessions_removed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Session sweep complete"
            );
        } else {
            debug!(sessions_scanned = sessions_scanned, "Session sweep found nothing to evict");
        }

        SweepResult {
            sessions_scanned,
            sessions_removed,
        }
    }

    /// Starts the sweep loop on the current runtime.
    ///
    /// Returns a JoinHandle for graceful shutdown coordination and a shutdown sender
    /// to signal the task to stop.
    pub fn start(self) -> (JoinHandle<()>, mpsc::Sender<()>) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            // The first tick fires immediately; nothing can be expired yet
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Sweep task received shutdown signal, stopping");
                        break;
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }
}

impl SessionStore {
    /// Starts the background sweep for this store.
    pub fn start_cleanup_task(&self, interval: Duration) -> (JoinHandle<()>, mpsc::Sender<()>) {
        Cleanup::new(self.clone(), interval).start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::store::SessionSettings;
    use std::sync::Arc;

    fn store(ttl_secs: u64) -> (SessionStore, ManualClock) {
        let clock = ManualClock::default();
        let store = SessionStore::new(
            SessionSettings::new(Duration::from_secs(ttl_secs), "preamble"),
            Arc::new(clock.clone()),
        );
        (store, clock)
    }

    #[tokio::test]
    async fn test_run_reports_counts() {
        let (store, clock) = store(30);
        for i in 0..3 {
            store.get_or_create(&format!("old-{}", i)).await;
        }
        clock.advance(chrono::Duration::seconds(31));
        store.get_or_create("fresh").await;

        let result = Cleanup::new(store.clone(), Duration::from_secs(60)).run().await;

        assert_eq!(result.sessions_scanned, 4);
        assert_eq!(result.sessions_removed, 3);
        assert_eq!(store.session_count().await, 1);
        assert!(store.exists("fresh").await);
    }

    #[tokio::test]
    async fn test_run_no_expired() {
        let (store, _) = store(30);
        store.get_or_create("a").await;

        let result = Cleanup::new(store.clone(), Duration::from_secs(60)).run().await;

        assert_eq!(result.sessions_removed, 0);
        assert!(store.exists("a").await);
    }

    #[tokio::test]
    async fn test_background_task_evicts() {
        let (store, clock) = store(5);
        store.get_or_create("idle").await;
        clock.advance(chrono::Duration::seconds(6));

        let (handle, shutdown) = store.start_cleanup_task(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!store.exists("idle").await);

        let _ = shutdown.send(()).await;
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok(), "Sweep task should stop within timeout");
    }

    #[tokio::test]
    async fn test_shutdown_before_first_sweep() {
        let (store, _) = store(5);

        let (handle, shutdown) = store.start_cleanup_task(Duration::from_secs(3600));
        let _ = shutdown.send(()).await;

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok());
    }
}
