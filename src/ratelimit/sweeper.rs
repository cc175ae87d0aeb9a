//! Background eviction of exhausted identities.
//!
//! Identities are created for every caller that ever reaches the endpoint,
//! so the key space is attacker controlled. The sweeper periodically drops
//! every entry whose window log is empty and whose ban, if any, has lapsed.
//! Entries held by an in-flight request are left for the next pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::clock::Clock;
use super::store::{Store, SweepReport};

/// Default interval between sweep passes (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic cleanup over a [`Store`].
pub struct Sweeper {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
    interval: Duration,
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, window_ms: u64, interval: Duration) -> Self {
        Self {
            store,
            clock,
            window_ms,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one pass at `now`.
    pub fn sweep_once(&self, now: u64) -> SweepReport {
        let window_ms = self.window_ms;
        let report = self
            .store
            .sweep(|_, state| state.is_exhausted(now, window_ms));

        if report.evicted > 0 || report.skipped_busy > 0 {
            info!(
                scanned = report.scanned,
                evicted = report.evicted,
                skipped_busy = report.skipped_busy,
                remaining = self.store.len(),
                "Sweep pass complete"
            );
        } else {
            debug!(scanned = report.scanned, "Sweep pass found nothing to evict");
        }

        report
    }

    /// Start sweeping in the background until the handle is shut down.
    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sweep_loop(self, cancel.clone()));
        SweeperHandle { cancel, task }
    }
}

async fn run_sweep_loop(sweeper: Sweeper, cancel: CancellationToken) {
    let mut ticker = interval(sweeper.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; an empty store needs no sweep.
    ticker.tick().await;

    info!(interval_secs = sweeper.interval.as_secs(), "Sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                let now = sweeper.clock.now_ms();
                sweeper.sweep_once(now);
            }
        }
    }
}

impl SweeperHandle {
    /// Whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweeper and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Sweeper task failed");
        }
    }
}
