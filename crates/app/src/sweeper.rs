//! Periodic sweep scheduler
//!
//! Runs `timed_sweep` on a fixed interval, starting immediately. Sweeps run
//! one at a time on a single task; ticks missed while a sweep is running are
//! skipped rather than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lounge_core::Database;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Handle to a running sweeper task
pub struct Sweeper {
    task: JoinHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
    completed: Arc<AtomicU64>,
}

impl Sweeper {
    /// Start sweeping `db` every `period`
    pub fn spawn(db: Database, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let completed = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(sweep_loop(db, period, shutdown_rx, completed.clone()));
        info!(period_secs = period.as_secs_f64(), "Sweeper started");

        Self {
            task,
            shutdown_tx,
            completed,
        }
    }

    /// Number of sweeps finished so far
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Stop the sweeper, letting an in-flight sweep finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
        info!("Sweeper stopped");
    }
}

async fn sweep_loop(
    db: Database,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    completed: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let report = db.timed_sweep().await;
                if !report.is_complete() {
                    warn!(?report, "Sweep finished with failures");
                }
                completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
