//! Periodic liveness sweep

use chrono::Utc;
use tracing::{debug, error, instrument};

use super::Database;

/// What one sweep did
///
/// Each step is independent; a failed step is `None` and has been logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Lounges demoted to inactive
    pub demoted: Option<usize>,
    /// Lounges whose active user count was recomputed
    pub recounted: Option<usize>,
}

impl SweepReport {
    /// True when both steps succeeded
    pub fn is_complete(&self) -> bool {
        self.demoted.is_some() && self.recounted.is_some()
    }
}

impl Database {
    /// Demote stale lounges, then recompute every lounge's active user count
    ///
    /// Never fails: step errors are logged and reported as missing counts.
    #[instrument(skip(self))]
    pub async fn timed_sweep(&self) -> SweepReport {
        let lounges = self.lounges();
        let window = self.options().liveness_window;

        let demoted = match Utc::now().checked_sub_signed(window) {
            Some(cutoff) => match lounges.demote_stale(cutoff).await {
                Ok(n) => Some(n),
                Err(e) => {
                    error!(error = %e, "Failed to demote stale lounges");
                    None
                }
            },
            None => {
                error!(
                    window_secs = window.num_seconds(),
                    "Liveness window out of range, skipping demotion"
                );
                None
            }
        };

        let recounted = match lounges.recount_active_users().await {
            Ok(n) => Some(n),
            Err(e) => {
                error!(error = %e, "Failed to recount active users");
                None
            }
        };

        let report = SweepReport { demoted, recounted };
        debug!(?report, "Sweep finished");
        report
    }
}
