//! Lock-contention retry policy

use std::time::Duration;

use rand::Rng;
use rusqlite::ErrorCode;

/// Bounded, fixed-backoff retry for a locked database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
    /// Upper bound of the random delay added to each backoff
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_secs(1),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt: backoff plus up to `jitter`
    pub fn delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.backoff;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.backoff + Duration::from_millis(extra)
    }
}

/// True when SQLite reported the database as busy or locked
pub fn is_contention(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}
