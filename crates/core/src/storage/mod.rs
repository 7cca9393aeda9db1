//! SQLite storage layer for Lounge Hub
//!
//! One physical connection, shared by every caller through a cloneable
//! [`Database`] handle. Each statement runs under an async mutex in its own
//! committed transaction on the blocking thread pool; a busy or locked
//! database is retried according to the configured [`RetryPolicy`] with the
//! mutex released between attempts.

mod lounges;
mod parse;
mod retry;
mod schema;
mod settings;
mod sweep;
mod users;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::error::{Error, Result};

pub use lounges::LoungeStore;
pub use parse::{format_timestamp, TIMESTAMP_FORMAT, WHITELIST_SENTINEL};
pub use retry::{is_contention, RetryPolicy};
pub use settings::SettingsStore;
pub use sweep::SweepReport;
pub use users::UserStore;

/// Tunables for an open store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub retry: RetryPolicy,
    /// Lounges not pinged within this window are demoted by the sweep
    pub liveness_window: chrono::Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            liveness_window: chrono::Duration::hours(24),
        }
    }
}

struct Shared {
    /// `None` once the store has been closed
    conn: Arc<Mutex<Option<Connection>>>,
    options: StoreOptions,
}

/// Main database handle
///
/// Cheap to clone; all clones share the same connection and lock.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create database at the given path with default options
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreOptions::default()).await
    }

    /// Open or create database at the given path
    #[instrument(skip(path, options), fields(path = %path.as_ref().display()))]
    pub async fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, options).await
    }

    /// Open in-memory database (for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, StoreOptions::default()).await
    }

    async fn from_connection(conn: Connection, options: StoreOptions) -> Result<Self> {
        // Contention is surfaced immediately and handled by the retry loop
        conn.busy_timeout(Duration::ZERO)?;
        // The whitelist sentinel has no lounges row
        conn.execute_batch("PRAGMA foreign_keys = OFF")?;

        let db = Self {
            shared: Arc::new(Shared {
                conn: Arc::new(Mutex::new(Some(conn))),
                options,
            }),
        };
        db.ensure_schema().await?;
        info!("Database opened");
        Ok(db)
    }

    /// Create the hub tables if absent
    ///
    /// Failure here is fatal: the store cannot serve any operation.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut guard = self.shared.conn.lock().await;
        let conn = guard.as_mut().ok_or(Error::Closed)?;
        schema::create_tables(conn).map_err(|e| {
            error!(error = %e, "Schema creation failed");
            Error::Schema(e)
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.shared.options
    }

    /// Release the connection
    ///
    /// Waits for any in-flight statement. Later calls on any clone of this
    /// handle fail with [`Error::Closed`]; closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.shared.conn.lock().await;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| Error::Database(e))?;
            info!("Database closed");
        }
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.conn.lock().await.is_none()
    }

    /// Execute one non-row-returning statement and commit it
    ///
    /// Returns the number of rows changed.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<usize> {
        let statement = sql.to_string();
        self.run(sql, move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(&statement, params_from_iter(params.iter()))?;
            tx.commit()?;
            Ok(changed)
        })
        .await
    }

    /// Run one query and collect every row through `map`
    pub async fn query<T, F>(&self, sql: &str, params: Vec<Value>, map: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let statement = sql.to_string();
        self.run(sql, move |conn| {
            let tx = conn.transaction()?;
            let rows = {
                let mut stmt = tx.prepare(&statement)?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), |row| map(row))?
                    .collect::<rusqlite::Result<Vec<T>>>()?;
                rows
            };
            tx.commit()?;
            Ok(rows)
        })
        .await
    }

    /// Run one query expected to return at most one row
    pub async fn query_row<T, F>(&self, sql: &str, params: Vec<Value>, map: F) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let statement = sql.to_string();
        self.run(sql, move |conn| {
            let tx = conn.transaction()?;
            let row = tx
                .query_row(&statement, params_from_iter(params.iter()), |row| map(row))
                .optional()?;
            tx.commit()?;
            Ok(row)
        })
        .await
    }

    /// Serialized access with lock-contention retry
    ///
    /// The mutex is held for exactly one call of `op`, which runs on the
    /// blocking pool so SQLite never stalls the executor. The mutex is
    /// released before any backoff sleep. Only busy/locked failures are
    /// retried.
    async fn run<T, F>(&self, sql: &str, mut op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let policy = self.shared.options.retry;
        let mut attempt = 1;
        loop {
            let guard = self.shared.conn.clone().lock_owned().await;
            let (returned, outcome) = tokio::task::spawn_blocking(move || {
                let mut guard = guard;
                let outcome = guard.as_mut().map(|conn| op(conn));
                (op, outcome)
            })
            .await?;
            op = returned;
            let outcome = outcome.ok_or(Error::Closed)?;

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if is_contention(&e) => {
                    if attempt >= policy.max_attempts {
                        error!(attempts = attempt, error = %e, query = sql, "Database still locked, giving up");
                        return Err(Error::Contention {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = policy.delay();
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Database locked, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, query = sql, "Database error during execute");
                    return Err(e.into());
                }
            }
        }
    }

    /// Get lounge store
    pub fn lounges(&self) -> LoungeStore<'_> {
        LoungeStore::new(self)
    }

    /// Get user store
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(self)
    }

    /// Get settings store
    pub fn settings(&self) -> SettingsStore<'_> {
        SettingsStore::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    fn quick_retry(max_attempts: u32) -> StoreOptions {
        StoreOptions {
            retry: RetryPolicy {
                max_attempts,
                backoff: Duration::from_millis(20),
                jitter: Duration::ZERO,
            },
            ..StoreOptions::default()
        }
    }

    #[tokio::test]
    async fn test_open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("hub.db");
        let db = Database::open(&path).await.unwrap();
        assert!(path.exists());

        let tables = db
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                vec![],
                |row| row.get::<_, String>(0),
            )
            .await
            .unwrap();
        assert_eq!(tables, vec!["lounges", "settings", "users"]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hub.db");

        let db = Database::open(&path).await.unwrap();
        db.settings().set("motd", "welcome").await.unwrap();
        db.close().await.unwrap();

        let db = Database::open(&path).await.unwrap();
        assert_eq!(
            db.settings().get("motd").await.unwrap().as_deref(),
            Some("welcome")
        );
    }

    #[tokio::test]
    async fn test_execute_reports_changed_rows() {
        let db = Database::open_in_memory().await.unwrap();
        let changed = db
            .execute(
                "INSERT INTO settings (setting, value) VALUES (?1, ?2)",
                vec![Value::from("a".to_string()), Value::from("1".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let missing = db
            .query_row(
                "SELECT value FROM settings WHERE setting = ?1",
                vec![Value::from("b".to_string())],
                |row| row.get::<_, String>(0),
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_non_contention_error_is_not_retried() {
        let db = Database::open_in_memory().await.unwrap();
        let started = Instant::now();
        let err = db
            .execute("INSERT INTO no_such_table VALUES (1)", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_closed_database_rejects_statements() {
        let db = Database::open_in_memory().await.unwrap();
        let other = db.clone();
        db.close().await.unwrap();
        db.close().await.unwrap();

        assert!(other.is_closed().await);
        let err = other.execute("DELETE FROM settings", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn test_contention_exhausts_retries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hub.db");
        let db = Database::open_with(&path, quick_retry(3)).await.unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = db
            .execute(
                "INSERT INTO settings (setting, value) VALUES ('k', 'v')",
                vec![],
            )
            .await
            .unwrap_err();
        match err {
            Error::Contention { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected contention, got {other:?}"),
        }

        blocker.execute_batch("ROLLBACK").unwrap();
    }

    #[tokio::test]
    async fn test_contention_recovers_when_lock_released() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hub.db");
        let db = Database::open_with(&path, quick_retry(50)).await.unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            blocker.execute_batch("COMMIT").unwrap();
        });

        let changed = db
            .execute(
                "INSERT INTO settings (setting, value) VALUES ('k', 'v')",
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);
        release.join().unwrap();
    }

    #[tokio::test]
    async fn test_statements_run_off_the_executor() {
        let db = Database::open_in_memory().await.unwrap();
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        // A statement that keeps SQLite busy for a while
        let total = db
            .query_row(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 2000000)
                 SELECT SUM(x) FROM n",
                vec![],
                |row| row.get::<_, i64>(0),
            )
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(total, Some(2_000_000 * 2_000_001 / 2));
        assert!(ticks.load(std::sync::atomic::Ordering::Relaxed) > 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let db = Database::open_in_memory().await.unwrap();
        let mut handles = Vec::new();
        for i in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.settings()
                    .set(&format!("key-{i}"), &i.to_string())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let count = db
            .query_row("SELECT COUNT(*) FROM settings", vec![], |row| {
                row.get::<_, i64>(0)
            })
            .await
            .unwrap();
        assert_eq!(count, Some(16));
    }
}
