//! Lounge storage operations and the lounge liveness protocol

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use tracing::{info, instrument, warn};

use super::parse::{
    format_timestamp, is_lounge_token, parse_timestamp, status_from_sql, status_to_sql,
};
use super::Database;
use crate::error::{Error, Result};
use crate::invariants::assert_lounge_invariants;
use crate::models::{Lounge, LoungeSighting, LoungeStatus};

fn lounge_from_row(row: &Row<'_>) -> rusqlite::Result<Lounge> {
    let lounge = Lounge {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        bot_token: row.get(2)?,
        status: status_from_sql(row.get(3)?)?,
        active_user_count: row.get::<_, Option<u32>>(4)?.unwrap_or(0),
        last_updated: parse_timestamp(&row.get::<_, String>(5)?)?,
    };
    assert_lounge_invariants(&lounge);
    Ok(lounge)
}

pub struct LoungeStore<'a> {
    db: &'a Database,
}

impl<'a> LoungeStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Find lounge by bot token
    #[instrument(skip(self, bot_token))]
    pub async fn get(&self, bot_token: &str) -> Result<Option<Lounge>> {
        self.db
            .query_row(
                "SELECT id, name, bot_token, status, active_user_count, last_updated
                 FROM lounges WHERE bot_token = ?1",
                vec![Value::from(bot_token.to_string())],
                lounge_from_row,
            )
            .await
    }

    /// Get the lounge for a token, creating it as active if unseen
    ///
    /// Fails with [`Error::InvalidToken`] for an empty token or the
    /// whitelist sentinel.
    #[instrument(skip(self, bot_token))]
    pub async fn get_or_create(&self, name: &str, bot_token: &str) -> Result<LoungeSighting> {
        if !is_lounge_token(bot_token) {
            warn!("Rejecting unusable bot token");
            return Err(Error::InvalidToken);
        }

        let inserted = self
            .db
            .execute(
                "INSERT INTO lounges (name, bot_token, status, last_updated)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(bot_token) DO NOTHING",
                vec![
                    Value::from(name.to_string()),
                    Value::from(bot_token.to_string()),
                    Value::from(status_to_sql(LoungeStatus::Active)),
                    Value::from(format_timestamp(Utc::now())),
                ],
            )
            .await?;
        let created = inserted == 1;
        if created {
            info!(name = %name, "New lounge recorded");
        }

        let lounge = self
            .get(bot_token)
            .await?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))?;
        Ok(LoungeSighting { lounge, created })
    }

    /// Mark a lounge active and refresh its last update time
    ///
    /// Returns false when no lounge has this token.
    #[instrument(skip(self, bot_token))]
    pub async fn ping(&self, bot_token: &str) -> Result<bool> {
        let changed = self
            .db
            .execute(
                "UPDATE lounges SET status = ?1, last_updated = ?2 WHERE bot_token = ?3",
                vec![
                    Value::from(status_to_sql(LoungeStatus::Active)),
                    Value::from(format_timestamp(Utc::now())),
                    Value::from(bot_token.to_string()),
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    /// Record an unseen lounge, or ping a known one
    ///
    /// A known lounge keeps its stored name; only liveness is refreshed.
    /// Unusable tokens are rejected as in [`LoungeStore::get_or_create`].
    pub async fn record_or_ping(&self, name: &str, bot_token: &str) -> Result<LoungeSighting> {
        let sighting = self.get_or_create(name, bot_token).await?;
        if sighting.created {
            return Ok(sighting);
        }

        self.ping(bot_token).await?;
        let lounge = self.get(bot_token).await?.unwrap_or(sighting.lounge);
        Ok(LoungeSighting {
            lounge,
            created: false,
        })
    }

    /// Update a lounge's display name
    pub async fn rename(&self, bot_token: &str, name: &str) -> Result<bool> {
        let changed = self
            .db
            .execute(
                "UPDATE lounges SET name = ?1 WHERE bot_token = ?2",
                vec![
                    Value::from(name.to_string()),
                    Value::from(bot_token.to_string()),
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    /// All active lounges, in storage order
    #[instrument(skip(self))]
    pub async fn active(&self) -> Result<Vec<Lounge>> {
        self.db
            .query(
                "SELECT id, name, bot_token, status, active_user_count, last_updated
                 FROM lounges WHERE status = ?1",
                vec![Value::from(status_to_sql(LoungeStatus::Active))],
                lounge_from_row,
            )
            .await
    }

    /// Exact number of users currently bound to the lounge
    ///
    /// Counted live from the users table, so it is current even between
    /// sweeps. An unknown token counts zero.
    #[instrument(skip(self, bot_token))]
    pub async fn active_user_count(&self, bot_token: &str) -> Result<u32> {
        let count = self
            .db
            .query_row(
                "SELECT COUNT(*) FROM users WHERE current_active_lounge = ?1",
                vec![Value::from(bot_token.to_string())],
                |row| row.get::<_, u32>(0),
            )
            .await?;
        Ok(count.unwrap_or(0))
    }

    /// Demote active lounges last updated before `cutoff`
    pub async fn demote_stale(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.db
            .execute(
                "UPDATE lounges SET status = ?1 WHERE status = ?2 AND last_updated < ?3",
                vec![
                    Value::from(status_to_sql(LoungeStatus::Inactive)),
                    Value::from(status_to_sql(LoungeStatus::Active)),
                    Value::from(format_timestamp(cutoff)),
                ],
            )
            .await
    }

    /// Recompute every lounge's cached active user count
    pub async fn recount_active_users(&self) -> Result<usize> {
        self.db
            .execute(
                "UPDATE lounges SET active_user_count = (
                    SELECT COUNT(*) FROM users
                    WHERE users.current_active_lounge = lounges.bot_token
                )",
                vec![],
            )
            .await
    }
}
