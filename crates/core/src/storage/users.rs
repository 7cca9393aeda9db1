//! User storage operations
//!
//! Bindings are sticky: a sighting only binds a user who is currently
//! unbound. Leaving clears an ordinary binding but never the whitelist.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::Row;
use tracing::{info, instrument, warn};

use super::parse::{
    binding_from_sql, binding_to_sql, format_timestamp, is_lounge_token, parse_timestamp_opt,
    WHITELIST_SENTINEL,
};
use super::Database;
use crate::error::{Error, Result};
use crate::invariants::assert_sighting_invariants;
use crate::models::{Binding, HubUser, UpsertOutcome, UserSighting};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<HubUser> {
    Ok(HubUser {
        user_id: row.get(0)?,
        full_name: row.get(1)?,
        username: row.get(2)?,
        binding: binding_from_sql(row.get(3)?),
        last_seen: parse_timestamp_opt(row.get(4)?)?,
        universal_ban: row.get(5)?,
    })
}

pub struct UserStore<'a> {
    db: &'a Database,
}

impl<'a> UserStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: i64) -> Result<Option<HubUser>> {
        self.db
            .query_row(
                "SELECT user_id, full_name, username, current_active_lounge, last_seen, universal_ban
                 FROM users WHERE user_id = ?1",
                vec![Value::from(user_id)],
                user_from_row,
            )
            .await
    }

    /// Record a user sighting reported by a lounge
    ///
    /// Banned users are never written. Otherwise the reporting lounge is
    /// created or renamed as needed, the user row is inserted or refreshed,
    /// and the lounge is pinged. A sighting can only bind the user to a real
    /// lounge, so an empty token or the whitelist sentinel fails with
    /// [`Error::InvalidToken`].
    #[instrument(skip(self, sighting), fields(user_id = sighting.user_id))]
    pub async fn upsert(&self, sighting: &UserSighting) -> Result<UpsertOutcome> {
        if !is_lounge_token(&sighting.bot_token) {
            warn!("Rejecting sighting with unusable bot token");
            return Err(Error::InvalidToken);
        }
        assert_sighting_invariants(sighting);

        if self.is_banned(sighting.user_id).await? {
            warn!("Ignoring sighting of banned user");
            return Ok(UpsertOutcome::Banned);
        }

        let lounges = self.db.lounges();
        let lounge = lounges
            .get_or_create(&sighting.lounge_name, &sighting.bot_token)
            .await?;
        if !lounge.created && lounge.lounge.name != sighting.lounge_name {
            lounges
                .rename(&sighting.bot_token, &sighting.lounge_name)
                .await?;
        }

        if !self.write_sighting(sighting).await? {
            // Banned between the check and the write
            warn!("Ignoring sighting of banned user");
            return Ok(UpsertOutcome::Banned);
        }

        lounges.ping(&sighting.bot_token).await?;
        Ok(UpsertOutcome::Recorded {
            lounge_created: lounge.created,
        })
    }

    /// Insert or refresh the user row for a sighting
    ///
    /// The binding is only set when the user is unbound. Returns false,
    /// leaving the row untouched, when the user is banned.
    async fn write_sighting(&self, sighting: &UserSighting) -> Result<bool> {
        let binding = Binding::Lounge(sighting.bot_token.clone());
        let written = self
            .db
            .execute(
                "INSERT INTO users (user_id, full_name, username, current_active_lounge, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    full_name = excluded.full_name,
                    username = excluded.username,
                    current_active_lounge = CASE
                        WHEN users.current_active_lounge IS NULL
                        THEN excluded.current_active_lounge
                        ELSE users.current_active_lounge
                    END,
                    last_seen = excluded.last_seen
                 WHERE users.universal_ban = FALSE",
                vec![
                    Value::from(sighting.user_id),
                    Value::from(sighting.full_name.clone()),
                    Value::from(sighting.username.clone()),
                    Value::from(binding_to_sql(&binding)),
                    Value::from(format_timestamp(Utc::now())),
                ],
            )
            .await?;
        Ok(written > 0)
    }

    /// Clear a user's lounge binding unless they are whitelisted
    ///
    /// Returns false when the user is unknown.
    #[instrument(skip(self))]
    pub async fn left(&self, user_id: i64) -> Result<bool> {
        let changed = self
            .db
            .execute(
                "UPDATE users
                 SET current_active_lounge = CASE
                     WHEN current_active_lounge = ?1 THEN current_active_lounge
                     ELSE NULL
                 END
                 WHERE user_id = ?2",
                vec![Value::from(WHITELIST_SENTINEL.to_string()), Value::from(user_id)],
            )
            .await?;
        Ok(changed > 0)
    }

    /// Exempt a user from single-lounge binding
    #[instrument(skip(self))]
    pub async fn whitelist(&self, user_id: i64) -> Result<bool> {
        self.set_binding(user_id, &Binding::Whitelisted).await
    }

    /// Remove a user's whitelist (or any binding)
    #[instrument(skip(self))]
    pub async fn dewhitelist(&self, user_id: i64) -> Result<bool> {
        self.set_binding(user_id, &Binding::Unbound).await
    }

    async fn set_binding(&self, user_id: i64, binding: &Binding) -> Result<bool> {
        let changed = self
            .db
            .execute(
                "UPDATE users SET current_active_lounge = ?1 WHERE user_id = ?2",
                vec![Value::from(binding_to_sql(binding)), Value::from(user_id)],
            )
            .await?;
        Ok(changed > 0)
    }

    /// Universally ban a user
    ///
    /// An unseen user gets a row carrying only the ban, so later sightings
    /// are rejected too. There is no unban.
    #[instrument(skip(self))]
    pub async fn ban(&self, user_id: i64) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO users (user_id, universal_ban) VALUES (?1, TRUE)
                 ON CONFLICT(user_id) DO UPDATE SET universal_ban = TRUE",
                vec![Value::from(user_id)],
            )
            .await?;
        info!("User universally banned");
        Ok(())
    }

    /// Check if user is banned; unknown users are not
    #[instrument(skip(self))]
    pub async fn is_banned(&self, user_id: i64) -> Result<bool> {
        let banned = self
            .db
            .query_row(
                "SELECT universal_ban FROM users WHERE user_id = ?1",
                vec![Value::from(user_id)],
                |row| row.get::<_, bool>(0),
            )
            .await?;
        Ok(banned.unwrap_or(false))
    }

    /// IDs of every banned user
    pub async fn banned(&self) -> Result<Vec<i64>> {
        self.db
            .query(
                "SELECT user_id FROM users WHERE universal_ban = TRUE",
                vec![],
                |row| row.get(0),
            )
            .await
    }

    /// Users with any binding, whitelisted ones included, in storage order
    pub async fn active(&self) -> Result<Vec<HubUser>> {
        self.db
            .query(
                "SELECT user_id, full_name, username, current_active_lounge, last_seen, universal_ban
                 FROM users WHERE current_active_lounge IS NOT NULL",
                vec![],
                user_from_row,
            )
            .await
    }

    /// A user's current binding; `None` for unknown users
    pub async fn current_lounge(&self, user_id: i64) -> Result<Option<Binding>> {
        self.db
            .query_row(
                "SELECT current_active_lounge FROM users WHERE user_id = ?1",
                vec![Value::from(user_id)],
                |row| Ok(binding_from_sql(row.get(0)?)),
            )
            .await
    }

    /// Display name of the lounge a user is bound to
    pub async fn current_lounge_name(&self, user_id: i64) -> Result<Option<String>> {
        let name = self
            .db
            .query_row(
                "SELECT lounges.name FROM users
                 JOIN lounges ON users.current_active_lounge = lounges.bot_token
                 WHERE users.user_id = ?1",
                vec![Value::from(user_id)],
                |row| row.get::<_, Option<String>>(0),
            )
            .await?;
        Ok(name.flatten())
    }
}
