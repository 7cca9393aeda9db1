//! Hub user model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which lounge, if any, a user is currently attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    /// Not in any lounge
    Unbound,
    /// Bound to the lounge with this bot token
    Lounge(String),
    /// Exempt from single-lounge binding; survives leaving
    Whitelisted,
}

impl Binding {
    pub fn is_unbound(&self) -> bool {
        matches!(self, Binding::Unbound)
    }

    pub fn is_whitelisted(&self) -> bool {
        matches!(self, Binding::Whitelisted)
    }

    /// Bot token of the bound lounge, if bound to an ordinary lounge
    pub fn lounge_token(&self) -> Option<&str> {
        match self {
            Binding::Lounge(token) => Some(token),
            _ => None,
        }
    }
}

/// A user seen by at least one lounge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubUser {
    /// External chat-platform identity
    pub user_id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub binding: Binding,
    pub last_seen: Option<DateTime<Utc>>,
    pub universal_ban: bool,
}

/// A user reported by a lounge
#[derive(Debug, Clone)]
pub struct UserSighting {
    pub user_id: i64,
    pub full_name: String,
    pub username: Option<String>,
    /// Display name the reporting lounge currently uses
    pub lounge_name: String,
    pub bot_token: String,
}

impl UserSighting {
    pub fn new(
        user_id: i64,
        full_name: impl Into<String>,
        lounge_name: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            full_name: full_name.into(),
            username: None,
            lounge_name: lounge_name.into(),
            bot_token: bot_token.into(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Outcome of recording a user sighting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The user row was written and the lounge pinged
    Recorded {
        /// True when the sighting introduced a new lounge
        lounge_created: bool,
    },
    /// The user is universally banned; nothing was written
    Banned,
}

impl UpsertOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, UpsertOutcome::Recorded { .. })
    }
}
