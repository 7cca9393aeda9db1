//! Lounge model - one externally operated chat bot tracked by the hub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness status of a lounge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoungeStatus {
    /// Pinged within the liveness window
    Active = 1,
    /// Demoted by the sweep; revived by the next ping
    Inactive = 0,
}

impl LoungeStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            LoungeStatus::Active => "Active",
            LoungeStatus::Inactive => "Inactive",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LoungeStatus::Active)
    }
}

impl std::fmt::Display for LoungeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A lounge as stored by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lounge {
    pub id: i64,
    pub name: String,
    /// Durable external identity, unique per lounge
    pub bot_token: String,
    pub status: LoungeStatus,
    /// Cached count, refreshed by the sweep
    pub active_user_count: u32,
    pub last_updated: DateTime<Utc>,
}

/// Result of a get-or-create lookup on a lounge
#[derive(Debug, Clone, PartialEq)]
pub struct LoungeSighting {
    pub lounge: Lounge,
    /// True when this call inserted the row
    pub created: bool,
}
