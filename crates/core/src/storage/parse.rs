//! Database value encoding and parsing
//!
//! Raw column encodings (integer status, `*` whitelist sentinel, timestamp
//! strings) live here and nowhere else.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;

use crate::models::{Binding, LoungeStatus};

/// Stored timestamp layout, always UTC
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Binding value meaning "whitelisted, not bound to any one lounge"
pub const WHITELIST_SENTINEL: &str = "*";

/// Format a timestamp for storage
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp (fractional seconds optional)
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, SqlError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| dt.and_utc())
        .map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an optional stored timestamp
pub fn parse_timestamp_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_timestamp(&s)).transpose()
}

pub fn status_to_sql(status: LoungeStatus) -> i64 {
    status as i64
}

pub fn status_from_sql(value: i64) -> Result<LoungeStatus, SqlError> {
    match value {
        1 => Ok(LoungeStatus::Active),
        0 => Ok(LoungeStatus::Inactive),
        other => Err(SqlError::IntegralValueOutOfRange(0, other)),
    }
}

/// True when `token` can name a real lounge
pub fn is_lounge_token(token: &str) -> bool {
    !token.is_empty() && token != WHITELIST_SENTINEL
}

/// Encode a binding into the nullable `current_active_lounge` column
pub fn binding_to_sql(binding: &Binding) -> Option<String> {
    match binding {
        Binding::Unbound => None,
        Binding::Lounge(token) => Some(token.clone()),
        Binding::Whitelisted => Some(WHITELIST_SENTINEL.to_string()),
    }
}

pub fn binding_from_sql(value: Option<String>) -> Binding {
    match value {
        None => Binding::Unbound,
        Some(s) if s == WHITELIST_SENTINEL => Binding::Whitelisted,
        Some(token) => Binding::Lounge(token),
    }
}
