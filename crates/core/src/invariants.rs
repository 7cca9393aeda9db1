//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Lounge, UserSighting};
use crate::storage::WHITELIST_SENTINEL;

/// Validate a lounge read back from storage
pub fn assert_lounge_invariants(lounge: &Lounge) {
    debug_assert!(
        !lounge.bot_token.is_empty(),
        "Lounge {} has an empty bot token",
        lounge.id
    );

    // The sentinel must never name a real lounge
    debug_assert!(
        lounge.bot_token != WHITELIST_SENTINEL,
        "Lounge {} uses the whitelist sentinel as its token",
        lounge.id
    );
}

/// Validate a sighting before it is written
pub fn assert_sighting_invariants(sighting: &UserSighting) {
    debug_assert!(
        !sighting.bot_token.is_empty() && sighting.bot_token != WHITELIST_SENTINEL,
        "Sighting of user {} carries an unusable bot token",
        sighting.user_id
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoungeStatus;
    use chrono::Utc;

    fn lounge(bot_token: &str) -> Lounge {
        Lounge {
            id: 1,
            name: "Alpha".to_string(),
            bot_token: bot_token.to_string(),
            status: LoungeStatus::Active,
            active_user_count: 0,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_valid_lounge_passes() {
        assert_lounge_invariants(&lounge("T1"));
        assert_sighting_invariants(&UserSighting::new(1, "A", "Alpha", "T1"));
    }

    #[test]
    #[should_panic(expected = "whitelist sentinel")]
    #[cfg(debug_assertions)]
    fn test_sentinel_token_rejected() {
        assert_lounge_invariants(&lounge("*"));
    }

    #[test]
    #[should_panic(expected = "unusable bot token")]
    #[cfg(debug_assertions)]
    fn test_empty_sighting_token_rejected() {
        assert_sighting_invariants(&UserSighting::new(1, "A", "Alpha", ""));
    }
}
