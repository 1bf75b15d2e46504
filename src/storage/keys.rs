//! Fixed storage keys
//!
//! Every blob the tracker persists lives under one of these keys.

/// Id of the signed-in user
pub const CURRENT_USER: &str = "devchain_user";
/// Map of user id → user
pub const USERS: &str = "devchain_users";
/// All entries, every user
pub const ENTRIES: &str = "devchain_entries";
/// Map of user id → settings
pub const SETTINGS: &str = "devchain_settings";
/// Map of user id → profile
pub const PROFILE: &str = "devchain_profile";
/// Scheduler cursor
pub const SCHEDULER: &str = "devchain_scheduler";

const BADGE_PREFIX: &str = "badge_";
const REMINDER_PREFIX: &str = "reminder_";

/// Claim record for one badge of one user
pub fn badge_claim(user_id: &str, milestone: u32) -> String {
    format!("{}{}_{}", BADGE_PREFIX, user_id, milestone)
}

/// Prefix covering every badge claim of a user. Ids that extend `user_id`
/// with `_` share it, so use [`badge_claim_milestone`] to filter.
pub fn badge_claim_prefix(user_id: &str) -> String {
    format!("{}{}_", BADGE_PREFIX, user_id)
}

/// Milestone of a claim key, when the key belongs to `user_id` exactly
pub fn badge_claim_milestone(key: &str, user_id: &str) -> Option<u32> {
    let rest = key.strip_prefix(&badge_claim_prefix(user_id))?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Last reminder sent to a user
pub fn reminder(user_id: &str) -> String {
    format!("{}{}", REMINDER_PREFIX, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(badge_claim("u1", 10), "badge_u1_10");
        assert!(badge_claim("u1", 10).starts_with(&badge_claim_prefix("u1")));
        assert_eq!(reminder("u1"), "reminder_u1");
    }

    #[test]
    fn test_claim_milestone_ignores_longer_ids() {
        assert_eq!(badge_claim_milestone(&badge_claim("ab", 5), "ab"), Some(5));
        assert_eq!(badge_claim_milestone(&badge_claim("ab_c", 1), "ab"), None);
        assert_eq!(badge_claim_milestone(&badge_claim("ab_1", 5), "ab"), None);
        assert_eq!(badge_claim_milestone("badge_ab_", "ab"), None);
        assert_eq!(badge_claim_milestone("badge_ab_+5", "ab"), None);
    }
}
