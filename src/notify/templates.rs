//! Email bodies
//!
//! Plain-text messages for each notification the tracker sends.

use super::EmailMessage;
use crate::format::{explorer_url, format_streak};
use crate::model::{Badge, User};

pub fn welcome(user: &User) -> EmailMessage {
    EmailMessage {
        to_email: user.email.clone(),
        to_name: Some(user.username.clone()),
        subject: "Welcome to DevChain".to_string(),
        message: format!(
            "Hi {},\n\n\
             Your DevChain account is ready. Log what you learn and every \
             milestone you reach becomes a badge.\n\n\
             Your first badge unlocks with your first entry.\n",
            user.username
        ),
    }
}

pub fn badge_unlocked(user: &User, badge: &Badge, network: &str) -> EmailMessage {
    let proof = badge
        .transaction_id
        .as_deref()
        .and_then(|tx| explorer_url(network, tx))
        .map(|url| format!("\nVerify it on the ledger: {}\n", url))
        .unwrap_or_default();

    EmailMessage {
        to_email: user.email.clone(),
        to_name: Some(user.username.clone()),
        subject: format!("{} You unlocked {}", badge.icon, badge.name),
        message: format!(
            "Hi {},\n\n\
             You reached {} learning entries and unlocked the {} badge \"{}\".\n\
             {}\n{}",
            user.username, badge.milestone, badge.rarity, badge.name, badge.description, proof
        ),
    }
}

pub fn reminder(user: &User, days_inactive: i64) -> EmailMessage {
    EmailMessage {
        to_email: user.email.clone(),
        to_name: Some(user.username.clone()),
        subject: "Keep your learning streak going".to_string(),
        message: format!(
            "Hi {},\n\n\
             It has been {} days since your last DevChain entry. \
             Even a short tutorial counts, so log something today.\n\n\
             Entries so far: {}\n",
            user.username, days_inactive, user.total_entries
        ),
    }
}

/// Figures for one weekly digest
#[derive(Debug, Clone, PartialEq)]
pub struct DigestSummary {
    pub entries_this_week: u32,
    pub total_entries: u32,
    pub streak: u32,
    pub badges_unlocked: u32,
    pub coaching: String,
}

pub fn weekly_digest(user: &User, summary: &DigestSummary) -> EmailMessage {
    EmailMessage {
        to_email: user.email.clone(),
        to_name: Some(user.username.clone()),
        subject: "Your weekly DevChain digest".to_string(),
        message: format!(
            "Hi {},\n\n\
             This week: {} entries\n\
             Total entries: {}\n\
             Current streak: {}\n\
             Badges unlocked: {}\n\n\
             {}\n",
            user.username,
            summary.entries_this_week,
            summary.total_entries,
            format_streak(summary.streak),
            summary.badges_unlocked,
            summary.coaching
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badges::catalog;

    #[test]
    fn test_badge_unlocked_links_confirmed_tx() {
        let user = User::new("ada", "ada@example.com");
        let mut badge = catalog()[0].clone();
        badge.transaction_id = Some("0.0.1@1.1".to_string());

        let email = badge_unlocked(&user, &badge, "testnet");
        assert_eq!(email.to_email, "ada@example.com");
        assert!(email.subject.contains("First Steps"));
        assert!(email.message.contains("hashscan.io/testnet"));

        badge.transaction_id = Some("local_1".to_string());
        let email = badge_unlocked(&user, &badge, "testnet");
        assert!(!email.message.contains("hashscan"));
    }

    #[test]
    fn test_digest_body() {
        let user = User::new("ada", "ada@example.com");
        let summary = DigestSummary {
            entries_this_week: 3,
            total_entries: 12,
            streak: 1,
            badges_unlocked: 3,
            coaching: "13 more entries to Knowledge Seeker".to_string(),
        };
        let email = weekly_digest(&user, &summary);
        assert!(email.message.contains("This week: 3 entries"));
        assert!(email.message.contains("Current streak: 1 day"));
    }

    #[test]
    fn test_reminder_mentions_gap() {
        let user = User::new("ada", "ada@example.com");
        assert!(reminder(&user, 4).message.contains("4 days"));
    }
}
