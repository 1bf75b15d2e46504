//! Milestone badges
//!
//! The catalog is fixed; a user's unlock state comes from their stored
//! claims. Eligibility is recomputed from the current entry count on every
//! call, never tracked incrementally.

use serde::Serialize;

use crate::model::{Badge, Rarity};
use crate::storage::BadgeClaim;

fn badge(milestone: u32, name: &str, description: &str, icon: &str, rarity: Rarity) -> Badge {
    Badge {
        id: format!("milestone-{}", milestone),
        name: name.to_string(),
        description: description.to_string(),
        milestone,
        icon: icon.to_string(),
        rarity,
        unlocked: false,
        unlocked_at: None,
        transaction_id: None,
    }
}

/// Every badge, ordered by milestone
pub fn catalog() -> Vec<Badge> {
    vec![
        badge(1, "First Steps", "Recorded your first learning entry", "🌱", Rarity::Common),
        badge(5, "Getting Started", "Recorded 5 learning entries", "📚", Rarity::Common),
        badge(10, "Dedicated Learner", "Recorded 10 learning entries", "🎯", Rarity::Uncommon),
        badge(25, "Knowledge Seeker", "Recorded 25 learning entries", "🧠", Rarity::Rare),
        badge(50, "Master Builder", "Recorded 50 learning entries", "🏗️", Rarity::Rare),
        badge(100, "DevChain Legend", "Recorded 100 learning entries", "🏆", Rarity::Legendary),
    ]
}

/// Catalog entry for a milestone
pub fn find(milestone: u32) -> Option<Badge> {
    catalog().into_iter().find(|b| b.milestone == milestone)
}

/// The catalog with a user's claims applied
pub fn with_claims(claims: &[BadgeClaim]) -> Vec<Badge> {
    catalog()
        .into_iter()
        .map(|mut badge| {
            if let Some(claim) = claims.iter().find(|c| c.milestone == badge.milestone) {
                badge.unlocked = true;
                badge.unlocked_at = Some(claim.unlocked_at);
                badge.transaction_id = claim.transaction_id.clone();
            }
            badge
        })
        .collect()
}

/// Badges reached by `entry_count` but not yet unlocked
pub fn check_eligibility(badges: &[Badge], entry_count: u32) -> Vec<&Badge> {
    badges
        .iter()
        .filter(|b| b.milestone <= entry_count && !b.unlocked)
        .collect()
}

/// Where a user stands relative to the next badge
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeProgress {
    pub entry_count: u32,
    pub unlocked: u32,
    pub total: u32,
    /// Next badge not yet reached by entry count
    pub next_badge: Option<Badge>,
    pub entries_remaining: u32,
    /// Progress from the previous milestone to the next, 0-100
    pub percent: u8,
    pub message: String,
}

pub fn progress(badges: &[Badge], entry_count: u32) -> BadgeProgress {
    let unlocked = badges.iter().filter(|b| b.unlocked).count() as u32;
    let next = badges
        .iter()
        .filter(|b| b.milestone > entry_count)
        .min_by_key(|b| b.milestone)
        .cloned();
    let previous = badges
        .iter()
        .filter(|b| b.milestone <= entry_count)
        .map(|b| b.milestone)
        .max()
        .unwrap_or(0);

    let (entries_remaining, percent) = match &next {
        Some(next) => {
            let span = next.milestone - previous;
            let done = entry_count - previous;
            (
                next.milestone - entry_count,
                ((done as f64 / span as f64) * 100.0).floor() as u8,
            )
        }
        None => (0, 100),
    };

    let pending = check_eligibility(badges, entry_count).len();

    BadgeProgress {
        entry_count,
        unlocked,
        total: badges.len() as u32,
        message: coaching_message(entry_count, next.as_ref(), entries_remaining, pending),
        next_badge: next,
        entries_remaining,
        percent,
    }
}

fn coaching_message(
    entry_count: u32,
    next: Option<&Badge>,
    remaining: u32,
    pending: usize,
) -> String {
    if pending > 0 {
        return format!(
            "You have {} badge{} ready to claim!",
            pending,
            if pending == 1 { "" } else { "s" }
        );
    }

    match next {
        None => "Every badge unlocked. Legendary work!".to_string(),
        Some(badge) if entry_count == 0 => format!(
            "Log your first entry to unlock {} {}",
            badge.icon, badge.name
        ),
        Some(badge) if remaining == 1 => format!(
            "Just 1 more entry to unlock {} {}!",
            badge.icon, badge.name
        ),
        Some(badge) => format!(
            "{} more entries to unlock {} {}",
            remaining, badge.icon, badge.name
        ),
    }
}
