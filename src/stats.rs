//! Learning statistics
//!
//! Everything here is derived from a user's entries at call time.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::badges::BadgeProgress;
use crate::model::{Category, Entry};

/// Consecutive days with at least one entry, ending today or yesterday
pub fn learning_streak(entries: &[Entry], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = entries.iter().map(|e| e.date).collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

/// Entry counts per category, with every category present
pub fn category_breakdown(entries: &[Entry]) -> BTreeMap<Category, u32> {
    let mut counts: BTreeMap<Category, u32> =
        Category::all().iter().map(|c| (*c, 0)).collect();
    for entry in entries {
        *counts.entry(entry.category).or_insert(0) += 1;
    }
    counts
}

/// Monday of the ISO week containing `day`
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

/// Entries dated in the ISO week containing `today`
pub fn entries_this_week(entries: &[Entry], today: NaiveDate) -> u32 {
    let start = week_start(today);
    entries
        .iter()
        .filter(|e| e.date >= start && e.date <= today)
        .count() as u32
}

/// Per-user summary returned by the stats endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_entries: u32,
    pub total_badges: u32,
    pub learning_streak: u32,
    pub entries_this_week: u32,
    /// Entries anchored by a confirmed ledger transaction
    pub anchored_entries: u32,
    pub categories: BTreeMap<Category, u32>,
    pub top_category: Option<Category>,
    pub badge_progress: BadgeProgress,
}

impl UserStats {
    pub fn compute(entries: &[Entry], progress: BadgeProgress, today: NaiveDate) -> Self {
        let categories = category_breakdown(entries);
        let top_category = categories
            .iter()
            .filter(|(_, n)| **n > 0)
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(c, _)| *c);

        Self {
            total_entries: entries.len() as u32,
            total_badges: progress.unlocked,
            learning_streak: learning_streak(entries, today),
            entries_this_week: entries_this_week(entries, today),
            anchored_entries: entries.iter().filter(|e| e.is_anchored()).count() as u32,
            categories,
            top_category,
            badge_progress: progress,
        }
    }
}
