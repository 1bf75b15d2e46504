//! Core data types for DevChain
//!
//! This module defines the records the tracker persists and serves:
//! - `User`: a learner and their running counters
//! - `Entry`: one recorded learning milestone
//! - `Badge`: a milestone achievement and its unlock state
//! - `Settings` and `Profile`: per-user preferences
//! - `Category` and `Rarity`: classification enums

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A learner registered with the tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier (UUID v4)
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    /// Number of entries recorded by this user
    #[serde(default)]
    pub total_entries: u32,
    /// Number of badges unlocked by this user
    #[serde(default)]
    pub total_badges: u32,
    /// Consecutive days with at least one entry, ending today or yesterday
    #[serde(default)]
    pub learning_streak: u32,
    /// Time of the most recent entry submission
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user with zeroed counters
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            created_at: Utc::now(),
            total_entries: 0,
            total_badges: 0,
            learning_streak: 0,
            last_activity_at: None,
        }
    }

    /// Last time this user did anything worth counting as activity
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_activity_at.unwrap_or(self.created_at)
    }
}

/// Kind of learning activity an entry records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tutorial,
    Course,
    Project,
    Book,
    Certification,
    Workshop,
    Conference,
    Other,
}

impl Category {
    /// Get all categories for iteration
    pub fn all() -> &'static [Category] {
        &[
            Category::Tutorial,
            Category::Course,
            Category::Project,
            Category::Book,
            Category::Certification,
            Category::Workshop,
            Category::Conference,
            Category::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tutorial => "tutorial",
            Category::Course => "course",
            Category::Project => "project",
            Category::Book => "book",
            Category::Certification => "certification",
            Category::Workshop => "workshop",
            Category::Conference => "conference",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Category::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// A single recorded learning milestone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Calendar day the learning happened
    pub date: NaiveDate,
    /// Ledger transaction that anchored this entry, if any
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Create an entry for a user from already-validated input
    pub fn new(user_id: impl Into<String>, input: NewEntry) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: input.title,
            description: input.description,
            category: input.category,
            date: input.date,
            transaction_id: None,
            created_at: Utc::now(),
        }
    }

    /// Entries anchored by a confirmed ledger transaction can no longer change
    pub fn is_anchored(&self) -> bool {
        self.transaction_id
            .as_deref()
            .map(|id| !crate::ledger::is_local_transaction_id(id))
            .unwrap_or(false)
    }
}

/// User-submitted fields for a new entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEntry {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
}

/// How hard a badge is to earn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Uncommon => write!(f, "uncommon"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::Legendary => write!(f, "legendary"),
        }
    }
}

/// A milestone badge together with one user's unlock state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Number of entries required to unlock
    pub milestone: u32,
    pub icon: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Per-user notification and ledger preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default = "default_true")]
    pub reminders_enabled: bool,
    #[serde(default = "default_true")]
    pub weekly_digest: bool,
    #[serde(default)]
    pub blockchain_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Defaults for a new user; ledger recording follows the server's ledger switch
    pub fn with_ledger(blockchain_enabled: bool) -> Self {
        Self {
            email_notifications: true,
            reminders_enabled: true,
            weekly_digest: true,
            blockchain_enabled,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_ledger(false)
    }
}

/// Public profile details
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Hedera account in `shard.realm.num` form
    #[serde(default)]
    pub hedera_account_id: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}
