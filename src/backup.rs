//! Backup bundles
//!
//! A backup is one JSON document holding a user and everything they own.
//! `version` and `user` are required when reading one back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Entry, Profile, Settings, User};

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid backup file: {0}")]
    Invalid(String),

    #[error("Backup is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Backup belongs to user {bundle}, not {expected}")]
    UserMismatch { bundle: String, expected: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything needed to rebuild one user's data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupBundle {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub user: User,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

impl BackupBundle {
    pub fn new(
        user: User,
        entries: Vec<Entry>,
        settings: Option<Settings>,
        profile: Option<Profile>,
    ) -> Self {
        Self {
            version: BACKUP_VERSION.to_string(),
            timestamp: Utc::now(),
            user,
            entries,
            settings,
            profile,
        }
    }

    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a bundle, reporting a missing `version` or `user` by name
    pub fn from_json(raw: &str) -> Result<Self, BackupError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| BackupError::Invalid(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| BackupError::Invalid("expected a JSON object".to_string()))?;
        for field in ["version", "user"] {
            if object.get(field).map_or(true, |v| v.is_null()) {
                return Err(BackupError::MissingField(field));
            }
        }

        let bundle: BackupBundle =
            serde_json::from_value(value).map_err(|e| BackupError::Invalid(e.to_string()))?;

        if let Some(stray) = bundle.entries.iter().find(|e| e.user_id != bundle.user.id) {
            return Err(BackupError::UserMismatch {
                bundle: stray.user_id.clone(),
                expected: bundle.user.id.clone(),
            });
        }

        Ok(bundle)
    }
}

/// `devchain-backup-2026-10-16.json`
pub fn backup_filename(date: NaiveDate) -> String {
    format!("devchain-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Entries as CSV with a header row
pub fn entries_to_csv(entries: &[Entry]) -> Result<String, BackupError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "date",
        "category",
        "title",
        "description",
        "transaction_id",
        "created_at",
    ])?;

    for entry in entries {
        let date = entry.date.to_string();
        let created_at = entry.created_at.to_rfc3339();
        writer.write_record([
            entry.id.as_str(),
            date.as_str(),
            entry.category.as_str(),
            entry.title.as_str(),
            entry.description.as_str(),
            entry.transaction_id.as_deref().unwrap_or(""),
            created_at.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BackupError::Invalid(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BackupError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, NewEntry};

    fn bundle() -> BackupBundle {
        let user = User::new("ada", "ada@example.com");
        let entries = vec![Entry::new(
            user.id.clone(),
            NewEntry {
                title: "Lifetimes, finally".to_string(),
                description: "Worked through \"elision\", commas too".to_string(),
                category: Category::Book,
                date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            },
        )];
        BackupBundle::new(user, entries, Some(Settings::default()), None)
    }

    #[test]
    fn test_json_round_trip() {
        let original = bundle();
        let parsed = BackupBundle::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.version, BACKUP_VERSION);
    }

    #[test]
    fn test_required_fields() {
        let mut value = serde_json::to_value(bundle()).unwrap();
        value.as_object_mut().unwrap().remove("version");
        assert!(matches!(
            BackupBundle::from_json(&value.to_string()),
            Err(BackupError::MissingField("version"))
        ));

        let mut value = serde_json::to_value(bundle()).unwrap();
        value["user"] = serde_json::Value::Null;
        assert!(matches!(
            BackupBundle::from_json(&value.to_string()),
            Err(BackupError::MissingField("user"))
        ));

        assert!(matches!(
            BackupBundle::from_json("not json"),
            Err(BackupError::Invalid(_))
        ));
    }

    #[test]
    fn test_foreign_entries_rejected() {
        let mut b = bundle();
        b.entries[0].user_id = "someone-else".to_string();
        assert!(matches!(
            BackupBundle::from_json(&b.to_json().unwrap()),
            Err(BackupError::UserMismatch { .. })
        ));
    }

    #[test]
    fn test_backup_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(backup_filename(date), "devchain-backup-2026-03-09.json");
    }

    #[test]
    fn test_entries_to_csv_quotes() {
        let b = bundle();
        let csv = entries_to_csv(&b.entries).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,date,category"));
        let row = lines.next().unwrap();
        assert!(row.contains("2026-10-01,book"));
        assert!(row.contains("\"Worked through \"\"elision\"\", commas too\""));
    }
}
