//! Typed access to the key-value store
//!
//! [`Repository`] maps the fixed keys in [`super::keys`] to domain types.
//! It does no locking of its own; callers that read-modify-write
//! serialize themselves (see `Tracker`).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::StorageResult;
use super::keys;
use super::kv::KeyValueStore;
use crate::model::{Entry, Profile, Settings, User};

/// Record written when a user claims a badge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeClaim {
    pub milestone: u32,
    pub unlocked_at: DateTime<Utc>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Typed repository over a shared key-value store
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Read and decode a JSON blob
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON blob
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.store.remove(key)
    }

    // ==================== Users ====================

    pub fn users(&self) -> StorageResult<BTreeMap<String, User>> {
        Ok(self.get_json(keys::USERS)?.unwrap_or_default())
    }

    pub fn user(&self, id: &str) -> StorageResult<Option<User>> {
        Ok(self.users()?.remove(id))
    }

    pub fn save_user(&self, user: &User) -> StorageResult<()> {
        let mut users = self.users()?;
        users.insert(user.id.clone(), user.clone());
        self.set_json(keys::USERS, &users)
    }

    pub fn current_user_id(&self) -> StorageResult<Option<String>> {
        self.get_json(keys::CURRENT_USER)
    }

    pub fn set_current_user_id(&self, id: &str) -> StorageResult<()> {
        self.set_json(keys::CURRENT_USER, id)
    }

    // ==================== Entries ====================

    pub fn all_entries(&self) -> StorageResult<Vec<Entry>> {
        Ok(self.get_json(keys::ENTRIES)?.unwrap_or_default())
    }

    pub fn entries_for(&self, user_id: &str) -> StorageResult<Vec<Entry>> {
        Ok(self
            .all_entries()?
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .collect())
    }

    pub fn save_entries(&self, entries: &[Entry]) -> StorageResult<()> {
        self.set_json(keys::ENTRIES, entries)
    }

    pub fn append_entry(&self, entry: &Entry) -> StorageResult<()> {
        let mut entries = self.all_entries()?;
        entries.push(entry.clone());
        self.save_entries(&entries)
    }

    /// Replace one entry by id; returns false if it does not exist
    pub fn replace_entry(&self, entry: &Entry) -> StorageResult<bool> {
        let mut entries = self.all_entries()?;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry.clone();
                self.save_entries(&entries)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Swap out every entry of a user for `replacement`
    pub fn replace_user_entries(&self, user_id: &str, replacement: &[Entry]) -> StorageResult<()> {
        let mut entries: Vec<Entry> = self
            .all_entries()?
            .into_iter()
            .filter(|e| e.user_id != user_id)
            .collect();
        entries.extend(replacement.iter().cloned());
        self.save_entries(&entries)
    }

    // ==================== Settings / Profile ====================

    pub fn settings(&self, user_id: &str) -> StorageResult<Option<Settings>> {
        let mut all: BTreeMap<String, Settings> =
            self.get_json(keys::SETTINGS)?.unwrap_or_default();
        Ok(all.remove(user_id))
    }

    pub fn save_settings(&self, user_id: &str, settings: &Settings) -> StorageResult<()> {
        let mut all: BTreeMap<String, Settings> =
            self.get_json(keys::SETTINGS)?.unwrap_or_default();
        all.insert(user_id.to_string(), settings.clone());
        self.set_json(keys::SETTINGS, &all)
    }

    pub fn profile(&self, user_id: &str) -> StorageResult<Option<Profile>> {
        let mut all: BTreeMap<String, Profile> =
            self.get_json(keys::PROFILE)?.unwrap_or_default();
        Ok(all.remove(user_id))
    }

    pub fn save_profile(&self, user_id: &str, profile: &Profile) -> StorageResult<()> {
        let mut all: BTreeMap<String, Profile> =
            self.get_json(keys::PROFILE)?.unwrap_or_default();
        all.insert(user_id.to_string(), profile.clone());
        self.set_json(keys::PROFILE, &all)
    }

    // ==================== Badge claims ====================

    pub fn badge_claims(&self, user_id: &str) -> StorageResult<Vec<BadgeClaim>> {
        let mut claims = Vec::new();
        for key in self.store.keys_with_prefix(&keys::badge_claim_prefix(user_id))? {
            if keys::badge_claim_milestone(&key, user_id).is_none() {
                continue;
            }
            if let Some(claim) = self.get_json::<BadgeClaim>(&key)? {
                claims.push(claim);
            }
        }
        claims.sort_by_key(|c| c.milestone);
        Ok(claims)
    }

    pub fn badge_claim(&self, user_id: &str, milestone: u32) -> StorageResult<Option<BadgeClaim>> {
        self.get_json(&keys::badge_claim(user_id, milestone))
    }

    pub fn save_badge_claim(&self, user_id: &str, claim: &BadgeClaim) -> StorageResult<()> {
        self.set_json(&keys::badge_claim(user_id, claim.milestone), claim)
    }

    // ==================== Reminders ====================

    pub fn last_reminder(&self, user_id: &str) -> StorageResult<Option<DateTime<Utc>>> {
        self.get_json(&keys::reminder(user_id))
    }

    pub fn set_last_reminder(&self, user_id: &str, at: DateTime<Utc>) -> StorageResult<()> {
        self.set_json(&keys::reminder(user_id), &at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, NewEntry};
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    fn repo() -> Repository {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    fn entry(user_id: &str, title: &str) -> Entry {
        Entry::new(
            user_id,
            NewEntry {
                title: title.to_string(),
                description: "A description long enough".to_string(),
                category: Category::Project,
                date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            },
        )
    }

    #[test]
    fn test_users() {
        let repo = repo();
        let user = User::new("ada", "ada@example.com");
        repo.save_user(&user).unwrap();

        assert_eq!(repo.user(&user.id).unwrap(), Some(user.clone()));
        assert_eq!(repo.users().unwrap().len(), 1);

        repo.set_current_user_id(&user.id).unwrap();
        assert_eq!(repo.current_user_id().unwrap(), Some(user.id));
    }

    #[test]
    fn test_entries_by_user() {
        let repo = repo();
        repo.append_entry(&entry("u1", "one")).unwrap();
        repo.append_entry(&entry("u2", "two")).unwrap();
        repo.append_entry(&entry("u1", "three")).unwrap();

        assert_eq!(repo.entries_for("u1").unwrap().len(), 2);
        assert_eq!(repo.entries_for("u2").unwrap().len(), 1);

        repo.replace_user_entries("u1", &[entry("u1", "only")]).unwrap();
        let u1 = repo.entries_for("u1").unwrap();
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].title, "only");
        assert_eq!(repo.entries_for("u2").unwrap().len(), 1);
    }

    #[test]
    fn test_replace_entry() {
        let repo = repo();
        let mut e = entry("u1", "draft");
        repo.append_entry(&e).unwrap();

        e.title = "final".to_string();
        assert!(repo.replace_entry(&e).unwrap());
        assert_eq!(repo.entries_for("u1").unwrap()[0].title, "final");

        let missing = entry("u1", "missing");
        assert!(!repo.replace_entry(&missing).unwrap());
    }

    #[test]
    fn test_badge_claims_sorted() {
        let repo = repo();
        for milestone in [10, 1, 5] {
            repo.save_badge_claim(
                "u1",
                &BadgeClaim {
                    milestone,
                    unlocked_at: Utc::now(),
                    transaction_id: None,
                },
            )
            .unwrap();
        }

        let milestones: Vec<u32> = repo
            .badge_claims("u1")
            .unwrap()
            .iter()
            .map(|c| c.milestone)
            .collect();
        assert_eq!(milestones, vec![1, 5, 10]);
        assert!(repo.badge_claims("u2").unwrap().is_empty());
    }

    #[test]
    fn test_badge_claims_exclude_ids_sharing_a_prefix() {
        let repo = repo();
        let claim = BadgeClaim {
            milestone: 1,
            unlocked_at: Utc::now(),
            transaction_id: None,
        };
        repo.save_badge_claim("ab_c", &claim).unwrap();
        repo.save_badge_claim("ab_1", &claim).unwrap();

        assert!(repo.badge_claims("ab").unwrap().is_empty());
        assert_eq!(repo.badge_claims("ab_c").unwrap().len(), 1);
    }

    #[test]
    fn test_settings_and_profile_per_user() {
        let repo = repo();
        let settings = Settings {
            weekly_digest: false,
            ..Settings::default()
        };
        repo.save_settings("u1", &settings).unwrap();
        assert_eq!(repo.settings("u1").unwrap(), Some(settings));
        assert_eq!(repo.settings("u2").unwrap(), None);

        let profile = Profile {
            display_name: Some("Ada".to_string()),
            ..Default::default()
        };
        repo.save_profile("u1", &profile).unwrap();
        assert_eq!(repo.profile("u1").unwrap(), Some(profile));
    }
}
