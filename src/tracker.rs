//! Tracker service
//!
//! The operations behind the HTTP API. A [`Tracker`] is built from its
//! collaborators (store, ledger, notifier, optional cloud mirror, event hub)
//! and owns no global state.
//!
//! Every read-modify-write of stored blobs happens under one async mutex.
//! Ledger, email and cloud calls that do not need to be atomic with a write
//! happen outside it.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::backup::{BackupBundle, BackupError};
use crate::badges::{self, BadgeProgress};
use crate::cloud::CloudMirror;
use crate::events::{EventHub, TrackerEvent};
use crate::ledger::{
    entry_memo, BadgeMetadata, LedgerError, LedgerOutcome, LedgerService, LedgerStatus,
    TransactionStatus,
};
use crate::model::{Badge, Category, Entry, NewEntry, Profile, Settings, User};
use crate::notify::{templates, EmailMessage, Notifier};
use crate::stats::{self, UserStats};
use crate::storage::{keys, BadgeClaim, KeyValueStore, Repository, StorageError};
use crate::validation::{self, sanitize_input, ValidationErrors};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Entry {0} is anchored on the ledger and cannot be changed")]
    Immutable(String),

    #[error("Badge {milestone} needs {milestone} entries, user has {entry_count}")]
    NotEligible { milestone: u32, entry_count: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

impl From<ValidationErrors> for TrackerError {
    fn from(errors: ValidationErrors) -> Self {
        TrackerError::Validation(errors)
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Result of submitting an entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySubmission {
    pub entry: Entry,
    /// Ledger outcome when the user records on the ledger
    pub ledger: Option<LedgerOutcome>,
    /// Badges unlocked by this entry
    pub unlocked: Vec<Badge>,
    pub user: User,
}

/// Result of restoring a backup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub user_id: String,
    pub entries: usize,
    pub settings_restored: bool,
    pub profile_restored: bool,
}

pub struct Tracker {
    repo: Repository,
    ledger: Arc<LedgerService>,
    notifier: Arc<dyn Notifier>,
    cloud: Option<Arc<CloudMirror>>,
    events: Arc<EventHub>,
    write_lock: Mutex<()>,
    /// Claim keys whose mint is in flight outside the write lock
    minting: std::sync::Mutex<HashSet<String>>,
}

/// Badges reserved for minting; releases the reservation when dropped
struct MintReservation<'a> {
    tracker: &'a Tracker,
    user_id: String,
    badges: Vec<Badge>,
}

impl Drop for MintReservation<'_> {
    fn drop(&mut self) {
        let mut minting = self.tracker.minting.lock().unwrap_or_else(|e| e.into_inner());
        for badge in &self.badges {
            minting.remove(&keys::badge_claim(&self.user_id, badge.milestone));
        }
    }
}

impl Tracker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ledger: Arc<LedgerService>,
        notifier: Arc<dyn Notifier>,
        cloud: Option<Arc<CloudMirror>>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            repo: Repository::new(store),
            ledger,
            notifier,
            cloud,
            events,
            write_lock: Mutex::new(()),
            minting: std::sync::Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn ledger_status(&self) -> LedgerStatus {
        self.ledger.status()
    }

    // ==================== Users ====================

    pub async fn register_user(&self, username: &str, email: &str) -> TrackerResult<User> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        validation::validate_registration(username, &email)?;

        let user = {
            let _guard = self.write_lock.lock().await;

            let users = self.repo.users()?;
            if users.values().any(|u| u.email.eq_ignore_ascii_case(&email)) {
                return Err(TrackerError::Conflict(format!(
                    "Email {} is already registered",
                    email
                )));
            }
            if users
                .values()
                .any(|u| u.username.eq_ignore_ascii_case(username))
            {
                return Err(TrackerError::Conflict(format!(
                    "Username {} is taken",
                    username
                )));
            }

            let user = User::new(username, email);
            self.repo.save_user(&user)?;
            self.repo
                .save_settings(&user.id, &Settings::with_ledger(self.ledger.is_enabled()))?;
            self.repo.set_current_user_id(&user.id)?;
            user
        };

        tracing::info!(user_id = %user.id, username = %user.username, "Registered user");

        self.mirror_user(&user).await;
        let settings = self.settings(&user.id)?;
        self.notify(&settings, templates::welcome(&user)).await;

        Ok(user)
    }

    /// Make the user with `email` the active session user
    pub async fn sign_in(&self, email: &str) -> TrackerResult<User> {
        let email = email.trim().to_lowercase();

        let local = self
            .repo
            .users()?
            .into_values()
            .find(|u| u.email.eq_ignore_ascii_case(&email));

        let user = match local {
            Some(user) => user,
            None => self
                .restore_from_cloud(&email)
                .await
                .ok_or_else(|| TrackerError::NotFound(format!("No user with email {}", email)))?,
        };

        self.repo.set_current_user_id(&user.id)?;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    pub fn sign_out(&self) -> TrackerResult<()> {
        self.repo.remove(keys::CURRENT_USER)?;
        Ok(())
    }

    pub fn current_user(&self) -> TrackerResult<Option<User>> {
        match self.repo.current_user_id()? {
            Some(id) => Ok(self.repo.user(&id)?),
            None => Ok(None),
        }
    }

    pub fn user(&self, user_id: &str) -> TrackerResult<User> {
        self.repo
            .user(user_id)?
            .ok_or_else(|| TrackerError::NotFound(format!("User {}", user_id)))
    }

    pub fn users(&self) -> TrackerResult<Vec<User>> {
        Ok(self.repo.users()?.into_values().collect())
    }

    // ==================== Entries ====================

    pub async fn submit_entry(&self, user_id: &str, input: NewEntry) -> TrackerResult<EntrySubmission> {
        let input = sanitize_entry(input);
        let today = Utc::now().date_naive();
        validation::validate_entry(&input, today)?;

        self.user(user_id)?;
        let settings = self.settings(user_id)?;

        let mut entry = Entry::new(user_id, input);

        let ledger = if settings.blockchain_enabled {
            let outcome = self.ledger.record_entry(&entry_memo(&entry)).await?;
            entry.transaction_id = Some(outcome.transaction_id().to_string());
            self.report_degraded(user_id, "record_entry", &outcome);
            Some(outcome)
        } else {
            None
        };

        let (user, reservation) = {
            let _guard = self.write_lock.lock().await;

            self.repo.append_entry(&entry)?;
            let entries = self.repo.entries_for(user_id)?;

            let mut user = self.user(user_id)?;
            refresh_counters(&mut user, &entries);
            user.last_activity_at = Some(Utc::now());
            self.repo.save_user(&user)?;

            let badges = badges::with_claims(&self.repo.badge_claims(user_id)?);
            let eligible = badges::check_eligibility(&badges, user.total_entries)
                .into_iter()
                .cloned()
                .collect();
            (user, self.reserve_badges(user_id, eligible))
        };

        let mut minted = Vec::new();
        for badge in &reservation.badges {
            match self.mint(&user, badge, &settings).await {
                Ok(outcome) => minted.push((badge.clone(), outcome)),
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Badge unlock failed, it stays claimable")
                }
            }
        }

        let (user, unlocked) = if minted.is_empty() {
            (user, Vec::new())
        } else {
            self.commit_badges(user_id, minted).await?
        };
        drop(reservation);

        tracing::info!(
            user_id,
            entry_id = %entry.id,
            category = %entry.category,
            badges = unlocked.len(),
            "Entry recorded"
        );

        self.events.publish(TrackerEvent::EntryRecorded {
            user_id: user_id.to_string(),
            entry_id: entry.id.clone(),
            title: entry.title.clone(),
            ledger: ledger.clone(),
        });

        for badge in &unlocked {
            self.notify(
                &settings,
                templates::badge_unlocked(&user, badge, &self.ledger.settings().network),
            )
            .await;
        }

        self.mirror_user(&user).await;
        self.mirror_entry(&entry).await;

        Ok(EntrySubmission {
            entry,
            ledger,
            unlocked,
            user,
        })
    }

    /// Edit an entry that has not been anchored on the ledger
    pub async fn update_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        input: NewEntry,
    ) -> TrackerResult<Entry> {
        let input = sanitize_entry(input);
        validation::validate_entry(&input, Utc::now().date_naive())?;

        let entry = {
            let _guard = self.write_lock.lock().await;

            let mut entry = self.owned_entry(user_id, entry_id)?;
            if entry.is_anchored() {
                return Err(TrackerError::Immutable(entry_id.to_string()));
            }

            entry.title = input.title;
            entry.description = input.description;
            entry.category = input.category;
            entry.date = input.date;
            self.repo.replace_entry(&entry)?;

            let mut user = self.user(user_id)?;
            refresh_counters(&mut user, &self.repo.entries_for(user_id)?);
            self.repo.save_user(&user)?;
            entry
        };

        tracing::info!(user_id, entry_id, "Entry updated");
        self.mirror_entry(&entry).await;
        Ok(entry)
    }

    /// Delete an entry that has not been anchored on the ledger.
    /// Badges already unlocked stay unlocked.
    pub async fn delete_entry(&self, user_id: &str, entry_id: &str) -> TrackerResult<()> {
        let user = {
            let _guard = self.write_lock.lock().await;

            let entry = self.owned_entry(user_id, entry_id)?;
            if entry.is_anchored() {
                return Err(TrackerError::Immutable(entry_id.to_string()));
            }

            let remaining: Vec<Entry> = self
                .repo
                .entries_for(user_id)?
                .into_iter()
                .filter(|e| e.id != entry_id)
                .collect();
            self.repo.replace_user_entries(user_id, &remaining)?;

            let mut user = self.user(user_id)?;
            refresh_counters(&mut user, &remaining);
            self.repo.save_user(&user)?;
            user
        };

        tracing::info!(user_id, entry_id, "Entry deleted");
        self.mirror_user(&user).await;
        Ok(())
    }

    /// A user's entries, newest first
    pub fn entries(&self, user_id: &str, category: Option<Category>) -> TrackerResult<Vec<Entry>> {
        self.user(user_id)?;
        let mut entries: Vec<Entry> = self
            .repo
            .entries_for(user_id)?
            .into_iter()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .collect();
        entries.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(entries)
    }

    fn owned_entry(&self, user_id: &str, entry_id: &str) -> TrackerResult<Entry> {
        self.repo
            .entries_for(user_id)?
            .into_iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| TrackerError::NotFound(format!("Entry {}", entry_id)))
    }

    // ==================== Badges ====================

    pub fn badges(&self, user_id: &str) -> TrackerResult<Vec<Badge>> {
        self.user(user_id)?;
        Ok(badges::with_claims(&self.repo.badge_claims(user_id)?))
    }

    /// Badges the user has reached but not yet claimed
    pub fn eligible_badges(&self, user_id: &str) -> TrackerResult<Vec<Badge>> {
        let badges = self.badges(user_id)?;
        let count = self.repo.entries_for(user_id)?.len() as u32;
        Ok(badges::check_eligibility(&badges, count)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn badge_progress(&self, user_id: &str) -> TrackerResult<BadgeProgress> {
        let badges = self.badges(user_id)?;
        let count = self.repo.entries_for(user_id)?.len() as u32;
        Ok(badges::progress(&badges, count))
    }

    pub async fn claim_badge(&self, user_id: &str, milestone: u32) -> TrackerResult<Badge> {
        let settings = self.settings(user_id)?;

        let (user, reservation) = {
            let _guard = self.write_lock.lock().await;

            let mut user = self.user(user_id)?;
            let badge = badges::with_claims(&self.repo.badge_claims(user_id)?)
                .into_iter()
                .find(|b| b.milestone == milestone)
                .ok_or_else(|| TrackerError::NotFound(format!("Badge for milestone {}", milestone)))?;

            if badge.unlocked {
                return Err(TrackerError::Conflict(format!(
                    "Badge {} is already unlocked",
                    badge.name
                )));
            }

            let entry_count = self.repo.entries_for(user_id)?.len() as u32;
            if entry_count < milestone {
                return Err(TrackerError::NotEligible {
                    milestone,
                    entry_count,
                });
            }
            user.total_entries = entry_count;

            let name = badge.name.clone();
            let reservation = self.reserve_badges(user_id, vec![badge]);
            if reservation.badges.is_empty() {
                return Err(TrackerError::Conflict(format!(
                    "Badge {} is already being unlocked",
                    name
                )));
            }
            (user, reservation)
        };

        let badge = reservation.badges[0].clone();
        let outcome = self.mint(&user, &badge, &settings).await?;
        let (user, mut unlocked) = self.commit_badges(user_id, vec![(badge, outcome)]).await?;
        drop(reservation);

        let badge = unlocked.pop().ok_or_else(|| {
            TrackerError::Conflict(format!("Badge for milestone {} is already unlocked", milestone))
        })?;

        self.notify(
            &settings,
            templates::badge_unlocked(&user, &badge, &self.ledger.settings().network),
        )
        .await;
        self.mirror_user(&user).await;
        Ok(badge)
    }

    /// Reserve the badges nobody else is minting. Caller holds the write lock.
    fn reserve_badges(&self, user_id: &str, candidates: Vec<Badge>) -> MintReservation<'_> {
        let mut minting = self.minting.lock().unwrap_or_else(|e| e.into_inner());
        let badges = candidates
            .into_iter()
            .filter(|b| minting.insert(keys::badge_claim(user_id, b.milestone)))
            .collect();
        MintReservation {
            tracker: self,
            user_id: user_id.to_string(),
            badges,
        }
    }

    /// Mint a badge NFT when the user records on the ledger. Runs without the write lock.
    async fn mint(
        &self,
        user: &User,
        badge: &Badge,
        settings: &Settings,
    ) -> TrackerResult<Option<LedgerOutcome>> {
        if !settings.blockchain_enabled {
            return Ok(None);
        }
        let metadata = BadgeMetadata {
            user_id: user.id.clone(),
            name: badge.name.clone(),
            rarity: badge.rarity.to_string(),
            milestone: badge.milestone,
            entry_count: user.total_entries,
        };
        let outcome = self.ledger.mint_badge(badge.milestone, &metadata).await?;
        self.report_degraded(&user.id, "mint_badge", &outcome);
        Ok(Some(outcome))
    }

    /// Persist claims for minted badges and refresh the user's badge count.
    /// Badges claimed in the meantime are skipped.
    async fn commit_badges(
        &self,
        user_id: &str,
        minted: Vec<(Badge, Option<LedgerOutcome>)>,
    ) -> TrackerResult<(User, Vec<Badge>)> {
        let _guard = self.write_lock.lock().await;
        let mut user = self.user(user_id)?;

        let mut unlocked = Vec::new();
        for (mut badge, outcome) in minted {
            if self.repo.badge_claim(user_id, badge.milestone)?.is_some() {
                tracing::warn!(user_id, milestone = badge.milestone, "Badge already claimed, skipping");
                continue;
            }

            let claim = BadgeClaim {
                milestone: badge.milestone,
                unlocked_at: Utc::now(),
                transaction_id: outcome.as_ref().map(|o| o.transaction_id().to_string()),
            };
            self.repo.save_badge_claim(user_id, &claim)?;

            badge.unlocked = true;
            badge.unlocked_at = Some(claim.unlocked_at);
            badge.transaction_id = claim.transaction_id.clone();

            tracing::info!(
                user_id,
                milestone = badge.milestone,
                badge = %badge.name,
                "Badge unlocked"
            );

            self.events.publish(TrackerEvent::BadgeUnlocked {
                user_id: user_id.to_string(),
                milestone: badge.milestone,
                name: badge.name.clone(),
                icon: badge.icon.clone(),
                transaction_id: claim.transaction_id.unwrap_or_default(),
                confirmed: outcome.as_ref().map_or(false, |o| o.is_confirmed()),
            });
            unlocked.push(badge);
        }

        user.total_badges = self.repo.badge_claims(user_id)?.len() as u32;
        self.repo.save_user(&user)?;
        Ok((user, unlocked))
    }

    // ==================== Stats ====================

    pub fn stats(&self, user_id: &str) -> TrackerResult<UserStats> {
        let badges = self.badges(user_id)?;
        let entries = self.repo.entries_for(user_id)?;
        let progress = badges::progress(&badges, entries.len() as u32);
        Ok(UserStats::compute(&entries, progress, Utc::now().date_naive()))
    }

    // ==================== Settings / Profile ====================

    pub fn settings(&self, user_id: &str) -> TrackerResult<Settings> {
        Ok(self
            .repo
            .settings(user_id)?
            .unwrap_or_else(|| Settings::with_ledger(self.ledger.is_enabled())))
    }

    pub async fn update_settings(&self, user_id: &str, settings: Settings) -> TrackerResult<Settings> {
        let _guard = self.write_lock.lock().await;
        self.user(user_id)?;

        if settings.blockchain_enabled && !self.ledger.is_enabled() {
            tracing::warn!(user_id, "Ledger recording requested but the ledger is disabled");
        }

        self.repo.save_settings(user_id, &settings)?;
        Ok(settings)
    }

    pub fn profile(&self, user_id: &str) -> TrackerResult<Profile> {
        self.user(user_id)?;
        Ok(self.repo.profile(user_id)?.unwrap_or_default())
    }

    pub async fn update_profile(&self, user_id: &str, profile: Profile) -> TrackerResult<Profile> {
        let profile = Profile {
            display_name: clean_optional(profile.display_name),
            bio: clean_optional(profile.bio),
            hedera_account_id: profile
                .hedera_account_id
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            website: profile
                .website
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        };
        validation::validate_profile(&profile)?;

        let _guard = self.write_lock.lock().await;
        self.user(user_id)?;
        self.repo.save_profile(user_id, &profile)?;
        Ok(profile)
    }

    // ==================== Backup ====================

    pub fn create_backup(&self, user_id: &str) -> TrackerResult<BackupBundle> {
        let user = self.user(user_id)?;
        let entries = self.repo.entries_for(user_id)?;
        Ok(BackupBundle::new(
            user,
            entries,
            self.repo.settings(user_id)?,
            self.repo.profile(user_id)?,
        ))
    }

    /// Replace the bundle user's entries, settings and profile with the bundle's.
    /// Entries already anchored on the ledger are kept even when the bundle lacks them.
    pub async fn restore_backup(&self, bundle: BackupBundle) -> TrackerResult<RestoreSummary> {
        check_bundle(&bundle)?;

        let (summary, kept) = {
            let _guard = self.write_lock.lock().await;

            let mut user = bundle.user;
            let users = self.repo.users()?;
            if let Some(other) = users.values().find(|u| {
                u.id != user.id
                    && (u.email.eq_ignore_ascii_case(&user.email)
                        || u.username.eq_ignore_ascii_case(&user.username))
            }) {
                return Err(TrackerError::Conflict(format!(
                    "Backup user {} clashes with existing user {}",
                    user.username, other.id
                )));
            }

            let all = self.repo.all_entries()?;
            if let Some(taken) = bundle
                .entries
                .iter()
                .find(|e| all.iter().any(|o| o.id == e.id && o.user_id != user.id))
            {
                return Err(TrackerError::Conflict(format!(
                    "Entry {} belongs to another user",
                    taken.id
                )));
            }

            let mut entries = bundle.entries;
            let anchored: Vec<Entry> = all
                .into_iter()
                .filter(|e| e.user_id == user.id && e.is_anchored())
                .filter(|e| !entries.iter().any(|b| b.id == e.id))
                .collect();
            let kept = anchored.len();
            entries.extend(anchored);

            // Entries first, so the user's counters never describe entries that are not stored
            self.repo.replace_user_entries(&user.id, &entries)?;

            refresh_counters(&mut user, &entries);
            user.total_badges = self.repo.badge_claims(&user.id)?.len() as u32;
            self.repo.save_user(&user)?;

            if let Some(settings) = &bundle.settings {
                self.repo.save_settings(&user.id, settings)?;
            }
            if let Some(profile) = &bundle.profile {
                self.repo.save_profile(&user.id, profile)?;
            }

            let summary = RestoreSummary {
                user_id: user.id,
                entries: entries.len(),
                settings_restored: bundle.settings.is_some(),
                profile_restored: bundle.profile.is_some(),
            };
            (summary, kept)
        };

        tracing::info!(
            user_id = %summary.user_id,
            entries = summary.entries,
            anchored_kept = kept,
            version = %bundle.version,
            "Backup restored"
        );
        Ok(summary)
    }

    // ==================== Ledger ====================

    pub async fn verify_transaction(&self, transaction_id: &str) -> TrackerResult<TransactionStatus> {
        Ok(self.ledger.verify(transaction_id).await?)
    }

    // ==================== Side effects ====================

    fn report_degraded(&self, user_id: &str, operation: &str, outcome: &LedgerOutcome) {
        if let LedgerOutcome::LocalOnly { reason, .. } = outcome {
            self.events.publish(TrackerEvent::LedgerDegraded {
                user_id: user_id.to_string(),
                operation: operation.to_string(),
                reason: reason.clone(),
            });
        }
    }

    async fn notify(&self, settings: &Settings, message: EmailMessage) {
        if !settings.email_notifications {
            return;
        }
        if let Err(e) = self.notifier.send(&message).await {
            tracing::warn!(
                backend = self.notifier.name(),
                subject = %message.subject,
                error = %e,
                "Email notification failed"
            );
        }
    }

    async fn mirror_user(&self, user: &User) {
        if let Some(cloud) = &self.cloud {
            if let Err(e) = cloud.sync_user(user).await {
                tracing::warn!(user_id = %user.id, error = %e, "Cloud mirror failed");
            }
        }
    }

    async fn mirror_entry(&self, entry: &Entry) {
        if let Some(cloud) = &self.cloud {
            if let Err(e) = cloud.sync_entry(entry).await {
                tracing::warn!(entry_id = %entry.id, error = %e, "Cloud mirror failed");
            }
        }
    }

    async fn restore_from_cloud(&self, email: &str) -> Option<User> {
        let cloud = self.cloud.as_ref()?;
        match cloud.find_user_by_email(email).await {
            Ok(Some(user)) => {
                let _guard = self.write_lock.lock().await;
                if let Err(e) = self.repo.save_user(&user) {
                    tracing::warn!(user_id = %user.id, error = %e, "Could not cache cloud user");
                    return None;
                }
                tracing::info!(user_id = %user.id, "Restored user from cloud mirror");
                Some(user)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Cloud lookup failed");
                None
            }
        }
    }
}

fn sanitize_entry(input: NewEntry) -> NewEntry {
    NewEntry {
        title: sanitize_input(&input.title),
        description: sanitize_input(&input.description),
        ..input
    }
}

/// Field checks on a bundle before anything is written
fn check_bundle(bundle: &BackupBundle) -> TrackerResult<()> {
    let user = &bundle.user;
    let mut errors = ValidationErrors::new();
    errors.check("user.id", validation::validate_user_id(&user.id));
    errors.check("user.username", validation::validate_username(&user.username));
    errors.check("user.email", validation::validate_email(&user.email));

    for (i, entry) in bundle.entries.iter().enumerate() {
        if entry.user_id != user.id {
            errors.check(
                &format!("entries[{}].userId", i),
                Some(format!("Entry belongs to user {}", entry.user_id)),
            );
        }
        errors.check(&format!("entries[{}].title", i), validation::validate_title(&entry.title));
        errors.check(
            &format!("entries[{}].description", i),
            validation::validate_description(&entry.description),
        );
    }

    let mut seen = HashSet::new();
    if let Some(dup) = bundle.entries.iter().find(|e| !seen.insert(e.id.as_str())) {
        errors.check("entries", Some(format!("Entry id {} appears twice", dup.id)));
    }

    errors.into_result().map_err(TrackerError::from)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|s| sanitize_input(&s)).filter(|s| !s.is_empty())
}

fn refresh_counters(user: &mut User, entries: &[Entry]) {
    user.total_entries = entries.len() as u32;
    user.learning_streak = stats::learning_streak(entries, Utc::now().date_naive());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        AccountBalance, ContractCall, ContractDeployment, LedgerBackend, LedgerReceipt,
        LedgerSettings,
    };
    use crate::notify::{Delivery, LogOnly, NotifyError};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Notify;

    struct RecordingNotifier {
        sent: std::sync::Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, message: &EmailMessage) -> Result<Delivery, NotifyError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(Delivery {
                backend: "recording",
                id: None,
            })
        }
    }

    /// Confirms every write with an increasing transaction id
    struct OnlineLedger {
        next: AtomicU64,
    }

    impl OnlineLedger {
        fn receipt(&self) -> LedgerReceipt {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            LedgerReceipt {
                transaction_id: format!("0.0.1001@1700000000.{:09}", n),
                status: "SUCCESS".to_string(),
            }
        }
    }

    #[async_trait]
    impl LedgerBackend for OnlineLedger {
        async fn submit_message(&self, _: &str, _: &str) -> Result<LedgerReceipt, LedgerError> {
            Ok(self.receipt())
        }

        async fn execute_contract(&self, _: &ContractCall) -> Result<LedgerReceipt, LedgerError> {
            Ok(self.receipt())
        }

        async fn deploy_contract(&self, _: &str, _: u64) -> Result<ContractDeployment, LedgerError> {
            Err(LedgerError::Unavailable)
        }

        async fn query_contract(&self, _: &ContractCall) -> Result<serde_json::Value, LedgerError> {
            Err(LedgerError::Unavailable)
        }

        async fn transaction_status(&self, id: &str) -> Result<TransactionStatus, LedgerError> {
            Ok(TransactionStatus {
                transaction_id: id.to_string(),
                result: "SUCCESS".to_string(),
                consensus_timestamp: None,
            })
        }

        async fn account_balance(&self, _: &str) -> Result<AccountBalance, LedgerError> {
            Err(LedgerError::Unavailable)
        }
    }

    /// Online ledger whose badge mints wait until `release` is notified
    struct GatedLedger {
        inner: OnlineLedger,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl LedgerBackend for GatedLedger {
        async fn submit_message(&self, topic: &str, memo: &str) -> Result<LedgerReceipt, LedgerError> {
            self.inner.submit_message(topic, memo).await
        }

        async fn execute_contract(&self, call: &ContractCall) -> Result<LedgerReceipt, LedgerError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.execute_contract(call).await
        }

        async fn deploy_contract(&self, code: &str, gas: u64) -> Result<ContractDeployment, LedgerError> {
            self.inner.deploy_contract(code, gas).await
        }

        async fn query_contract(&self, call: &ContractCall) -> Result<serde_json::Value, LedgerError> {
            self.inner.query_contract(call).await
        }

        async fn transaction_status(&self, id: &str) -> Result<TransactionStatus, LedgerError> {
            self.inner.transaction_status(id).await
        }

        async fn account_balance(&self, account: &str) -> Result<AccountBalance, LedgerError> {
            self.inner.account_balance(account).await
        }
    }

    fn tracker_with(ledger: LedgerService, notifier: Arc<dyn Notifier>) -> Tracker {
        Tracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ledger),
            notifier,
            None,
            Arc::new(EventHub::default()),
        )
    }

    fn tracker() -> Tracker {
        tracker_with(LedgerService::disabled(), Arc::new(LogOnly))
    }

    fn ledger_settings() -> LedgerSettings {
        LedgerSettings {
            topic_id: Some("0.0.5678".to_string()),
            badge_contract_id: Some("0.0.9012".to_string()),
            ..Default::default()
        }
    }

    fn online_tracker() -> Tracker {
        let backend = Arc::new(OnlineLedger {
            next: AtomicU64::new(1),
        });
        tracker_with(LedgerService::new(backend, ledger_settings()), Arc::new(LogOnly))
    }

    fn new_entry(title: &str) -> NewEntry {
        NewEntry {
            title: title.to_string(),
            description: "Borrowing and moves!".to_string(),
            category: Category::Tutorial,
            date: Utc::now().date_naive(),
        }
    }

    #[tokio::test]
    async fn test_register_and_duplicates() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "Ada@Example.com").await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(tracker.current_user().unwrap().unwrap().id, user.id);

        assert!(matches!(
            tracker.register_user("other", "ada@example.com").await,
            Err(TrackerError::Conflict(_))
        ));
        assert!(matches!(
            tracker.register_user("ADA", "new@example.com").await,
            Err(TrackerError::Conflict(_))
        ));
        assert!(matches!(
            tracker.register_user("x", "bad").await,
            Err(TrackerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let tracker = tracker();
        let ada = tracker.register_user("ada", "ada@example.com").await.unwrap();
        tracker.register_user("bob", "bob@example.com").await.unwrap();

        let signed = tracker.sign_in("ADA@example.com").await.unwrap();
        assert_eq!(signed.id, ada.id);
        assert_eq!(tracker.current_user().unwrap().unwrap().id, ada.id);

        tracker.sign_out().unwrap();
        assert!(tracker.current_user().unwrap().is_none());

        assert!(matches!(
            tracker.sign_in("nobody@example.com").await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_learned_rust_ownership_scenario() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();

        let submission = tracker
            .submit_entry(&user.id, new_entry("Learned Rust ownership"))
            .await
            .unwrap();

        assert_eq!(submission.user.total_entries, 1);
        assert_eq!(submission.user.learning_streak, 1);
        assert!(submission.ledger.is_none());
        assert_eq!(submission.unlocked.len(), 1);
        assert_eq!(submission.unlocked[0].name, "First Steps");
        assert!(submission.unlocked[0].transaction_id.is_none());

        assert_eq!(tracker.entries(&user.id, None).unwrap().len(), 1);
        assert_eq!(tracker.user(&user.id).unwrap().total_badges, 1);
    }

    #[tokio::test]
    async fn test_invalid_entry_is_not_stored() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();

        let mut input = new_entry("ok title");
        input.description = "short".to_string();
        input.date = Utc::now().date_naive() + Duration::days(1);

        match tracker.submit_entry(&user.id, input).await {
            Err(TrackerError::Validation(errors)) => {
                assert!(errors.get("description").is_some());
                assert!(errors.get("date").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.map(|s| s.entry)),
        }
        assert!(tracker.entries(&user.id, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entries_are_sanitized() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        let submission = tracker
            .submit_entry(&user.id, new_entry("<b>Macros</b> by example"))
            .await
            .unwrap();
        assert_eq!(submission.entry.title, "Macros by example");
    }

    #[tokio::test]
    async fn test_badges_unlock_at_milestones() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();

        let mut unlocked = Vec::new();
        for i in 0..5 {
            let submission = tracker
                .submit_entry(&user.id, new_entry(&format!("Entry number {}", i)))
                .await
                .unwrap();
            unlocked.extend(submission.unlocked.into_iter().map(|b| b.milestone));
        }
        assert_eq!(unlocked, vec![1, 5]);
        assert!(tracker.eligible_badges(&user.id).unwrap().is_empty());

        for badge in tracker.badges(&user.id).unwrap() {
            assert_eq!(badge.unlocked, badge.milestone <= 5);
        }
    }

    #[tokio::test]
    async fn test_claim_badge_rules() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();

        assert!(matches!(
            tracker.claim_badge(&user.id, 1).await,
            Err(TrackerError::NotEligible { milestone: 1, entry_count: 0 })
        ));
        assert!(matches!(
            tracker.claim_badge(&user.id, 7).await,
            Err(TrackerError::NotFound(_))
        ));

        tracker.submit_entry(&user.id, new_entry("First one")).await.unwrap();
        assert!(matches!(
            tracker.claim_badge(&user.id, 1).await,
            Err(TrackerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_restored_entries_make_badges_claimable() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();

        let entries: Vec<Entry> = (0..5)
            .map(|i| Entry::new(user.id.clone(), new_entry(&format!("Imported {}", i))))
            .collect();
        let bundle = BackupBundle::new(user.clone(), entries, None, None);
        tracker.restore_backup(bundle).await.unwrap();

        let eligible: Vec<u32> = tracker
            .eligible_badges(&user.id)
            .unwrap()
            .iter()
            .map(|b| b.milestone)
            .collect();
        assert_eq!(eligible, vec![1, 5]);

        let badge = tracker.claim_badge(&user.id, 5).await.unwrap();
        assert!(badge.unlocked);
        assert_eq!(tracker.user(&user.id).unwrap().total_badges, 1);
    }

    #[tokio::test]
    async fn test_backup_round_trip_keeps_entries() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        for i in 0..3 {
            tracker
                .submit_entry(&user.id, new_entry(&format!("Entry {}", i)))
                .await
                .unwrap();
        }

        let bundle = tracker.create_backup(&user.id).unwrap();
        let json = bundle.to_json().unwrap();

        let first = tracker.entries(&user.id, None).unwrap()[0].id.clone();
        tracker.delete_entry(&user.id, &first).await.unwrap();
        tracker.submit_entry(&user.id, new_entry("After backup")).await.unwrap();

        let summary = tracker
            .restore_backup(BackupBundle::from_json(&json).unwrap())
            .await
            .unwrap();
        assert_eq!(summary.entries, 3);

        let before: HashSet<String> = bundle.entries.iter().map(|e| e.id.clone()).collect();
        let after: HashSet<String> = tracker
            .entries(&user.id, None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(before, after);
        assert_eq!(tracker.user(&user.id).unwrap().total_entries, 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_local_entry() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        let entry = tracker
            .submit_entry(&user.id, new_entry("Draft title"))
            .await
            .unwrap()
            .entry;

        let mut edit = new_entry("Final title");
        edit.category = Category::Book;
        let updated = tracker.update_entry(&user.id, &entry.id, edit).await.unwrap();
        assert_eq!(updated.title, "Final title");
        assert_eq!(
            tracker.entries(&user.id, Some(Category::Book)).unwrap().len(),
            1
        );
        assert!(tracker
            .entries(&user.id, Some(Category::Tutorial))
            .unwrap()
            .is_empty());

        tracker.delete_entry(&user.id, &entry.id).await.unwrap();
        assert!(tracker.entries(&user.id, None).unwrap().is_empty());
        assert_eq!(tracker.user(&user.id).unwrap().total_entries, 0);
        assert!(matches!(
            tracker.delete_entry(&user.id, &entry.id).await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_anchored_entries_are_immutable() {
        let tracker = online_tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        assert!(tracker.settings(&user.id).unwrap().blockchain_enabled);

        let submission = tracker
            .submit_entry(&user.id, new_entry("On the ledger"))
            .await
            .unwrap();
        assert!(submission.ledger.as_ref().unwrap().is_confirmed());
        assert!(submission.entry.is_anchored());
        assert!(submission.unlocked[0]
            .transaction_id
            .as_deref()
            .unwrap()
            .starts_with("0.0.1001@"));

        let id = submission.entry.id;
        assert!(matches!(
            tracker.update_entry(&user.id, &id, new_entry("Rewrite")).await,
            Err(TrackerError::Immutable(_))
        ));
        assert!(matches!(
            tracker.delete_entry(&user.id, &id).await,
            Err(TrackerError::Immutable(_))
        ));

        let tx = submission.ledger.unwrap().transaction_id().to_string();
        assert!(tracker.verify_transaction(&tx).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_local_fallback_is_reported() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        tracker
            .update_settings(&user.id, Settings::with_ledger(true))
            .await
            .unwrap();

        let mut events = tracker.events().subscribe();
        let submission = tracker
            .submit_entry(&user.id, new_entry("Offline learning"))
            .await
            .unwrap();

        let outcome = submission.ledger.unwrap();
        assert_eq!(outcome.status(), "LOCAL_FALLBACK");
        assert!(!submission.entry.is_anchored());

        let first = events.recv().await.unwrap();
        assert!(matches!(first, TrackerEvent::LedgerDegraded { .. }));

        assert!(matches!(
            tracker.verify_transaction(outcome.transaction_id()).await,
            Err(TrackerError::Ledger(LedgerError::LocalTransaction(_)))
        ));
    }

    #[tokio::test]
    async fn test_emails_respect_settings() {
        let notifier = Arc::new(RecordingNotifier {
            sent: std::sync::Mutex::new(Vec::new()),
        });
        let tracker = tracker_with(LedgerService::disabled(), notifier.clone());

        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        tracker.submit_entry(&user.id, new_entry("First entry")).await.unwrap();
        {
            let sent = notifier.sent.lock().unwrap();
            assert_eq!(sent.len(), 2);
            assert!(sent[0].subject.contains("Welcome"));
            assert!(sent[1].subject.contains("First Steps"));
        }

        let quiet = Settings {
            email_notifications: false,
            ..Settings::default()
        };
        tracker.update_settings(&user.id, quiet).await.unwrap();
        for i in 0..4 {
            tracker
                .submit_entry(&user.id, new_entry(&format!("Quiet {}", i)))
                .await
                .unwrap();
        }
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_profile_and_stats() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();

        let profile = tracker
            .update_profile(
                &user.id,
                Profile {
                    display_name: Some("  Ada <i>L</i> ".to_string()),
                    hedera_account_id: Some(" 0.0.42 ".to_string()),
                    website: Some("".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ada L"));
        assert_eq!(profile.hedera_account_id.as_deref(), Some("0.0.42"));
        assert!(profile.website.is_none());

        let bad = Profile {
            hedera_account_id: Some("42".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            tracker.update_profile(&user.id, bad).await,
            Err(TrackerError::Validation(_))
        ));

        tracker.submit_entry(&user.id, new_entry("Stats entry")).await.unwrap();
        let stats = tracker.stats(&user.id).unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_badges, 1);
        assert_eq!(stats.entries_this_week, 1);
        assert_eq!(stats.categories[&Category::Tutorial], 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let tracker = tracker();
        assert!(matches!(tracker.user("nope"), Err(TrackerError::NotFound(_))));
        assert!(matches!(
            tracker.submit_entry("nope", new_entry("Whatever")).await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_mint_does_not_block_other_writers() {
        let backend = Arc::new(GatedLedger {
            inner: OnlineLedger {
                next: AtomicU64::new(1),
            },
            entered: Notify::new(),
            release: Notify::new(),
        });
        let tracker = Arc::new(tracker_with(
            LedgerService::new(backend.clone(), ledger_settings()),
            Arc::new(LogOnly),
        ));
        let ada = tracker.register_user("ada", "ada@example.com").await.unwrap();
        let bob = tracker.register_user("bob", "bob@example.com").await.unwrap();

        let submit = {
            let tracker = Arc::clone(&tracker);
            let user_id = ada.id.clone();
            tokio::spawn(async move { tracker.submit_entry(&user_id, new_entry("Slow mint")).await })
        };
        backend.entered.notified().await;

        let quiet = Settings {
            weekly_digest: false,
            ..Settings::default()
        };
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            tracker.update_settings(&bob.id, quiet),
        )
        .await
        .expect("settings write waited for the mint")
        .unwrap();

        // The same badge cannot be minted twice while the first mint is in flight
        assert!(matches!(
            tracker.claim_badge(&ada.id, 1).await,
            Err(TrackerError::Conflict(_))
        ));

        backend.release.notify_one();
        let submission = submit.await.unwrap().unwrap();
        assert_eq!(submission.unlocked.len(), 1);
        assert!(submission.unlocked[0].transaction_id.is_some());
        assert_eq!(tracker.user(&ada.id).unwrap().total_badges, 1);
        assert!(!tracker.settings(&bob.id).unwrap().weekly_digest);
    }

    #[tokio::test]
    async fn test_restore_rejects_malformed_user_id() {
        let tracker = tracker();
        let mut user = User::new("ab", "ab@example.com");
        user.id = "ab".to_string();
        let bundle = BackupBundle::new(user, Vec::new(), None, None);

        match tracker.restore_backup(bundle).await {
            Err(TrackerError::Validation(errors)) => assert!(errors.get("user.id").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(tracker.users().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_rejects_identity_of_another_user() {
        let tracker = tracker();
        tracker.register_user("ada", "ada@example.com").await.unwrap();
        let bob = tracker.register_user("bob", "bob@example.com").await.unwrap();

        let mut bundle = tracker.create_backup(&bob.id).unwrap();
        bundle.user.email = "ada@example.com".to_string();
        assert!(matches!(
            tracker.restore_backup(bundle).await,
            Err(TrackerError::Conflict(_))
        ));
        assert_eq!(tracker.user(&bob.id).unwrap().email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_restore_rejects_invalid_entries() {
        let tracker = tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        tracker.submit_entry(&user.id, new_entry("Kept entry")).await.unwrap();

        let mut bad = Entry::new(user.id.clone(), new_entry("Broken"));
        bad.description = "short".to_string();
        let bundle = BackupBundle::new(user.clone(), vec![bad], None, None);

        match tracker.restore_backup(bundle).await {
            Err(TrackerError::Validation(errors)) => {
                assert!(errors.get("entries[0].description").is_some())
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(tracker.entries(&user.id, None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_keeps_anchored_entries() {
        let tracker = online_tracker();
        let user = tracker.register_user("ada", "ada@example.com").await.unwrap();
        tracker
            .update_settings(&user.id, Settings::with_ledger(false))
            .await
            .unwrap();
        tracker.submit_entry(&user.id, new_entry("Local entry")).await.unwrap();
        let bundle = tracker.create_backup(&user.id).unwrap();

        tracker
            .update_settings(&user.id, Settings::with_ledger(true))
            .await
            .unwrap();
        let anchored = tracker
            .submit_entry(&user.id, new_entry("Anchored later"))
            .await
            .unwrap()
            .entry;
        assert!(anchored.is_anchored());

        let summary = tracker.restore_backup(bundle).await.unwrap();
        assert_eq!(summary.entries, 2);

        let ids: HashSet<String> = tracker
            .entries(&user.id, None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert!(ids.contains(&anchored.id));
        assert_eq!(tracker.user(&user.id).unwrap().total_entries, 2);
    }
}
