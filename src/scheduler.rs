//! Reminder and Digest Scheduler
//!
//! Wakes up on an interval and runs [`Scheduler::tick`]:
//!
//! - **Reminders**: users inactive for `inactivity_days` get a nudge, at most
//!   once per `reminder_cooldown_days` (stamped under `reminder_<userId>`).
//! - **Weekly digest**: one send per weekly slot (weekday + hour in the
//!   configured UTC offset). The last slot sent is kept under
//!   `devchain_scheduler`, so a slot missed while the process was down is
//!   sent on the next tick and no slot is ever sent twice.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::badges;
use crate::config::SchedulerConfig;
use crate::events::{EventHub, TrackerEvent};
use crate::model::{Settings, User};
use crate::notify::templates::{self, DigestSummary};
use crate::notify::{Notifier, NotifyError};
use crate::stats;
use crate::storage::{keys, Repository, StorageError};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("Invalid scheduler config: {0}")]
    Config(String),
}

/// Durable scheduler cursor
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub last_reminder_scan: Option<DateTime<Utc>>,
    /// Start of the most recent digest slot already handled
    pub last_digest_slot: Option<DateTime<Utc>>,
}

/// What one tick did
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub reminders_sent: u32,
    pub digests_sent: u32,
    /// Slot whose digest went out during this tick
    pub digest_slot: Option<DateTime<Utc>>,
    pub failures: u32,
}

pub struct Scheduler {
    repo: Repository,
    notifier: Arc<dyn Notifier>,
    events: Arc<EventHub>,
    config: SchedulerConfig,
    weekday: Weekday,
    offset: FixedOffset,
    running: Arc<RwLock<bool>>,
    /// Manual and background ticks never overlap
    tick_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        repo: Repository,
        notifier: Arc<dyn Notifier>,
        events: Arc<EventHub>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        let weekday: Weekday = config
            .digest_weekday
            .parse()
            .map_err(|_| SchedulerError::Config(format!("digest_weekday '{}'", config.digest_weekday)))?;
        if config.digest_hour > 23 {
            return Err(SchedulerError::Config(format!(
                "digest_hour {} is not 0-23",
                config.digest_hour
            )));
        }
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            SchedulerError::Config(format!("utc_offset_minutes {}", config.utc_offset_minutes))
        })?;

        Ok(Self {
            repo,
            notifier,
            events,
            config,
            weekday,
            offset,
            running: Arc::new(RwLock::new(false)),
            tick_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> Result<SchedulerState, SchedulerError> {
        Ok(self.repo.get_json(keys::SCHEDULER)?.unwrap_or_default())
    }

    fn save_state(&self, state: &SchedulerState) -> Result<(), SchedulerError> {
        Ok(self.repo.set_json(keys::SCHEDULER, state)?)
    }

    /// Start of the latest digest slot at or before `now`
    pub fn latest_slot(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset);
        let days_back = (local.weekday().num_days_from_monday() + 7
            - self.weekday.num_days_from_monday())
            % 7;
        let date = local.date_naive() - Duration::days(days_back as i64);
        let time = NaiveTime::from_hms_opt(self.config.digest_hour, 0, 0).unwrap_or(NaiveTime::MIN);

        let slot = self
            .offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);

        if slot > now {
            slot - Duration::days(7)
        } else {
            slot
        }
    }

    /// Run every check that is due at `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        let _guard = self.tick_lock.lock().await;
        let mut state = self.state()?;
        let mut report = TickReport::default();

        let users: Vec<User> = self.repo.users()?.into_values().collect();

        for user in &users {
            match self.remind(user, now).await {
                Ok(true) => report.reminders_sent += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(user_id = %user.id, error = %e, "Reminder check failed");
                }
            }
        }
        state.last_reminder_scan = Some(now);
        self.save_state(&state)?;

        let slot = self.latest_slot(now);
        let due = match state.last_digest_slot {
            Some(last) => last < slot,
            // First run: only send if we are inside the slot hour itself
            None => now - slot < Duration::hours(1),
        };

        if due {
            for user in &users {
                match self.digest(user, slot).await {
                    Ok(true) => report.digests_sent += 1,
                    Ok(false) => {}
                    Err(e) => {
                        report.failures += 1;
                        tracing::warn!(user_id = %user.id, error = %e, "Digest failed");
                    }
                }
            }
            report.digest_slot = Some(slot);
        }
        if state.last_digest_slot.map_or(true, |last| last < slot) {
            state.last_digest_slot = Some(slot);
            self.save_state(&state)?;
        }

        if report.reminders_sent > 0 || report.digests_sent > 0 || report.failures > 0 {
            tracing::info!(
                reminders = report.reminders_sent,
                digests = report.digests_sent,
                failures = report.failures,
                "Scheduler tick"
            );
        }

        Ok(report)
    }

    fn wants_email(&self, user: &User, pick: impl Fn(&Settings) -> bool) -> Result<bool, SchedulerError> {
        let settings = self.repo.settings(&user.id)?.unwrap_or_default();
        Ok(settings.email_notifications && pick(&settings))
    }

    /// Returns whether a reminder went out
    async fn remind(&self, user: &User, now: DateTime<Utc>) -> Result<bool, SchedulerError> {
        if !self.wants_email(user, |s| s.reminders_enabled)? {
            return Ok(false);
        }

        let inactive = now - user.last_active();
        if inactive < Duration::days(self.config.inactivity_days) {
            return Ok(false);
        }

        let last = self.repo.last_reminder(&user.id)?;
        if let Some(last) = last {
            if now - last < Duration::days(self.config.reminder_cooldown_days) {
                return Ok(false);
            }
        }

        let days_inactive = inactive.num_days();
        self.notifier
            .send(&templates::reminder(user, days_inactive))
            .await?;
        self.repo.set_last_reminder(&user.id, now)?;

        tracing::info!(user_id = %user.id, days_inactive, "Reminder sent");
        self.events.publish(TrackerEvent::ReminderSent {
            user_id: user.id.clone(),
            days_inactive,
        });
        Ok(true)
    }

    /// Returns whether a digest went out
    async fn digest(&self, user: &User, slot: DateTime<Utc>) -> Result<bool, SchedulerError> {
        if !self.wants_email(user, |s| s.weekly_digest)? {
            return Ok(false);
        }

        let entries = self.repo.entries_for(&user.id)?;
        let claims = self.repo.badge_claims(&user.id)?;
        let day = slot.with_timezone(&self.offset).date_naive();

        let progress = badges::progress(&badges::with_claims(&claims), entries.len() as u32);
        let summary = DigestSummary {
            entries_this_week: stats::entries_this_week(&entries, day),
            total_entries: entries.len() as u32,
            streak: stats::learning_streak(&entries, day),
            badges_unlocked: claims.len() as u32,
            coaching: progress.message,
        };

        self.notifier
            .send(&templates::weekly_digest(user, &summary))
            .await?;

        tracing::info!(user_id = %user.id, entries = summary.entries_this_week, "Digest sent");
        self.events.publish(TrackerEvent::DigestSent {
            user_id: user.id.clone(),
            entries_this_week: summary.entries_this_week,
        });
        Ok(true)
    }

    /// Start the scheduler background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();

        tokio::spawn(async move {
            *scheduler.running.write().await = true;
            tracing::info!(
                interval_secs = scheduler.config.check_interval_secs,
                "Scheduler started"
            );

            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                scheduler.config.check_interval_secs.max(1),
            ));

            loop {
                interval.tick().await;

                if !*scheduler.running.read().await {
                    break;
                }

                if let Err(e) = scheduler.tick(Utc::now()).await {
                    tracing::error!(error = %e, "Scheduler tick failed");
                }
            }

            tracing::info!("Scheduler stopped");
        })
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
