//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::error::ApiError;
use crate::config::ApiConfig;
use crate::events::EventHub;
use crate::rate_limit::SlidingWindowLimiter;
use crate::scheduler::Scheduler;
use crate::tracker::Tracker;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Tracker service behind every user-facing route
    pub tracker: Arc<Tracker>,
    /// Event hub feeding `/ws` connections
    pub events: Arc<EventHub>,
    /// Per-user limiter for entry writes
    pub limiter: Arc<SlidingWindowLimiter>,
    /// Reminder/digest scheduler, when enabled
    pub scheduler: Option<Arc<Scheduler>>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state without a scheduler; the event hub is the tracker's own
    pub fn new(tracker: Arc<Tracker>, config: ApiConfig) -> Self {
        let limiter = SlidingWindowLimiter::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            events: Arc::clone(tracker.events()),
            tracker,
            limiter: Arc::new(limiter),
            scheduler: None,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Count one entry write for `user_id`. Unknown users get 404 and no
    /// limiter slot.
    pub fn check_rate_limit(&self, user_id: &str) -> Result<(), ApiError> {
        self.tracker.user(user_id)?;
        self.limiter.check(user_id).map_err(|limited| {
            tracing::warn!(user_id, retry_after = ?limited.retry_after, "Entry writes rate limited");
            ApiError::RateLimited {
                retry_after_secs: limited.retry_after.as_secs().max(1),
            }
        })
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.events.connection_count().await
    }
}
