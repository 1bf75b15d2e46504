//! Sliding-window rate limiter
//!
//! Keeps the timestamps of recent calls per key and rejects a call once
//! `limit` of them fall inside the trailing window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Per-key sliding window limiter
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

/// Rejected call; `retry_after` is when the oldest call leaves the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, key: &str) -> Result<(), RateLimited> {
        self.check_at(key, Instant::now())
    }

    /// Record a call at `now` if the key still has room
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimited> {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let recent = calls.entry(key.to_string()).or_default();

        while let Some(oldest) = recent.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                recent.pop_front();
            } else {
                break;
            }
        }

        if recent.len() >= self.limit {
            let oldest = recent.front().copied().unwrap_or(now);
            let elapsed = now.saturating_duration_since(oldest);
            return Err(RateLimited {
                retry_after: self.window.saturating_sub(elapsed),
            });
        }

        recent.push_back(now);
        Ok(())
    }

    /// Drop keys whose calls have all aged out
    pub fn prune(&self, now: Instant) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.retain(|_, recent| {
            recent
                .back()
                .map(|last| now.saturating_duration_since(*last) < self.window)
                .unwrap_or(false)
        });
    }

    /// Prune once per window until the task is aborted
    pub fn spawn_pruner(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                self.prune(Instant::now());
                tracing::trace!(keys = self.tracked_keys(), "Rate limiter pruned");
            }
        })
    }

    pub fn tracked_keys(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleventh_call_rejected_then_recovers() {
        let limiter = SlidingWindowLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.check_at("u1", start + Duration::from_secs(i)).is_ok());
        }

        let rejected = limiter
            .check_at("u1", start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(rejected.retry_after, Duration::from_secs(50));

        assert!(limiter.check_at("u1", start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_ok());
        assert!(limiter.check_at("a", now).is_err());
        assert!(limiter.check_at("b", now).is_ok());
    }

    #[test]
    fn test_prune() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        let now = Instant::now();
        limiter.check_at("a", now).unwrap();
        limiter.check_at("b", now).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.prune(now + Duration::from_secs(2));
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_pruner_drops_idle_keys() {
        let limiter = Arc::new(SlidingWindowLimiter::new(5, Duration::from_millis(10)));
        for i in 0..100 {
            limiter.check(&format!("user-{}", i)).unwrap();
        }
        assert_eq!(limiter.tracked_keys(), 100);

        // First tick fires immediately, the next one a second later
        let pruner = Arc::clone(&limiter).spawn_pruner();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        pruner.abort();

        assert_eq!(limiter.tracked_keys(), 0);
    }
}
