//! Tiered sliding-window rate limiting, per `(user_id, trip_id)`.
//!
//! Tracks request timestamps per key and discards entries older than the
//! tier's window on every check. The check and the increment happen under
//! one lock, so concurrent requests from the same user can never both
//! slip past the limit. Counters are never decremented except by window
//! expiry — abandoned requests still consume quota.
//!
//! Paid tiers are only bigger ceilings: every tier runs this exact code
//! path, "unlimited" is a very large `max_queries`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use wayfarer_config::RateLimitConfig;

/// Outcome of one check-and-increment.
#[derive(Debug, Clone, PartialEq)]
pub enum RateDecision {
    Allowed,
    Limited { reset_at: DateTime<Utc> },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Once the counter map grows past this many keys, a sweep evicts the
/// fully-expired ones.
const CLEANUP_THRESHOLD: usize = 10_000;

/// In-memory sliding-window rate limiter.
///
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly, never
/// across an await).
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Mutex<HashMap<(String, String), Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically check the quota for `(user_id, trip_id)` under `tier`
    /// and consume one slot if allowed.
    ///
    /// Unknown tiers fall back to the configured default tier.
    pub fn check_and_increment(&self, user_id: &str, trip_id: &str, tier: &str) -> RateDecision {
        let limit = self
            .config
            .tiers
            .get(tier)
            .unwrap_or_else(|| &self.config.tiers[&self.config.default_tier]);
        let window = Duration::from_secs(limit.window_seconds);
        let now = Instant::now();

        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: evict keys whose whole window has expired
        if counters.len() > CLEANUP_THRESHOLD {
            counters.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < window)
            });
        }

        let timestamps = counters
            .entry((user_id.to_string(), trip_id.to_string()))
            .or_default();

        timestamps.retain(|t| now.duration_since(*t) < window);

        if timestamps.len() >= limit.max_queries as usize {
            // The window slides: the slot frees up when the oldest
            // timestamp in it ages out.
            let oldest = timestamps[0];
            let remaining = window.saturating_sub(now.duration_since(oldest));
            let reset_at = Utc::now()
                + ChronoDuration::from_std(remaining).unwrap_or_else(|_| ChronoDuration::zero());
            warn!(
                user_id = %user_id,
                trip_id = %trip_id,
                tier = %tier,
                limit = limit.max_queries,
                "Rate limit exceeded"
            );
            return RateDecision::Limited { reset_at };
        }

        timestamps.push(now);
        RateDecision::Allowed
    }

    /// Remaining quota for a key without consuming a slot. Diagnostic only.
    pub fn remaining(&self, user_id: &str, trip_id: &str, tier: &str) -> u32 {
        let limit = self
            .config
            .tiers
            .get(tier)
            .unwrap_or_else(|| &self.config.tiers[&self.config.default_tier]);
        let window = Duration::from_secs(limit.window_seconds);
        let now = Instant::now();

        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let used = counters
            .get(&(user_id.to_string(), trip_id.to_string()))
            .map(|ts| ts.iter().filter(|t| now.duration_since(**t) < window).count())
            .unwrap_or(0);
        limit.max_queries.saturating_sub(used as u32)
    }
}
