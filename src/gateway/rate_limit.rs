//! Sliding-window rate limiter keyed by caller identity

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-identity request timestamps within a trailing window
#[derive(Debug)]
pub struct RateWindow {
    limit: u32,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl RateWindow {
    /// Admit at most `limit` requests per identity within `window`
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
        }
    }

    /// Configured ceiling
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and record a request from `identity` now.
    /// Returns `false` when the caller is over the limit.
    pub fn check(&self, identity: &str) -> bool {
        self.check_at(identity, Instant::now())
    }

    /// Check and record a request from `identity` at `now`.
    ///
    /// Entries older than the window are pruned first. A rejected request is
    /// not recorded. The entry lock is held for the whole step, so concurrent
    /// callers with the same identity are serialized.
    pub fn check_at(&self, identity: &str, now: Instant) -> bool {
        let mut entry = self.hits.entry(identity.to_string()).or_default();
        let timestamps = entry.value_mut();

        if let Some(cutoff) = now.checked_sub(self.window) {
            while timestamps.front().is_some_and(|t| *t <= cutoff) {
                timestamps.pop_front();
            }
        }

        if timestamps.len() >= self.limit as usize {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Requests currently counted for `identity`
    #[must_use]
    pub fn count(&self, identity: &str) -> usize {
        self.hits.get(identity).map_or(0, |t| t.len())
    }
}
