//! Per-client fixed-window rate limiting.
//!
//! Each client gets `max_requests` per `window`. Windows start on the
//! client's first request and are replaced once their reset time passes.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::clock::SharedClock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::milliseconds(60_000),
            max_requests: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Quota position of one client after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitStatus),
    Limited {
        status: RateLimitStatus,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed(_))
    }

    pub fn status(&self) -> &RateLimitStatus {
        match self {
            RateLimitDecision::Allowed(status) => status,
            RateLimitDecision::Limited { status, .. } => status,
        }
    }
}

/// Whole seconds a client should wait, rounded up.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = retry_after.num_milliseconds().max(0) as u64;
    (millis + 999) / 1000
}

pub struct ClientRateLimiter {
    config: RateLimitConfig,
    clock: SharedClock,
    // Map: client id -> current window
    windows: DashMap<String, WindowEntry>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request for `client_id`, or refuse it if the quota is spent.
    pub fn check(&self, client_id: &str) -> RateLimitDecision {
        let now = self.clock.now();
        self.cleanup(now);

        let mut entry = self
            .windows
            .entry(client_id.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + self.config.window,
            });

        if entry.reset_at <= now {
            *entry = WindowEntry {
                count: 0,
                reset_at: now + self.config.window,
            };
        }

        if entry.count >= self.config.max_requests {
            let retry_after = entry.reset_at - now;
            return RateLimitDecision::Limited {
                status: RateLimitStatus {
                    limit: self.config.max_requests,
                    remaining: 0,
                    reset_at: entry.reset_at,
                },
                retry_after,
            };
        }

        entry.count += 1;

        RateLimitDecision::Allowed(RateLimitStatus {
            limit: self.config.max_requests,
            remaining: self.config.max_requests - entry.count,
            reset_at: entry.reset_at,
        })
    }

    /// Current window for a client without counting a request
    pub fn status(&self, client_id: &str) -> Option<RateLimitStatus> {
        let now = self.clock.now();
        self.windows
            .get(client_id)
            .filter(|entry| entry.reset_at > now)
            .map(|entry| RateLimitStatus {
                limit: self.config.max_requests,
                remaining: self.config.max_requests.saturating_sub(entry.count),
                reset_at: entry.reset_at,
            })
    }

    /// Drop windows that have fully elapsed
    fn cleanup(&self, now: DateTime<Utc>) {
        let before = self.windows.len();
        self.windows.retain(|_, entry| entry.reset_at > now);

        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!("Rate limiter cleanup removed {} expired windows", removed);
        }
    }

    pub fn reset_client(&self, client_id: &str) {
        self.windows.remove(client_id);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}
