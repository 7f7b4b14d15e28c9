//! Per-caller fixed-window rate limiter.
//!
//! Each caller key gets a window that opens on its first request and lasts
//! `period`. Up to `limit` requests are allowed inside a window; the next
//! request after the window closes opens a fresh one.
//!
//! Counters live in a `DashMap`, so a check runs under the key's shard lock
//! and concurrent requests from one caller cannot undercount.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed; `remaining` requests are left in the window
    Allowed { remaining: u32 },
    /// Quota exhausted until the window closes
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Thread-safe rate limiter shared by all requests
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    limit: u32,
    period: Duration,
}

impl RateLimiter {
    /// `limit` of 0 disables limiting
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            period,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0 && !self.period.is_zero()
    }

    /// Count one request for `key` and decide whether it may proceed
    pub fn check(&self, key: &str) -> Decision {
        if !self.is_enabled() {
            return Decision::Allowed {
                remaining: u32::MAX,
            };
        }

        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_owned())
            .or_insert(Window {
                started: now,
                count: 0,
            });
        let window = entry.value_mut();

        let elapsed = now.duration_since(window.started);
        if elapsed >= self.period {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.limit {
            let retry_after = self.period - now.duration_since(window.started);
            return Decision::Limited { retry_after };
        }

        window.count += 1;
        Decision::Allowed {
            remaining: self.limit - window.count,
        }
    }

    /// Drop windows that have closed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.period);
        before.saturating_sub(self.windows.len())
    }

    /// Number of callers with an open window
    pub fn tracked_callers(&self) -> usize {
        self.windows.len()
    }

    /// Start background purging of closed windows until `cancel` fires
    pub fn start_cleanup_task(self, interval: Duration, cancel: CancellationToken) {
        if !self.is_enabled() || interval.is_zero() {
            return;
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = self.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Purged expired rate limit windows");
                        }
                    }
                }
            }
            debug!("Rate limit cleanup task stopped");
        });

        info!(
            interval_secs = interval.as_secs(),
            "Started rate limit cleanup task"
        );
    }
}
