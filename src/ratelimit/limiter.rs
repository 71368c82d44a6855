//! Per-endpoint rate limiter
//!
//! Uses the governor crate for the token bucket and layers server hints
//! (remaining budget, reset time, `Retry-After`) on top of it.

use super::headers::RateLimitHeaders;
use crate::error::{Error, Result};
use crate::sleep::Sleeper;
use chrono::{DateTime, Utc};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Governor};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Longest pause a server hint can impose on a single acquire
const MAX_SERVER_WAIT: Duration = Duration::from_secs(3600);

/// Limiting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    /// Bucket refilled at `rate`, holding up to `burst` tokens
    #[default]
    #[serde(alias = "TOKEN_BUCKET")]
    TokenBucket,
    /// Requests leak out at a steady `rate` with no burst
    #[serde(alias = "LEAKY_BUCKET")]
    LeakyBucket,
}

/// Rate limit declared on an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    /// Limiting strategy
    #[serde(default)]
    pub strategy: RateLimitStrategy,
    /// Sustained requests per second
    pub rate: f64,
    /// Bucket capacity (token bucket only)
    #[serde(default)]
    pub burst: Option<u32>,
}

impl RateLimitSpec {
    /// Token bucket allowing `rate` requests per second with a burst
    pub fn token_bucket(rate: f64, burst: u32) -> Self {
        Self {
            strategy: RateLimitStrategy::TokenBucket,
            rate,
            burst: Some(burst),
        }
    }

    /// Leaky bucket draining `rate` requests per second
    pub fn leaky_bucket(rate: f64) -> Self {
        Self {
            strategy: RateLimitStrategy::LeakyBucket,
            rate,
            burst: None,
        }
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(Error::invalid_value(
                "rate_limit.rate",
                format!("must be a positive number, got {}", self.rate),
            ));
        }
        if Duration::try_from_secs_f64(1.0 / self.rate).is_err() {
            return Err(Error::invalid_value(
                "rate_limit.rate",
                format!("rate {} is too low", self.rate),
            ));
        }
        if self.burst == Some(0) {
            return Err(Error::invalid_value("rate_limit.burst", "must be > 0"));
        }
        Ok(())
    }

    /// Effective bucket capacity
    pub fn capacity(&self) -> u32 {
        match self.strategy {
            RateLimitStrategy::LeakyBucket => 1,
            RateLimitStrategy::TokenBucket => self
                .burst
                .unwrap_or_else(|| (self.rate.ceil() as u32).max(1)),
        }
    }

    fn quota(&self) -> Result<Quota> {
        self.validate()?;
        let period = Duration::try_from_secs_f64(1.0 / self.rate)
            .map_err(|_| Error::invalid_value("rate_limit.rate", "rate is too low"))?;
        let burst = NonZeroU32::new(self.capacity())
            .ok_or_else(|| Error::invalid_value("rate_limit.burst", "must be > 0"))?;
        Quota::with_period(period)
            .map(|q| q.allow_burst(burst))
            .ok_or_else(|| Error::invalid_value("rate_limit.rate", "rate is too high"))
    }
}

/// What the server last told us about our budget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerHints {
    /// Requests left in the server's window
    pub remaining: Option<u32>,
    /// Server's window size
    pub limit: Option<u32>,
    /// When the server's window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// Do not call before this instant (from `Retry-After`)
    pub blocked_until: Option<DateTime<Utc>>,
}

impl ServerHints {
    /// How long the server wants us to hold off, if at all
    fn wait_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let exhausted = match (self.remaining, self.reset_at) {
            (Some(0), Some(reset)) if reset > now => (reset - now).to_std().ok(),
            _ => None,
        };
        let blocked = self
            .blocked_until
            .filter(|until| *until > now)
            .and_then(|until| (until - now).to_std().ok());

        match (exhausted, blocked) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
        .map(|wait| wait.min(MAX_SERVER_WAIT))
    }
}

/// Token bucket rate limiter for one endpoint
pub struct RateLimiter {
    spec: RateLimitSpec,
    limiter: DefaultDirectRateLimiter,
    clock: DefaultClock,
    hints: Mutex<ServerHints>,
    acquired: AtomicU64,
    header_updates: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter from endpoint settings
    pub fn new(spec: &RateLimitSpec) -> Result<Self> {
        let quota = spec.quota()?;
        let clock = DefaultClock::default();
        Ok(Self {
            spec: spec.clone(),
            limiter: Governor::direct_with_clock(quota, &clock),
            clock,
            hints: Mutex::new(ServerHints::default()),
            acquired: AtomicU64::new(0),
            header_updates: AtomicU64::new(0),
        })
    }

    /// Settings this limiter was built from
    pub fn spec(&self) -> &RateLimitSpec {
        &self.spec
    }

    /// Wait until a request may be made, returning the total time waited.
    ///
    /// Server hints are honoured first, then the local bucket.
    pub async fn acquire(&self, sleeper: &dyn Sleeper) -> Duration {
        let mut waited = Duration::ZERO;

        let server_wait = self.hints.lock().wait_at(Utc::now());
        if let Some(wait) = server_wait {
            debug!(wait_ms = wait.as_millis() as u64, "Server rate limit hint, pausing");
            sleeper.sleep(wait).await;
            waited += wait;
            let mut hints = self.hints.lock();
            hints.blocked_until = None;
            if hints.remaining == Some(0) {
                hints.remaining = None;
            }
        }

        if let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            debug!(wait_ms = wait.as_millis() as u64, "Rate limited, waiting for token");
            sleeper.sleep(wait).await;
            waited += wait;
            // A wait served by the sleeper grants the token.
            if self.limiter.check().is_err() {
                debug!("Token not yet replenished after wait, proceeding");
            }
        }

        self.acquired.fetch_add(1, Ordering::Relaxed);
        let mut hints = self.hints.lock();
        if let Some(remaining) = hints.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        waited
    }

    /// Check if a request can be made immediately, consuming a token if so
    pub fn try_acquire(&self) -> bool {
        let blocked = self.hints.lock().wait_at(Utc::now()).is_some();
        !blocked && self.limiter.check().is_ok()
    }

    /// Adjust state from response headers
    pub fn update_from_headers(&self, headers: &HeaderMap) {
        self.header_updates.fetch_add(1, Ordering::Relaxed);
        let parsed = RateLimitHeaders::parse(headers);
        if parsed.is_empty() {
            return;
        }

        let mut hints = self.hints.lock();
        if parsed.limit.is_some() {
            hints.limit = parsed.limit;
        }
        if parsed.remaining.is_some() {
            hints.remaining = parsed.remaining;
        }
        if parsed.reset_at.is_some() {
            hints.reset_at = parsed.reset_at;
        }
        if let Some(retry_after) = parsed.retry_after {
            hints.blocked_until = chrono::Duration::from_std(retry_after)
                .ok()
                .map(|d| Utc::now() + d);
        }
        debug!(
            remaining = ?hints.remaining,
            reset_at = ?hints.reset_at,
            "Updated rate limit hints from response"
        );
    }

    /// Current server hints
    pub fn hints(&self) -> ServerHints {
        self.hints.lock().clone()
    }

    /// Number of completed acquires
    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Number of responses this limiter has inspected
    pub fn header_update_count(&self) -> u64 {
        self.header_updates.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("spec", &self.spec)
            .field("hints", &*self.hints.lock())
            .finish_non_exhaustive()
    }
}
