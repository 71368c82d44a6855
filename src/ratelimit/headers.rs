//! Rate limit header parsing
//!
//! Reads the standard `X-RateLimit-*` family, the IETF `RateLimit-*` draft
//! headers and `Retry-After`.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Values above this are treated as Unix timestamps rather than deltas
const EPOCH_THRESHOLD_SECS: f64 = 1_000_000_000.0;

/// Parsed rate limit information from HTTP headers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// Maximum requests allowed in the window
    pub limit: Option<u32>,
    /// Remaining requests in the current window
    pub remaining: Option<u32>,
    /// When the window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// Server-requested pause (from `Retry-After`)
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    /// Parse headers relative to the current time
    pub fn parse(headers: &HeaderMap) -> Self {
        Self::parse_at(headers, Utc::now())
    }

    /// Parse headers relative to `now`
    pub fn parse_at(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let limit = first_number(
            headers,
            &["x-ratelimit-limit", "x-rate-limit-limit", "ratelimit-limit"],
        )
        .map(|v| v as u32);

        let remaining = first_number(
            headers,
            &[
                "x-ratelimit-remaining",
                "x-rate-limit-remaining",
                "ratelimit-remaining",
            ],
        )
        .map(|v| v as u32);

        let reset_at = first_number(
            headers,
            &["x-ratelimit-reset", "x-rate-limit-reset", "ratelimit-reset"],
        )
        .and_then(|value| reset_to_instant(value, now));

        let retry_after =
            header_str(headers, "retry-after").and_then(|v| parse_retry_after(v, now));

        Self {
            limit,
            remaining,
            reset_at,
            retry_after,
        }
    }

    /// True when no rate-limit information was present
    pub fn is_empty(&self) -> bool {
        self.limit.is_none()
            && self.remaining.is_none()
            && self.reset_at.is_none()
            && self.retry_after.is_none()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn first_number(headers: &HeaderMap, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .filter_map(|name| header_str(headers, name))
        .find_map(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Reset headers carry either a Unix timestamp or seconds-until-reset
fn reset_to_instant(value: f64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if value >= EPOCH_THRESHOLD_SECS {
        let millis = (value * 1000.0) as i64;
        DateTime::<Utc>::from_timestamp_millis(millis)
    } else {
        let delta = chrono::Duration::milliseconds((value * 1000.0) as i64);
        Some(now + delta)
    }
}

/// `Retry-After` is either delta-seconds or an HTTP date
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    (date - now).to_std().ok()
}
