//! Retry classification for GitHub REST responses.
//!
//! GitHub throttles with a `429`, with a `403` whose `x-ratelimit-remaining`
//! is `0` (primary limit) or with a `403` carrying `retry-after` (secondary
//! limit). Server-requested waits are honored up to [`MAX_RATE_LIMIT_WAIT`];
//! anything longer fails the request so one exhausted quota cannot stall a
//! whole traversal for an hour.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const RETRY_AFTER: &str = "retry-after";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests allowed, first attempt included.
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms.max(1)),
        }
    }

    /// Exponential backoff after the `attempt`-th request (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10) as u32;
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(MAX_BACKOFF)
    }

    pub fn on_status(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        attempt: usize,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Fail;
        }
        let throttled = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && is_rate_limited(headers));
        if throttled {
            return match server_wait(headers, now) {
                Some(wait) if wait > MAX_RATE_LIMIT_WAIT => RetryDecision::Fail,
                Some(wait) => RetryDecision::RetryAfter(wait.max(self.base_delay)),
                None => RetryDecision::RetryAfter(self.backoff(attempt)),
            };
        }
        if status.is_server_error() {
            return RetryDecision::RetryAfter(self.backoff(attempt));
        }
        RetryDecision::Fail
    }

    pub fn on_transport_error(&self, error: &reqwest::Error, attempt: usize) -> RetryDecision {
        let transient = error.is_timeout() || error.is_connect() || error.is_request();
        if transient && attempt < self.max_attempts {
            RetryDecision::RetryAfter(self.backoff(attempt))
        } else {
            RetryDecision::Fail
        }
    }
}

/// Wait the server asked for: `retry-after` as seconds or an HTTP date, else
/// the primary quota reset time once `x-ratelimit-remaining` hits zero.
pub fn server_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(raw) = header_str(headers, RETRY_AFTER) {
        return parse_retry_after(raw, now);
    }
    if header_str(headers, RATE_LIMIT_REMAINING)?.trim() != "0" {
        return None;
    }
    let reset = header_str(headers, RATE_LIMIT_RESET)?
        .trim()
        .parse::<i64>()
        .ok()?;
    Some(until(DateTime::<Utc>::from_timestamp(reset, 0)?, now))
}

fn is_rate_limited(headers: &HeaderMap) -> bool {
    headers.contains_key(RETRY_AFTER)
        || header_str(headers, RATE_LIMIT_REMAINING).is_some_and(|raw| raw.trim() == "0")
}

fn parse_retry_after(raw: &str, now: DateTime<Utc>) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some(until(at, now))
}

fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}
