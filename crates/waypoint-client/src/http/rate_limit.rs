//! Rate-limit response metadata
//!
//! The client never throttles or retries on 429 by itself. It only reads the
//! rate-limit headers so the calling feature can decide when to try again.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

pub const RETRY_AFTER: &str = "retry-after";
pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Rate-limit headers retained from a response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Seconds to wait, from `retry-after` (delta-seconds or HTTP date)
    pub retry_after: Option<u64>,
    /// Requests allowed in the current window
    pub limit: Option<u64>,
    /// Requests left in the current window
    pub remaining: Option<u64>,
    /// Window reset, as sent by the server (epoch seconds or seconds from now)
    pub reset: Option<u64>,
}

impl RateLimitInfo {
    /// Read the rate-limit headers, `None` when the response carries none of them
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Self::from_headers_at(headers, Utc::now())
    }

    fn from_headers_at(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Self> {
        let info = Self {
            retry_after: header_str(headers, RETRY_AFTER).and_then(|v| parse_retry_after(v, now)),
            limit: header_u64(headers, RATE_LIMIT_LIMIT),
            remaining: header_u64(headers, RATE_LIMIT_REMAINING),
            reset: header_u64(headers, RATE_LIMIT_RESET),
        };

        if info.is_empty() {
            None
        } else {
            Some(info)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.retry_after.is_none()
            && self.limit.is_none()
            && self.remaining.is_none()
            && self.reset.is_none()
    }

    /// True when the server reported an exhausted window
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| v.parse::<u64>().ok())
}

fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    // HTTP-date form; a date in the past means "retry now"
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc).signed_duration_since(now).num_seconds();
    Some(delta.max(0) as u64)
}
