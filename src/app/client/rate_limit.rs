//! GitHub API quota information

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::constants::github;

/// Remaining API quota as reported by GitHub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed per window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Requests spent in the current window
    pub used: u64,
    /// When the window resets
    pub reset: DateTime<Utc>,
}

/// `rate` object of the `/rate_limit` endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub rate: RateLimitBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitBody {
    pub limit: u64,
    pub remaining: u64,
    #[serde(default)]
    pub used: u64,
    pub reset: i64,
}

impl From<RateLimitBody> for RateLimitInfo {
    fn from(body: RateLimitBody) -> Self {
        Self {
            limit: body.limit,
            remaining: body.remaining,
            used: body.used,
            reset: epoch_to_utc(body.reset),
        }
    }
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

impl RateLimitInfo {
    /// Parse `x-ratelimit-*` response headers
    ///
    /// Returns `None` unless at least the limit and remaining headers are
    /// present and numeric.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let number = |name: &str| -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        };

        let limit = number("x-ratelimit-limit")?;
        let remaining = number("x-ratelimit-remaining")?;
        let used = number("x-ratelimit-used").unwrap_or_else(|| limit.saturating_sub(remaining));
        let reset = number("x-ratelimit-reset")
            .and_then(|secs| i64::try_from(secs).ok())
            .map(epoch_to_utc)
            .unwrap_or_else(Utc::now);

        Some(Self {
            limit,
            remaining,
            used,
            reset,
        })
    }

    /// Whether the quota is low enough that further calls should wait
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= github::RATE_LIMIT_EXHAUSTED_THRESHOLD
    }

    /// Time until the window resets, never negative
    pub fn reset_in(&self) -> Duration {
        self.reset
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4990"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("4102444800"));

        let info = RateLimitInfo::from_headers(&headers).unwrap();
        assert_eq!(info.limit, 5000);
        assert_eq!(info.used, 10);
        assert!(!info.is_exhausted());
        assert!(info.reset_in() > Duration::ZERO);
    }

    #[test]
    fn test_missing_headers() {
        assert!(RateLimitInfo::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_exhaustion_and_past_reset() {
        let info = RateLimitInfo {
            limit: 60,
            remaining: 10,
            used: 50,
            reset: Utc::now() - chrono::Duration::seconds(30),
        };
        assert!(info.is_exhausted());
        assert_eq!(info.reset_in(), Duration::ZERO);
    }
}
