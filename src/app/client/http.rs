//! Core HTTP operations with rate limiting and retry logic
//!
//! Every request waits on a local `governor` quota, then goes out under an
//! exponential backoff policy. Connection errors, 429 and 5xx responses are
//! retried; everything else is returned to the caller on first sight.
//! Rate-limit headers from any response are remembered.

use std::num::NonZeroU32;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::RwLock;
use url::Url;

use super::config::ClientConfig;
use super::rate_limit::RateLimitInfo;
use crate::constants::limits;
use crate::errors::{ConfigError, ConfigResult};

/// Why a request did not produce a successful response
#[derive(Debug)]
pub enum HttpFailure {
    /// The request could not be completed
    Transport {
        source: reqwest::Error,
        attempts: u32,
    },
    /// The server answered with a non-success status
    Status {
        status: StatusCode,
        rate_limit: Option<RateLimitInfo>,
        attempts: u32,
    },
}

impl HttpFailure {
    /// Whether retries were spent before giving up
    pub fn retried(&self) -> bool {
        match self {
            Self::Transport { attempts, .. } | Self::Status { attempts, .. } => *attempts > 1,
        }
    }
}

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
    last_rate_limit: RwLock<Option<RateLimitInfo>>,
}

impl HttpHandler {
    /// Creates a new HttpHandler from a built client and its configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the rate limit is zero
    pub fn new(client: Client, config: &ClientConfig) -> ConfigResult<Self> {
        Ok(Self {
            client,
            rate_limiter: Self::build_rate_limiter(config.rate_limit_rps)?,
            max_retries: config.max_retries,
            initial_interval: config.retry_initial_interval,
            max_interval: config.retry_max_interval,
            last_rate_limit: RwLock::new(None),
        })
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> ConfigResult<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    fn is_transient_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_transient_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    /// GET `url`, returning the response only if its status is a success
    ///
    /// # Errors
    ///
    /// Returns [`HttpFailure`] after retries are spent on a transient failure,
    /// or immediately on a permanent one.
    pub async fn get(&self, url: &Url) -> Result<Response, HttpFailure> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempts = 0u32;
        let max_attempts = self.max_retries.saturating_add(1);

        backoff::future::retry(policy, || {
            attempts += 1;
            let attempt = attempts;
            async move {
                self.rate_limiter
                    .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(
                        limits::RATE_LIMIT_JITTER_MS,
                    )))
                    .await;

                let response = match self.client.get(url.as_str()).send().await {
                    Ok(response) => response,
                    Err(source) => {
                        let transient = Self::is_transient_error(&source);
                        let failure = HttpFailure::Transport {
                            source,
                            attempts: attempt,
                        };
                        return if transient && attempt < max_attempts {
                            tracing::warn!(
                                "Request to {} failed (attempt {}/{}), retrying",
                                url,
                                attempt,
                                max_attempts
                            );
                            Err(backoff::Error::transient(failure))
                        } else {
                            Err(backoff::Error::permanent(failure))
                        };
                    }
                };

                let rate_limit = RateLimitInfo::from_headers(response.headers());
                if let Some(info) = &rate_limit {
                    *self.last_rate_limit.write().await = Some(info.clone());
                }

                let status = response.status();
                if status.is_success() {
                    tracing::debug!("GET {} -> {}", url, status);
                    return Ok(response);
                }

                let failure = HttpFailure::Status {
                    status,
                    rate_limit,
                    attempts: attempt,
                };
                if Self::is_transient_status(status) && attempt < max_attempts {
                    tracing::warn!(
                        "GET {} returned {} (attempt {}/{}), backing off",
                        url,
                        status,
                        attempt,
                        max_attempts
                    );
                    Err(backoff::Error::transient(failure))
                } else {
                    Err(backoff::Error::permanent(failure))
                }
            }
        })
        .await
    }

    /// Retries allowed after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Most recent rate-limit information seen in a response
    pub async fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        self.last_rate_limit.read().await.clone()
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
