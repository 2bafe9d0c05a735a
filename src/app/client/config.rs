//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! used for GitHub API and raw content requests.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{github, http, limits};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the GitHub HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// REST API base URL
    pub api_base_url: String,
    /// Raw content base URL
    pub raw_base_url: String,
    /// Personal access token sent as a bearer credential
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Client-side request quota (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for transient failures (connection errors, 429, 5xx)
    pub max_retries: u32,
    /// First retry delay
    #[serde(with = "humantime_serde")]
    pub retry_initial_interval: Duration,
    /// Ceiling for a single retry delay
    #[serde(with = "humantime_serde")]
    pub retry_max_interval: Duration,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: github::API_BASE_URL.to_string(),
            raw_base_url: github::RAW_BASE_URL.to_string(),
            token: None,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_initial_interval: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            retry_max_interval: Duration::from_secs(limits::MAX_BACKOFF_SECS),
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_raw_base_url(mut self, url: impl Into<String>) -> Self {
        self.raw_base_url = url.into();
        self
    }

    pub fn with_rate_limit(mut self, rps: u32) -> Self {
        self.rate_limit_rps = rps;
        self
    }

    /// Set retry count and delays
    pub fn with_retries(mut self, max_retries: u32, initial: Duration, max: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_initial_interval = initial;
        self.retry_max_interval = max;
        self
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("api_base_url", &self.api_base_url),
            ("raw_base_url", &self.raw_base_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }

        if self.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be greater than 0".to_string(),
            });
        }

        if self.retry_initial_interval > self.retry_max_interval {
            return Err(ConfigError::InvalidValue {
                field: "retry_initial_interval".to_string(),
                value: format!("{:?}", self.retry_initial_interval),
                reason: "Initial retry interval cannot exceed the maximum interval".to_string(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout".to_string(),
                value: "0s".to_string(),
                reason: "Request timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    fn default_headers(&self) -> ConfigResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(github::ACCEPT_JSON));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(github::API_VERSION),
        );

        if let Some(token) = &self.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(
                |_| ConfigError::InvalidValue {
                    field: "token".to_string(),
                    value: "<redacted>".to_string(),
                    reason: "Token contains characters not allowed in a header".to_string(),
                },
            )?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Builds the HTTP client with the specified configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the token is not a valid header value or the
    /// underlying client cannot be constructed.
    pub fn build_http_client(&self) -> ConfigResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .default_headers(self.default_headers()?)
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        Ok(client_builder.build()?)
    }
}
