//! Configuration management for forklet
//!
//! Settings are layered: built-in defaults, then a TOML file, then the
//! environment (including a `.env` file loaded by the binary), and finally
//! command-line flags applied by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, OrchestratorConfig};
use crate::constants::{env, files, github, http, limits, progress, workers};
use crate::errors::{ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// GitHub client settings
    pub client: ClientSection,
    /// Defaults for download requests and orchestration
    pub download: DownloadSection,
    /// Logging configuration
    pub logging: LoggingSection,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// REST API base URL
    pub api_base_url: String,
    /// Raw content base URL
    pub raw_base_url: String,
    /// Personal access token; `GITHUB_TOKEN` takes precedence
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for transient failures
    pub max_retries: u32,
    /// First backoff delay
    #[serde(with = "humantime_serde")]
    pub retry_initial_interval: Duration,
    /// Backoff ceiling
    #[serde(with = "humantime_serde")]
    pub retry_max_interval: Duration,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
}

impl Default for ClientSection {
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
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

/// TOML-friendly download defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    /// Concurrent transfers per run unless overridden
    pub workers: usize,
    /// Upper bound on concurrent transfers
    pub max_workers: usize,
    /// Per-file fetch timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Replace files that already exist locally
    pub overwrite_existing: bool,
    /// Keep the repository directory layout
    pub preserve_structure: bool,
    /// Create the destination directory when missing
    pub create_destination: bool,
    /// Show progress bars
    pub show_progress: bool,
    /// How often a running download logs progress
    #[serde(with = "humantime_serde")]
    pub progress_log_interval: Duration,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            workers: workers::DEFAULT_WORKER_COUNT,
            max_workers: workers::MAX_WORKER_COUNT,
            timeout: workers::DEFAULT_REQUEST_TIMEOUT,
            overwrite_existing: false,
            preserve_structure: true,
            create_destination: true,
            show_progress: true,
            progress_log_interval: progress::LOG_INTERVAL,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default log level when no verbosity flag is given
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, `./forklet.toml`, then the user config dir)
    /// 3. Environment variables
    ///
    /// CLI flags are applied afterwards by the caller.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly named file is missing, or any file found cannot
    /// be read or parsed.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_file_override {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound { path }.into());
            }
            Some(path) => Self::load_from_file(&path).await?,
            None => match Self::find_config_file() {
                Some(path) => Self::load_from_file(&path).await?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(env::GITHUB_TOKEN).filter(|t| !t.trim().is_empty()) {
            debug!("Using token from {}", env::GITHUB_TOKEN);
            self.client.token = Some(token);
        }
        if let Some(url) = lookup(env::GITHUB_API_URL).filter(|u| !u.trim().is_empty()) {
            debug!("Using API base URL from {}", env::GITHUB_API_URL);
            self.client.api_base_url = url;
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let search_paths = [
            Some(PathBuf::from(files::LOCAL_CONFIG_FILE)),
            Self::default_config_path(),
        ];

        let found = search_paths.into_iter().flatten().find(|p| p.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// The per-user config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("forklet").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Runtime client configuration
    pub fn to_client_config(&self) -> ClientConfig {
        let section = &self.client;
        let config = ClientConfig::default()
            .with_api_base_url(section.api_base_url.clone())
            .with_raw_base_url(section.raw_base_url.clone())
            .with_rate_limit(section.rate_limit_rps)
            .with_retries(
                section.max_retries,
                section.retry_initial_interval,
                section.retry_max_interval,
            );

        let config = ClientConfig {
            request_timeout: section.request_timeout,
            connect_timeout: section.connect_timeout,
            pool_max_per_host: section.pool_max_per_host,
            ..config
        };

        match &section.token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }

    /// Runtime orchestrator configuration
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_workers(self.download.workers, self.download.max_workers)
            .with_progress_log_interval(self.download.progress_log_interval)
    }
}
