//! Error types for forklet
//!
//! Errors are split by the boundary they cross. Listing and destination errors
//! abort a whole run, fetch and write errors are isolated to the file they
//! belong to, and everything funnels into [`AppError`] at the binary edge.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while listing a repository tree
#[derive(Error, Debug)]
pub enum ListingError {
    /// HTTP request failed
    #[error("HTTP request failed while listing repository: {0}")]
    Http(#[from] reqwest::Error),

    /// Repository or reference does not exist (or is not visible to the token)
    #[error("Repository or reference not found: {resource}")]
    NotFound { resource: String },

    /// Credentials rejected
    #[error("Not authorized to list repository (HTTP {status}). Check GITHUB_TOKEN")]
    Unauthorized { status: u16 },

    /// API quota exhausted
    #[error("GitHub API rate limit exceeded, resets in {reset_in_secs} seconds")]
    RateLimited { reset_in_secs: u64 },

    /// Server returned an unexpected error status
    #[error("Server error while listing repository: HTTP {status}")]
    Server { status: u16 },

    /// Response body could not be understood
    #[error("Invalid tree listing response: {reason}")]
    InvalidResponse { reason: String },

    /// Generic listing failure
    #[error("{0}")]
    Other(String),
}

/// Errors raised while fetching the content of a single file
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// File no longer exists at the download URL
    #[error("File not found: {url}")]
    NotFound { url: String },

    /// Access denied for the download URL
    #[error("Access forbidden: {url}")]
    Forbidden { url: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimited,

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    /// Remote file carries no usable URL
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Fetch exceeded the per-request timeout
    #[error("Download timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for download")]
    MaxRetriesExceeded { max_retries: u32 },

    /// Generic fetch failure
    #[error("{0}")]
    Other(String),
}

/// Local storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Destination directory missing or could not be created
    #[error("Destination not usable: {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination is absent and creating it is not allowed
    #[error("Destination does not exist and creation is disabled: {path}")]
    DestinationMissing { path: PathBuf },

    /// Writing file content failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Atomic rename of the temporary file failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicRename {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Repository and reference construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReferenceError {
    /// Commit references must carry a SHA
    #[error("Commit reference '{name}' requires a SHA")]
    MissingSha { name: String },

    /// Owner or name missing
    #[error("Invalid repository '{input}'. Expected OWNER/NAME")]
    InvalidRepository { input: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// HTTP client could not be built from configuration
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors that stop a run before any file work starts
#[derive(Error, Debug)]
pub enum RunError {
    /// Destination setup failed
    #[error(transparent)]
    Destination(#[from] StorageError),

    /// Repository listing failed
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// The request itself is unusable
    #[error("Invalid download request: {reason}")]
    InvalidRequest { reason: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Listing error
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Reference error
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Whole-run error
    #[error(transparent)]
    Run(#[from] RunError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Fetch(FetchError::Timeout { .. })
                | AppError::Fetch(FetchError::RateLimited)
                | AppError::Fetch(FetchError::Server { .. })
                | AppError::Fetch(FetchError::Http(_))
                | AppError::Listing(ListingError::Http(_))
                | AppError::Listing(ListingError::RateLimited { .. })
                | AppError::Listing(ListingError::Server { .. })
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Listing(_) => "listing",
            AppError::Fetch(_) => "fetch",
            AppError::Storage(_) => "storage",
            AppError::Reference(_) => "reference",
            AppError::Config(_) => "config",
            AppError::Run(_) => "run",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Listing result type alias
pub type ListingResult<T> = std::result::Result<T, ListingError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
