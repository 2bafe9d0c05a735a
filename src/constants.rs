//! Application constants for forklet
//!
//! This module centralizes the constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Personal access token used for API and raw content requests
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";

    /// Overrides the API base URL (GitHub Enterprise)
    pub const GITHUB_API_URL: &str = "FORKLET_API_URL";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("forklet/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;
}

/// GitHub endpoints and media types
pub mod github {
    /// REST API base URL
    pub const API_BASE_URL: &str = "https://api.github.com";

    /// Raw content base URL
    pub const RAW_BASE_URL: &str = "https://raw.githubusercontent.com";

    /// Accept header for REST API calls
    pub const ACCEPT_JSON: &str = "application/vnd.github+json";

    /// API version header value
    pub const API_VERSION: &str = "2022-11-28";

    /// Git file mode of symbolic links in tree listings
    pub const SYMLINK_MODE: &str = "120000";

    /// Remaining-call threshold at which the quota is treated as exhausted
    pub const RATE_LIMIT_EXHAUSTED_THRESHOLD: u64 = 10;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default client-side request quota (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;

    /// Maximum retry attempts for transient request failures
    pub const MAX_RETRIES: u32 = 3;

    /// Initial delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Maximum backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 30;

    /// Jitter applied to the client-side rate limiter (milliseconds)
    pub const RATE_LIMIT_JITTER_MS: u64 = 50;
}

/// Worker and concurrency configuration
pub mod workers {
    use super::Duration;

    /// Default number of concurrent file transfers
    pub const DEFAULT_WORKER_COUNT: usize = 5;

    /// Upper bound on concurrent file transfers
    pub const MAX_WORKER_COUNT: usize = 64;

    /// Default per-file fetch timeout
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic writes
    pub const TEMP_FILE_SUFFIX: &str = ".part";

    /// Chunk size for writes (64KB)
    pub const WRITE_CHUNK_SIZE: usize = 64 * 1024;

    /// Local configuration file name searched in the working directory
    pub const LOCAL_CONFIG_FILE: &str = "forklet.toml";
}

/// Progress reporting and monitoring
pub mod progress {
    use super::Duration;

    /// Elapsed time below which throughput is not computed (seconds)
    pub const MIN_ELAPSED_SECS: f64 = 1e-3;

    /// How often the CLI redraws the overall progress bar
    pub const DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

    /// How often plain-text progress is printed when stderr is not a terminal
    pub const TEXT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

    /// How often a running session logs a progress line
    pub const LOG_INTERVAL: Duration = Duration::from_secs(30);
}

/// Filter defaults
pub mod filter {
    /// Extensions treated as binary when binary files are excluded
    pub const BINARY_EXTENSIONS: &[&str] = &[
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "gz", "tgz", "bz2",
        "xz", "7z", "rar", "tar", "jar", "war", "class", "exe", "dll", "so", "dylib", "a", "o",
        "bin", "wasm", "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "mov", "avi", "wav",
        "ogg", "flac", "pyc", "db", "sqlite",
    ];
}

/// Run status policy
pub mod policy {
    /// Per-file failures never turn a run that executed into a failed run.
    /// Callers inspect the failed-files map for partial failure detail.
    pub const PARTIAL_FAILURE_FAILS_RUN: bool = false;
}

// Re-export commonly used constants for convenience
pub use env::GITHUB_TOKEN as ENV_GITHUB_TOKEN;
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES};
pub use workers::DEFAULT_WORKER_COUNT;
