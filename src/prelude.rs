//! Prelude module for forklet
//!
//! Re-exports the items needed for typical library usage with a single
//! `use forklet::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use forklet::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let reference =
//!         RepositoryReference::tag(Repository::parse("octo/hello")?, "v1.0.0");
//!     let request = DownloadRequest::builder(reference, "./hello").build();
//!
//!     let orchestrator = DownloadOrchestrator::new(
//!         Arc::new(GitHubClient::new()?),
//!         Arc::new(FsStorageWriter::new()),
//!     );
//!     let result = orchestrator.execute(request).await;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

pub use crate::app::{
    ClientConfig, DownloadOrchestrator, DownloadRequest, DownloadResult, DownloadSession,
    DownloadStatus, DownloadStrategy, FilterCriteria, FsStorageWriter, GitHubClient,
    OrchestratorConfig, ProgressSnapshot, RemoteFile, Repository, RepositoryContentClient,
    RepositoryReference, StorageWriter,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_WORKER_COUNT, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
