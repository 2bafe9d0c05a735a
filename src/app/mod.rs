//! Core application logic for forklet
//!
//! This module contains the GitHub client, data models, path filtering,
//! local storage and the download orchestrator.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use forklet::app::{
//!     DownloadOrchestrator, DownloadRequest, FilterCriteria, FsStorageWriter, GitHubClient,
//!     Repository,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GitHubClient::new()?;
//! let reference = client
//!     .resolve_reference(&Repository::parse("rust-lang/log")?, Some("master"))
//!     .await?;
//!
//! let request = DownloadRequest::builder(reference, "./log")
//!     .filters(FilterCriteria::default().with_include_patterns(["src/*.rs"]))
//!     .build();
//!
//! let orchestrator = DownloadOrchestrator::new(Arc::new(client), Arc::new(FsStorageWriter::new()));
//! let result = orchestrator.execute(request).await;
//! for path in &result.downloaded_files {
//!     println!("Downloaded {}", path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod filter;
pub mod models;
pub mod orchestrator;
pub mod storage;

// Re-export main public API
pub use client::{ClientConfig, GitHubClient, RateLimitInfo, RepositoryContentClient};
pub use filter::{FilterCriteria, FilterEngine, FilterResult};
pub use models::{
    DownloadRequest, DownloadRequestBuilder, DownloadResult, DownloadStatus, DownloadStrategy,
    EntryKind, RefKind, RemoteFile, Repository, RepositoryReference,
};
pub use orchestrator::{
    DownloadOrchestrator, DownloadSession, OrchestratorConfig, ProgressSnapshot, RunControl,
};
pub use storage::{FsStorageWriter, StorageWriter};
