//! Download orchestration
//!
//! This module turns a [`DownloadRequest`] into a concurrently executed set of
//! per-file transfers and a structured [`DownloadResult`].
//!
//! # Key Features
//!
//! - **Bounded concurrency**: at most `max_concurrent_workers` transfers in
//!   flight, slots recycled as files finish
//! - **Failure isolation**: a failed file is recorded and its siblings carry on
//! - **Cooperative control**: cancel and pause take effect before the next
//!   file starts; files already in flight complete
//! - **Live progress**: counters, throughput and ETA readable at any time
//!
//! # Architecture
//!
//! - [`config`] - Concurrency limits and progress logging
//! - [`control`] - Cancellation token and pause flag of a run
//! - [`progress`] - Progress counters and snapshots
//! - [`session`] - Per-run state and the dispatch loop
//! - [`task`] - The transfer of a single file
//!
//! Every run gets its own [`DownloadSession`]. The orchestrator remembers the
//! most recently started session that is still running so that its own
//! `cancel`, `pause`, `resume` and `current_progress` can reach it; once the
//! run finishes those calls return `None`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use forklet::app::{
//!     DownloadOrchestrator, DownloadRequest, FsStorageWriter, GitHubClient, Repository,
//!     RepositoryReference,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = DownloadOrchestrator::new(
//!     Arc::new(GitHubClient::new()?),
//!     Arc::new(FsStorageWriter::new()),
//! );
//!
//! let reference = RepositoryReference::branch(Repository::new("octo", "hello"), "main");
//! let request = DownloadRequest::builder(reference, "./hello").build();
//!
//! let result = orchestrator.execute(request).await;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod progress;
pub mod session;
pub mod task;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::app::client::RepositoryContentClient;
use crate::app::models::{DownloadRequest, DownloadResult};
use crate::app::storage::StorageWriter;

pub use config::OrchestratorConfig;
pub use control::RunControl;
pub use progress::{format_duration, ProgressSnapshot, ProgressTracker};
pub use session::DownloadSession;
pub use task::FileOutcome;

use session::FinishGuard;

/// Runs download requests against a content client and a storage writer
#[derive(Clone)]
pub struct DownloadOrchestrator {
    client: Arc<dyn RepositoryContentClient>,
    writer: Arc<dyn StorageWriter>,
    config: OrchestratorConfig,
    active: Arc<RwLock<Option<DownloadSession>>>,
}

impl DownloadOrchestrator {
    /// Create an orchestrator with default configuration
    pub fn new(client: Arc<dyn RepositoryContentClient>, writer: Arc<dyn StorageWriter>) -> Self {
        Self {
            client,
            writer,
            config: OrchestratorConfig::default(),
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the configuration
    ///
    /// An invalid configuration is logged and the defaults are kept.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        match config.validate() {
            Ok(()) => self.config = config,
            Err(e) => warn!("Ignoring invalid orchestrator configuration: {}", e),
        }
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run `request` to completion
    ///
    /// Never returns an error: whole-run failures are reported through
    /// [`DownloadResult::status`] and [`DownloadResult::error_message`].
    pub async fn execute(&self, request: DownloadRequest) -> DownloadResult {
        let session = self.register(request).await;
        self.drive(session).await
    }

    /// Start `request` in the background and return its session handle
    pub async fn start(&self, request: DownloadRequest) -> DownloadSession {
        let session = self.register(request).await;
        let this = self.clone();
        let background = session.clone();
        tokio::spawn(async move {
            this.drive(background).await;
        });
        session
    }

    async fn register(&self, request: DownloadRequest) -> DownloadSession {
        let session = DownloadSession::new(request);
        session.mark_started().await;
        let mut active = self.active.write().await;
        if let Some(previous) = active.as_ref().filter(|s| !s.is_finished()) {
            warn!(
                "Download {} is still running; control calls now target {}",
                previous.request_id(),
                session.request_id()
            );
        }
        *active = Some(session.clone());
        session
    }

    async fn drive(&self, session: DownloadSession) -> DownloadResult {
        let guard = FinishGuard::new(&session);
        let result = session
            .run(Arc::clone(&self.client), Arc::clone(&self.writer), &self.config)
            .await;

        {
            let mut active = self.active.write().await;
            if active.as_ref().is_some_and(|s| s.same_run(&session)) {
                *active = None;
            }
        }

        drop(guard);
        result
    }

    async fn active_session(&self) -> Option<DownloadSession> {
        self.active.read().await.clone()
    }

    /// Cancel the active run
    ///
    /// Returns the run's current result, or `None` when nothing is running.
    pub async fn cancel(&self) -> Option<DownloadResult> {
        match self.active_session().await {
            Some(session) => Some(session.cancel().await),
            None => {
                debug!("Cancel requested with no active download");
                None
            }
        }
    }

    /// Pause the active run
    pub async fn pause(&self) -> Option<DownloadResult> {
        match self.active_session().await {
            Some(session) => Some(session.pause().await),
            None => {
                debug!("Pause requested with no active download");
                None
            }
        }
    }

    /// Resume the active run
    pub async fn resume(&self) -> Option<DownloadResult> {
        match self.active_session().await {
            Some(session) => Some(session.resume().await),
            None => {
                debug!("Resume requested with no active download");
                None
            }
        }
    }

    /// Progress of the active run
    pub async fn current_progress(&self) -> Option<ProgressSnapshot> {
        match self.active_session().await {
            Some(session) => Some(session.progress().await),
            None => None,
        }
    }
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
