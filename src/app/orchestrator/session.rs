//! Download sessions
//!
//! A [`DownloadSession`] owns everything about one run: the request, its
//! [`RunControl`] and the ledger holding result collections and progress
//! counters behind a single lock. Sessions are cheap handles; clones share
//! the same run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::OrchestratorConfig;
use super::control::RunControl;
use super::progress::{ProgressSnapshot, ProgressTracker};
use super::task::{self, FileOutcome};
use crate::app::client::RepositoryContentClient;
use crate::app::filter::FilterEngine;
use crate::app::models::{
    DownloadRequest, DownloadResult, DownloadStatus, DownloadStrategy, RemoteFile,
};
use crate::app::storage::StorageWriter;
use crate::constants::policy;
use crate::errors::{RunError, StorageError};

/// Result collections and progress counters of one run
#[derive(Debug)]
pub struct RunLedger {
    result: DownloadResult,
    tracker: ProgressTracker,
}

impl RunLedger {
    fn new(request: DownloadRequest) -> Self {
        Self {
            result: DownloadResult::new(request),
            tracker: ProgressTracker::new(),
        }
    }

    pub(crate) fn record_start(&mut self, path: &str) {
        self.tracker.record_file_start(path);
    }

    /// Fold one file outcome into the collections and counters
    fn merge(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Downloaded { path, bytes, .. } => {
                self.result.downloaded_files.push(path);
                self.tracker.record_file_complete(bytes);
            }
            FileOutcome::Skipped { path } => {
                self.result.skipped_files.push(path);
                self.tracker.record_file_skipped();
            }
            FileOutcome::Failed { path, error } => {
                self.result.failed_files.insert(path, error);
                self.tracker.record_file_failed();
            }
        }
    }

    fn mark_pending(&mut self, path: String) {
        self.result.pending_files.push(path);
    }

    /// Result as seen from outside, with live progress and derived status
    ///
    /// Paused and cancelled are only derived for a run in progress; a run
    /// that never started stays pending.
    fn view(&self, control: &RunControl) -> DownloadResult {
        let mut result = self.result.clone();
        if !result.status.is_terminal() {
            result.progress = self.tracker.snapshot();
        }
        if result.status == DownloadStatus::InProgress {
            if control.is_cancelled() {
                result.status = DownloadStatus::Cancelled;
            } else if control.is_paused() {
                result.status = DownloadStatus::Paused;
            }
        }
        result
    }

    fn finish(&mut self, status: DownloadStatus, error_message: Option<String>) -> DownloadResult {
        self.result.status = status;
        self.result.error_message = error_message;
        self.result.completed_at = Some(Utc::now());
        self.result.progress = self.tracker.snapshot();
        self.result.clone()
    }
}

#[derive(Debug)]
struct SessionShared {
    request: DownloadRequest,
    control: RunControl,
    ledger: Mutex<RunLedger>,
    finished: watch::Sender<bool>,
}

/// Handle to one download run
#[derive(Debug, Clone)]
pub struct DownloadSession {
    shared: Arc<SessionShared>,
}

impl DownloadSession {
    pub(crate) fn new(request: DownloadRequest) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            shared: Arc::new(SessionShared {
                ledger: Mutex::new(RunLedger::new(request.clone())),
                request,
                control: RunControl::new(),
                finished,
            }),
        }
    }

    pub fn request(&self) -> &DownloadRequest {
        &self.shared.request
    }

    pub fn request_id(&self) -> Uuid {
        self.shared.request.request_id()
    }

    /// Whether two handles refer to the same run
    pub fn same_run(&self, other: &DownloadSession) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn control(&self) -> &RunControl {
        &self.shared.control
    }

    /// Stop starting new files; files in flight finish
    pub async fn cancel(&self) -> DownloadResult {
        if self.shared.control.cancel() {
            info!("Cancellation requested for {}", self.request_id());
        }
        self.result().await
    }

    /// Hold back new files until resumed; files in flight finish
    pub async fn pause(&self) -> DownloadResult {
        if self.shared.control.pause() {
            info!("Download {} paused", self.request_id());
        }
        self.result().await
    }

    pub async fn resume(&self) -> DownloadResult {
        if self.shared.control.resume() {
            info!("Download {} resumed", self.request_id());
        }
        self.result().await
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        self.shared.ledger.lock().await.tracker.snapshot()
    }

    /// Current result; final once the run is finished
    pub async fn result(&self) -> DownloadResult {
        self.shared.ledger.lock().await.view(&self.shared.control)
    }

    pub fn is_finished(&self) -> bool {
        *self.shared.finished.borrow()
    }

    /// Wait for the run to finish and return its final result
    pub async fn wait(&self) -> DownloadResult {
        let mut finished = self.shared.finished.subscribe();
        while !*finished.borrow_and_update() {
            if finished.changed().await.is_err() {
                break;
            }
        }
        self.result().await
    }

    /// Move a pending run to in progress
    pub(crate) async fn mark_started(&self) {
        let mut ledger = self.shared.ledger.lock().await;
        if ledger.result.status == DownloadStatus::Pending {
            ledger.result.status = DownloadStatus::InProgress;
        }
    }

    pub(crate) fn mark_finished(&self) {
        self.shared.finished.send_replace(true);
    }

    /// Drive the run to a terminal status
    pub(crate) async fn run(
        &self,
        client: Arc<dyn RepositoryContentClient>,
        writer: Arc<dyn StorageWriter>,
        config: &OrchestratorConfig,
    ) -> DownloadResult {
        let request = &self.shared.request;

        info!(
            "Starting download {} of {} into {}",
            request.request_id(),
            request.reference(),
            request.destination().display()
        );
        self.mark_started().await;

        let files = match self.prepare(client.as_ref(), writer.as_ref(), config).await {
            Ok(files) => files,
            Err(e) => {
                error!("Download {} failed: {}", request.request_id(), e);
                return self
                    .shared
                    .ledger
                    .lock()
                    .await
                    .finish(DownloadStatus::Failed, Some(e.to_string()));
            }
        };

        let logger = AbortOnDrop(tokio::spawn(log_progress(
            self.clone(),
            config.progress_log_interval,
        )));

        if request.dry_run() {
            self.plan(files, writer.as_ref()).await;
        } else {
            let workers = config
                .effective_workers(request.max_concurrent_workers())
                .unwrap_or(1);
            self.dispatch(files, workers, client, writer).await;
        }

        drop(logger);

        let mut ledger = self.shared.ledger.lock().await;
        let status = if self.shared.control.is_cancelled() {
            DownloadStatus::Cancelled
        } else if policy::PARTIAL_FAILURE_FAILS_RUN && !ledger.result.failed_files.is_empty() {
            DownloadStatus::Failed
        } else {
            DownloadStatus::Completed
        };
        let result = ledger.finish(status, None);
        drop(ledger);

        info!("{}", result.summary());
        result
    }

    /// Validate the request and destination, list and filter the tree
    async fn prepare(
        &self,
        client: &dyn RepositoryContentClient,
        writer: &dyn StorageWriter,
        config: &OrchestratorConfig,
    ) -> Result<Vec<RemoteFile>, RunError> {
        let request = &self.shared.request;

        let requested = request.max_concurrent_workers();
        match config.effective_workers(requested) {
            None => {
                return Err(RunError::InvalidRequest {
                    reason: "max_concurrent_workers must be at least 1".to_string(),
                })
            }
            Some(workers) if workers < requested => warn!(
                "Requested {} workers, limited to {}",
                requested, config.max_workers
            ),
            Some(_) => {}
        }

        if request.strategy() != DownloadStrategy::Individual {
            warn!(
                "Strategy '{}' is not supported, transferring files individually",
                request.strategy()
            );
        }

        let destination = request.destination();
        if request.create_destination() && !request.dry_run() {
            writer.ensure_directory(destination).await?;
        } else if !request.create_destination() && !writer.exists(destination).await {
            return Err(StorageError::DestinationMissing {
                path: destination.to_path_buf(),
            }
            .into());
        }

        let listing = client.list_tree(request.reference()).await?;
        let selection = FilterEngine::new(request.filters().clone()).filter_files(listing);

        info!(
            "Selected {} of {} entries ({} bytes)",
            selection.filtered_files,
            selection.total_files,
            selection.included_bytes()
        );

        self.shared
            .ledger
            .lock()
            .await
            .tracker
            .start(selection.included.len(), selection.included_bytes());

        Ok(selection.included)
    }

    /// Dry run: sort files into skipped and pending without transferring
    async fn plan(&self, files: Vec<RemoteFile>, writer: &dyn StorageWriter) {
        let request = &self.shared.request;
        for file in files {
            let skip = task::should_skip(&file, request, writer).await;
            let mut ledger = self.shared.ledger.lock().await;
            if skip {
                ledger.merge(FileOutcome::Skipped { path: file.path });
            } else {
                ledger.mark_pending(file.path);
            }
        }
    }

    /// Run one task per file with at most `workers` in flight
    async fn dispatch(
        &self,
        files: Vec<RemoteFile>,
        workers: usize,
        client: Arc<dyn RepositoryContentClient>,
        writer: Arc<dyn StorageWriter>,
    ) {
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut queue = files.into_iter();

        while let Some(file) = queue.next() {
            let Some(permit) = admit(&self.shared.control, &semaphore).await else {
                let mut ledger = self.shared.ledger.lock().await;
                ledger.mark_pending(file.path);
                queue.by_ref().for_each(|rest| ledger.mark_pending(rest.path));
                debug!("Dispatch stopped by cancellation");
                break;
            };

            let shared = Arc::clone(&self.shared);
            let client = Arc::clone(&client);
            let writer = Arc::clone(&writer);
            tasks.spawn(async move {
                let _permit = permit;
                let path = file.path.clone();
                let inner_shared = Arc::clone(&shared);
                let transfer = tokio::spawn(async move {
                    task::download_single_file(
                        &file,
                        &inner_shared.request,
                        client.as_ref(),
                        writer.as_ref(),
                        &inner_shared.ledger,
                    )
                    .await
                });
                let outcome = match transfer.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Transfer of {} ended abnormally: {}", path, e);
                        FileOutcome::Failed {
                            path,
                            error: format!("transfer ended abnormally: {}", e),
                        }
                    }
                };
                shared.ledger.lock().await.merge(outcome);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("File task ended abnormally: {}", e);
            }
        }
    }
}

/// Wait for a free slot, then for the run to be unpaused
///
/// Returns `None` once cancellation is observed.
async fn admit(control: &RunControl, semaphore: &Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
    let permit = tokio::select! {
        biased;
        _ = control.cancelled() => return None,
        permit = Arc::clone(semaphore).acquire_owned() => permit.ok()?,
    };

    (control.wait_if_paused().await && !control.is_cancelled()).then_some(permit)
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn log_progress(session: DownloadSession, interval: Duration) {
    if interval.is_zero() {
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let snapshot = session.progress().await;
        info!(
            "Progress: {}/{} files ({:.1}%), {}, ETA {}",
            snapshot.processed_files(),
            snapshot.total_files,
            snapshot.percentage(),
            snapshot.format_rate(),
            snapshot.format_eta()
        );
    }
}

/// Marks the session finished when dropped, failing it if the run never
/// reached a terminal status
pub(crate) struct FinishGuard(DownloadSession);

impl FinishGuard {
    pub(crate) fn new(session: &DownloadSession) -> Self {
        Self(session.clone())
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if self.0.is_finished() {
            return;
        }
        if let Ok(mut ledger) = self.0.shared.ledger.try_lock() {
            if !ledger.result.status.is_terminal() {
                ledger.finish(
                    DownloadStatus::Failed,
                    Some("Download run ended before reaching a final status".to_string()),
                );
            }
        }
        self.0.mark_finished();
    }
}
