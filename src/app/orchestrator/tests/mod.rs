//! Unit tests for the download orchestrator
//!
//! Runs are driven against an in-memory content client and storage writer so
//! that concurrency, failure isolation and control calls can be observed
//! without a network or filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::app::filter::FilterCriteria;
use crate::app::models::{
    DownloadStatus, RemoteFile, Repository, RepositoryReference,
};
use crate::app::storage::FsStorageWriter;
use crate::errors::{
    FetchError, FetchResult, ListingError, ListingResult, StorageResult,
};

/// Content client serving a fixed listing from memory
#[derive(Default)]
struct MockClient {
    files: Vec<RemoteFile>,
    listing_error: Option<String>,
    listing_delay: Duration,
    fetch_delay: Duration,
    slow_paths: HashMap<String, Duration>,
    failing_paths: HashSet<String>,
    panicking_paths: HashSet<String>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockClient {
    fn with_files(files: Vec<RemoteFile>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryContentClient for MockClient {
    async fn list_tree(&self, _reference: &RepositoryReference) -> ListingResult<Vec<RemoteFile>> {
        tokio::time::sleep(self.listing_delay).await;
        match &self.listing_error {
            Some(message) => Err(ListingError::Other(message.clone())),
            None => Ok(self.files.clone()),
        }
    }

    async fn fetch_content(&self, file: &RemoteFile) -> FetchResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .slow_paths
            .get(&file.path)
            .copied()
            .unwrap_or(self.fetch_delay);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking_paths.contains(&file.path) {
            panic!("content client blew up on {}", file.path);
        }
        if self.failing_paths.contains(&file.path) {
            return Err(FetchError::Server { status: 500 });
        }
        Ok(vec![b'x'; file.size as usize])
    }
}

type WriteHook = Box<dyn Fn(usize) + Send + Sync>;

/// Storage writer recording writes in memory
#[derive(Default)]
struct MockWriter {
    existing: StdMutex<HashSet<PathBuf>>,
    written: StdMutex<Vec<PathBuf>>,
    on_write: Option<WriteHook>,
}

impl MockWriter {
    fn with_existing(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            existing: StdMutex::new(paths.into_iter().collect()),
            ..Default::default()
        }
    }

    fn written(&self) -> Vec<PathBuf> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageWriter for MockWriter {
    async fn ensure_directory(&self, _path: &Path) -> StorageResult<()> {
        Ok(())
    }

    async fn write(&self, content: &[u8], target: &Path, _show_progress: bool) -> StorageResult<u64> {
        let count = {
            let mut written = self.written.lock().unwrap();
            written.push(target.to_path_buf());
            written.len()
        };
        self.existing.lock().unwrap().insert(target.to_path_buf());
        if let Some(hook) = &self.on_write {
            hook(count);
        }
        Ok(content.len() as u64)
    }

    async fn exists(&self, path: &Path) -> bool {
        self.existing.lock().unwrap().contains(path)
    }
}

fn reference() -> RepositoryReference {
    RepositoryReference::branch(Repository::new("octo", "hello"), "main")
}

fn remote(path: &str, size: u64) -> RemoteFile {
    RemoteFile::regular(
        path,
        size,
        format!("sha-{}", path),
        Some(format!("https://raw.example.com/octo/hello/main/{}", path)),
    )
}

/// Ten 100-byte files named `src/file_0.txt` .. `src/file_9.txt`
fn ten_files() -> Vec<RemoteFile> {
    (0..10)
        .map(|i| remote(&format!("src/file_{}.txt", i), 100))
        .collect()
}

fn orchestrator(client: Arc<MockClient>, writer: Arc<MockWriter>) -> DownloadOrchestrator {
    DownloadOrchestrator::new(client, writer)
}

fn assert_partitioned(result: &DownloadResult) {
    assert_eq!(
        result.downloaded_files.len()
            + result.skipped_files.len()
            + result.failed_files.len()
            + result.pending_files.len(),
        result.progress.total_files,
        "every selected file must land in exactly one collection"
    );
}

#[tokio::test]
async fn test_existing_file_is_skipped_without_fetch() {
    let dest = PathBuf::from("/downloads/hello");
    let client = Arc::new(MockClient::with_files(vec![remote("README.md", 12)]));
    let writer = Arc::new(MockWriter::with_existing([dest.join("README.md")]));

    let request = DownloadRequest::builder(reference(), &dest).build();
    let result = orchestrator(client.clone(), writer.clone())
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.skipped_files, vec!["README.md".to_string()]);
    assert!(result.downloaded_files.is_empty());
    assert_eq!(client.fetch_count(), 0);
    assert!(writer.written().is_empty());
    assert_eq!(result.progress.skipped_files, 1);
}

#[tokio::test]
async fn test_overwrite_existing_downloads_again() {
    let dest = PathBuf::from("/downloads/hello");
    let client = Arc::new(MockClient::with_files(vec![remote("README.md", 12)]));
    let writer = Arc::new(MockWriter::with_existing([dest.join("README.md")]));

    let request = DownloadRequest::builder(reference(), &dest)
        .overwrite_existing(true)
        .build();
    let result = orchestrator(client.clone(), writer.clone())
        .execute(request)
        .await;

    assert_eq!(result.downloaded_files, vec!["README.md".to_string()]);
    assert_eq!(client.fetch_count(), 1);
    assert_eq!(result.progress.completed_bytes, 12);
}

#[tokio::test]
async fn test_listing_failure_fails_run() {
    let client = Arc::new(MockClient {
        listing_error: Some("API limit reached".to_string()),
        ..Default::default()
    });
    let writer = Arc::new(MockWriter::default());

    let request = DownloadRequest::builder(reference(), "/downloads/hello").build();
    let result = orchestrator(client.clone(), writer).execute(request).await;

    assert_eq!(result.status, DownloadStatus::Failed);
    assert!(result
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("API limit reached")));
    assert!(result.downloaded_files.is_empty());
    assert!(result.skipped_files.is_empty());
    assert!(result.failed_files.is_empty());
    assert!(result.pending_files.is_empty());
    assert!(result.completed_at.is_some());
    assert_eq!(client.fetch_count(), 0);
}

/// Test failure isolation
///
/// Verifies that one failing file is recorded while its siblings complete and
/// that concurrency never exceeds the requested worker count.
#[tokio::test]
async fn test_single_failure_does_not_stop_siblings() {
    let mut client = MockClient::with_files(ten_files());
    client.fetch_delay = Duration::from_millis(10);
    client.failing_paths.insert("src/file_7.txt".to_string());
    let client = Arc::new(client);
    let writer = Arc::new(MockWriter::default());

    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .max_concurrent_workers(5)
        .build();
    let result = orchestrator(client.clone(), writer.clone())
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert!(result.is_partial());
    assert_eq!(result.downloaded_files.len(), 9);
    assert_eq!(result.failed_files.len(), 1);
    assert!(result.failed_files["src/file_7.txt"].contains("500"));
    assert!(result.pending_files.is_empty());
    assert_eq!(result.progress.completed_files, 9);
    assert_eq!(result.progress.failed_files, 1);
    assert_eq!(result.progress.completed_bytes, 900);
    assert_eq!(result.success_rate(), 90.0);
    assert!(client.max_in_flight.load(Ordering::SeqCst) <= 5);
    assert_partitioned(&result);
}

#[tokio::test]
async fn test_worker_limit_is_respected() {
    let mut client = MockClient::with_files(ten_files());
    client.fetch_delay = Duration::from_millis(15);
    let client = Arc::new(client);
    let writer = Arc::new(MockWriter::default());

    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .max_concurrent_workers(2)
        .build();
    let result = orchestrator(client.clone(), writer).execute(request).await;

    assert_eq!(result.downloaded_files.len(), 10);
    assert!(client.max_in_flight.load(Ordering::SeqCst) <= 2);
}

/// Test cooperative cancellation
///
/// With a single worker the run is cancelled from inside the third write.
/// The third file still completes and nothing after it is started.
#[tokio::test]
async fn test_cancel_stops_new_files() {
    let mut client = MockClient::with_files(ten_files());
    client.fetch_delay = Duration::from_millis(5);
    let client = Arc::new(client);

    let slot: Arc<StdMutex<Option<DownloadSession>>> = Arc::new(StdMutex::new(None));
    let hook_slot = Arc::clone(&slot);
    let writer = Arc::new(MockWriter {
        on_write: Some(Box::new(move |count| {
            if count == 3 {
                if let Some(session) = hook_slot.lock().unwrap().as_ref() {
                    session.control().cancel();
                }
            }
        })),
        ..Default::default()
    });

    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .max_concurrent_workers(1)
        .build();
    let session = orchestrator(client.clone(), writer).start(request).await;
    *slot.lock().unwrap() = Some(session.clone());

    let result = tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .unwrap();

    assert_eq!(result.status, DownloadStatus::Cancelled);
    assert_eq!(result.downloaded_files.len(), 3);
    assert_eq!(client.fetch_count(), 3);
    assert_eq!(result.pending_files.len(), 7);
    assert!(result.completed_at.is_some());
    assert_partitioned(&result);
}

#[tokio::test]
async fn test_control_calls_without_active_run() {
    let orchestrator = orchestrator(
        Arc::new(MockClient::default()),
        Arc::new(MockWriter::default()),
    );

    assert!(orchestrator.cancel().await.is_none());
    assert!(orchestrator.pause().await.is_none());
    assert!(orchestrator.resume().await.is_none());
    assert!(orchestrator.current_progress().await.is_none());
}

#[tokio::test]
async fn test_control_calls_after_run_finished() {
    let client = Arc::new(MockClient::with_files(vec![remote("a.txt", 1)]));
    let orchestrator = orchestrator(client, Arc::new(MockWriter::default()));

    let request = DownloadRequest::builder(reference(), "/downloads/hello").build();
    let result = orchestrator.execute(request).await;
    assert_eq!(result.status, DownloadStatus::Completed);

    assert!(orchestrator.cancel().await.is_none());
    assert!(orchestrator.current_progress().await.is_none());
}

/// Test pause and resume
///
/// Pausing before dispatch holds every file back; resuming lets the run
/// finish normally.
#[tokio::test]
async fn test_pause_holds_back_files_until_resume() {
    let mut client = MockClient::with_files(ten_files());
    client.listing_delay = Duration::from_millis(50);
    let client = Arc::new(client);
    let writer = Arc::new(MockWriter::default());
    let orchestrator = orchestrator(client.clone(), writer);

    let request = DownloadRequest::builder(reference(), "/downloads/hello").build();
    let session = orchestrator.start(request).await;

    let paused = orchestrator.pause().await.unwrap();
    assert_eq!(paused.status, DownloadStatus::Paused);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(client.fetch_count(), 0);
    assert!(!session.is_finished());

    let progress = orchestrator.current_progress().await.unwrap();
    assert_eq!(progress.total_files, 10);
    assert_eq!(progress.processed_files(), 0);

    let resumed = orchestrator.resume().await.unwrap();
    assert_eq!(resumed.status, DownloadStatus::InProgress);

    let result = tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .unwrap();
    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.downloaded_files.len(), 10);
    assert_eq!(client.fetch_count(), 10);
}

#[tokio::test]
async fn test_cancel_while_paused_marks_everything_pending() {
    let mut client = MockClient::with_files(ten_files());
    client.listing_delay = Duration::from_millis(30);
    let client = Arc::new(client);
    let orchestrator = orchestrator(client.clone(), Arc::new(MockWriter::default()));

    let request = DownloadRequest::builder(reference(), "/downloads/hello").build();
    let session = orchestrator.start(request).await;
    orchestrator.pause().await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    let cancelled = orchestrator.cancel().await.unwrap();
    assert_eq!(cancelled.status, DownloadStatus::Cancelled);

    let result = tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .unwrap();
    assert_eq!(result.status, DownloadStatus::Cancelled);
    assert_eq!(result.pending_files.len(), 10);
    assert_eq!(client.fetch_count(), 0);
}

#[tokio::test]
async fn test_zero_workers_is_invalid_request() {
    let client = Arc::new(MockClient::with_files(ten_files()));
    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .max_concurrent_workers(0)
        .build();

    let result = orchestrator(client.clone(), Arc::new(MockWriter::default()))
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Failed);
    assert!(result
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("at least 1")));
    assert_eq!(client.fetch_count(), 0);
}

#[tokio::test]
async fn test_missing_destination_without_create_fails() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("missing");
    let client = Arc::new(MockClient::with_files(ten_files()));

    let request = DownloadRequest::builder(reference(), &dest)
        .create_destination(false)
        .build();
    let result = DownloadOrchestrator::new(client.clone(), Arc::new(FsStorageWriter::new()))
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Failed);
    assert!(result
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("does not exist")));
    assert!(!dest.exists());
    assert_eq!(client.fetch_count(), 0);
}

#[tokio::test]
async fn test_writes_real_files_with_structure() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("hello");
    let client = Arc::new(MockClient::with_files(vec![
        remote("README.md", 4),
        remote("src/lib/core.rs", 8),
    ]));

    let request = DownloadRequest::builder(reference(), &dest).build();
    let result = DownloadOrchestrator::new(client, Arc::new(FsStorageWriter::new()))
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(std::fs::read(dest.join("README.md")).unwrap(), b"xxxx");
    assert_eq!(
        std::fs::read(dest.join("src").join("lib").join("core.rs"))
            .unwrap()
            .len(),
        8
    );
}

#[tokio::test]
async fn test_dry_run_plans_without_transfer() {
    let dest = PathBuf::from("/downloads/hello");
    let client = Arc::new(MockClient::with_files(vec![
        remote("README.md", 12),
        remote("src/main.rs", 40),
        remote("src/lib.rs", 30),
    ]));
    let writer = Arc::new(MockWriter::with_existing([dest.join("README.md")]));

    let request = DownloadRequest::builder(reference(), &dest)
        .dry_run(true)
        .build();
    let result = orchestrator(client.clone(), writer.clone())
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.skipped_files, vec!["README.md".to_string()]);
    assert_eq!(
        result.pending_files,
        vec!["src/main.rs".to_string(), "src/lib.rs".to_string()]
    );
    assert_eq!(client.fetch_count(), 0);
    assert!(writer.written().is_empty());
    assert_partitioned(&result);
}

#[tokio::test]
async fn test_flatten_writes_basenames() {
    let dest = PathBuf::from("/downloads/flat");
    let client = Arc::new(MockClient::with_files(vec![
        remote("docs/guide/intro.md", 10),
        remote("src/main.rs", 20),
    ]));
    let writer = Arc::new(MockWriter::default());

    let request = DownloadRequest::builder(reference(), &dest)
        .preserve_structure(false)
        .max_concurrent_workers(1)
        .build();
    let result = orchestrator(client, writer.clone()).execute(request).await;

    assert_eq!(result.downloaded_files.len(), 2);
    let written: HashSet<PathBuf> = writer.written().into_iter().collect();
    assert!(written.contains(&dest.join("intro.md")));
    assert!(written.contains(&dest.join("main.rs")));
}

#[tokio::test]
async fn test_filters_limit_selection() {
    let client = Arc::new(MockClient::with_files(vec![
        remote("src/main.py", 120),
        remote("src/test_main.py", 120),
        remote("docs/readme.md", 120),
        remote(".github/ci.yml", 120),
    ]));
    let writer = Arc::new(MockWriter::default());

    let filters = FilterCriteria::default()
        .with_include_patterns(["src/*"])
        .with_exclude_patterns(["*/test_*"]);
    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .filters(filters)
        .build();
    let result = orchestrator(client.clone(), writer).execute(request).await;

    assert_eq!(result.progress.total_files, 1);
    assert_eq!(result.progress.total_bytes, 120);
    assert_eq!(result.downloaded_files, vec!["src/main.py".to_string()]);
    assert_eq!(client.fetch_count(), 1);
}

#[tokio::test]
async fn test_fetch_timeout_fails_only_that_file() {
    let mut client = MockClient::with_files(vec![remote("fast.txt", 5), remote("slow.txt", 5)]);
    client
        .slow_paths
        .insert("slow.txt".to_string(), Duration::from_millis(500));
    let client = Arc::new(client);

    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .timeout(Duration::from_millis(50))
        .build();
    let result = orchestrator(client, Arc::new(MockWriter::default()))
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.downloaded_files, vec!["fast.txt".to_string()]);
    assert!(result.failed_files["slow.txt"].contains("timed out"));
}

#[tokio::test]
async fn test_empty_listing_completes() {
    let client = Arc::new(MockClient::default());
    let request = DownloadRequest::builder(reference(), "/downloads/hello").build();

    let result = orchestrator(client, Arc::new(MockWriter::default()))
        .execute(request)
        .await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.progress.total_files, 0);
    assert_eq!(result.success_rate(), 100.0);
}

#[tokio::test]
async fn test_worker_request_is_clamped_to_maximum() {
    let mut client = MockClient::with_files(ten_files());
    client.fetch_delay = Duration::from_millis(10);
    let client = Arc::new(client);

    let config = OrchestratorConfig::default()
        .with_workers(2, 3)
        .with_progress_log_interval(Duration::from_millis(5));
    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .max_concurrent_workers(50)
        .build();
    let result = orchestrator(client.clone(), Arc::new(MockWriter::default()))
        .with_config(config)
        .execute(request)
        .await;

    assert_eq!(result.downloaded_files.len(), 10);
    assert!(client.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[test]
fn test_invalid_config_is_ignored() {
    let orchestrator = orchestrator(
        Arc::new(MockClient::default()),
        Arc::new(MockWriter::default()),
    )
    .with_config(OrchestratorConfig::default().with_workers(0, 0));

    assert_eq!(
        orchestrator.config().max_workers,
        OrchestratorConfig::default().max_workers
    );
}

#[test]
fn test_session_result_before_start_is_pending() {
    let session = DownloadSession::new(
        DownloadRequest::builder(reference(), "/downloads/hello").build(),
    );
    let result = tokio_test::block_on(session.result());

    assert_eq!(result.status, DownloadStatus::Pending);
    assert!(!session.is_finished());
}

#[test]
fn test_control_flags_do_not_move_a_pending_session() {
    let session = DownloadSession::new(
        DownloadRequest::builder(reference(), "/downloads/hello").build(),
    );

    let paused = tokio_test::block_on(session.pause());
    assert_eq!(paused.status, DownloadStatus::Pending);

    let cancelled = tokio_test::block_on(session.cancel());
    assert_eq!(cancelled.status, DownloadStatus::Pending);
}

/// Test a panicking transfer
///
/// A panic inside one file's transfer is recorded as that file's failure;
/// its siblings still complete and nothing is dropped.
#[tokio::test]
async fn test_panicking_transfer_is_recorded_as_failure() {
    let mut client = MockClient::with_files(ten_files());
    client.panicking_paths.insert("src/file_3.txt".to_string());
    let client = Arc::new(client);
    let writer = Arc::new(MockWriter::default());

    let request = DownloadRequest::builder(reference(), "/downloads/hello")
        .max_concurrent_workers(4)
        .build();
    let result = orchestrator(client, writer.clone()).execute(request).await;

    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.downloaded_files.len(), 9);
    assert_eq!(result.failed_files.len(), 1);
    assert!(result.failed_files["src/file_3.txt"].contains("abnormally"));
    assert_eq!(result.progress.failed_files, 1);
    assert_eq!(writer.written().len(), 9);
    assert_partitioned(&result);
}

/// Test exact bookkeeping under high concurrency
///
/// Thousands of files on a multi-threaded runtime with a wide worker bound,
/// mixing skips, failures and downloads. Every file lands in exactly one
/// collection and the counters agree with the collections.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_no_lost_updates_under_high_concurrency() {
    const FILES: usize = 2000;
    const SIZE: u64 = 7;

    let dest = PathBuf::from("/downloads/hello");
    let files: Vec<_> = (0..FILES)
        .map(|i| remote(&format!("bulk/f{:04}.bin", i), SIZE))
        .collect();

    let mut client = MockClient::with_files(files);
    client.fetch_delay = Duration::from_millis(1);
    client.failing_paths = (0..FILES)
        .filter(|i| i % 13 == 0)
        .map(|i| format!("bulk/f{:04}.bin", i))
        .collect();
    let client = Arc::new(client);

    let existing: Vec<_> = (0..FILES)
        .filter(|i| i % 17 == 0 && i % 13 != 0)
        .map(|i| dest.join(format!("bulk/f{:04}.bin", i)))
        .collect();
    let expected_skipped = existing.len();
    let expected_failed = (0..FILES).filter(|i| i % 13 == 0).count();
    let writer = Arc::new(MockWriter::with_existing(existing));

    let request = DownloadRequest::builder(reference(), &dest)
        .max_concurrent_workers(64)
        .build();
    let orchestrator = DownloadOrchestrator::new(client.clone(), writer.clone())
        .with_config(OrchestratorConfig::default().with_workers(8, 64));
    let result = orchestrator.execute(request).await;

    let expected_downloaded = FILES - expected_skipped - expected_failed;
    assert_eq!(result.status, DownloadStatus::Completed);
    assert_eq!(result.skipped_files.len(), expected_skipped);
    assert_eq!(result.failed_files.len(), expected_failed);
    assert_eq!(result.downloaded_files.len(), expected_downloaded);
    assert!(result.pending_files.is_empty());
    assert_partitioned(&result);

    let unique: HashSet<_> = result
        .downloaded_files
        .iter()
        .chain(result.skipped_files.iter())
        .chain(result.failed_files.keys())
        .collect();
    assert_eq!(unique.len(), FILES);

    assert_eq!(result.progress.total_files, FILES);
    assert_eq!(result.progress.completed_files, expected_downloaded);
    assert_eq!(result.progress.skipped_files, expected_skipped);
    assert_eq!(result.progress.failed_files, expected_failed);
    assert_eq!(
        result.progress.completed_bytes,
        SIZE * expected_downloaded as u64
    );
    assert_eq!(writer.written().len(), expected_downloaded);
    assert_eq!(client.fetch_count(), FILES - expected_skipped);

    let peak = client.max_in_flight.load(Ordering::SeqCst);
    assert!(peak > 1, "transfers never overlapped");
    assert!(peak <= 64, "worker bound exceeded: {}", peak);
}
