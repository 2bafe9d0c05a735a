//! Data models for forklet
//!
//! This module defines the core data structures shared by the client, the
//! filter engine and the orchestrator: repository references, remote file
//! entries, download requests and their results.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::filter::FilterCriteria;
use crate::app::orchestrator::ProgressSnapshot;
use crate::constants::workers;
use crate::errors::ReferenceError;

/// Repository identity on the hosting service (`owner/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    /// Account or organization owning the repository
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl Repository {
    /// Create a repository identity from its owner and name
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `OWNER/NAME` string
    ///
    /// A trailing `.git` and surrounding slashes are tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::InvalidRepository`] when either part is missing
    /// or the input has more than two segments.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let trimmed = input.trim().trim_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(ReferenceError::InvalidRepository {
                input: input.to_string(),
            }),
        }
    }

    /// Full `owner/name` form
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Kind of git reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Branch,
    Tag,
    Commit,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// A named pointer into a repository's history
///
/// Commit references always carry a SHA; the constructor enforces this so a
/// `RepositoryReference` can never describe a commit it cannot resolve.
/// Fields are private, the value is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    repository: Repository,
    name: String,
    kind: RefKind,
    sha: Option<String>,
}

impl RepositoryReference {
    /// Build a reference of any kind
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::MissingSha`] if `kind` is [`RefKind::Commit`]
    /// and no (non-empty) SHA is given.
    pub fn new(
        repository: Repository,
        name: impl Into<String>,
        kind: RefKind,
        sha: Option<String>,
    ) -> Result<Self, ReferenceError> {
        let name = name.into();
        let sha = sha.filter(|s| !s.trim().is_empty());

        if kind == RefKind::Commit && sha.is_none() {
            return Err(ReferenceError::MissingSha { name });
        }

        Ok(Self {
            repository,
            name,
            kind,
            sha,
        })
    }

    /// Reference a branch by name
    pub fn branch(repository: Repository, name: impl Into<String>) -> Self {
        Self {
            repository,
            name: name.into(),
            kind: RefKind::Branch,
            sha: None,
        }
    }

    /// Reference a tag by name
    pub fn tag(repository: Repository, name: impl Into<String>) -> Self {
        Self {
            repository,
            name: name.into(),
            kind: RefKind::Tag,
            sha: None,
        }
    }

    /// Reference an exact commit
    pub fn commit(repository: Repository, sha: impl Into<String>) -> Result<Self, ReferenceError> {
        let sha = sha.into();
        Self::new(repository, sha.clone(), RefKind::Commit, Some(sha))
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn owner(&self) -> &str {
        &self.repository.owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repository.name
    }

    /// Reference name (branch, tag or the commit SHA itself)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn sha(&self) -> Option<&str> {
        self.sha.as_deref()
    }

    /// The string used to address the tree: the SHA when known, else the name
    pub fn tree_ish(&self) -> &str {
        self.sha.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.name)
    }
}

/// Kind of entry in a repository tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
}

/// A single entry of a repository tree listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    /// Size in bytes (zero for directories)
    pub size: u64,
    /// Content identity on the remote
    pub sha: String,
    /// Where the raw content can be fetched from
    pub download_url: Option<String>,
    /// Entry kind
    pub kind: EntryKind,
}

impl RemoteFile {
    /// Create a regular file entry
    pub fn regular(
        path: impl Into<String>,
        size: u64,
        sha: impl Into<String>,
        download_url: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            sha: sha.into(),
            download_url,
            kind: EntryKind::Regular,
        }
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::Regular
    }

    /// Final path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Local path for this entry under `destination`
    ///
    /// With `preserve_structure` the repository layout is kept, otherwise the
    /// file lands directly in `destination` under its basename.
    pub fn local_path(&self, destination: &Path, preserve_structure: bool) -> PathBuf {
        if preserve_structure {
            self.path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .fold(destination.to_path_buf(), |acc, segment| acc.join(segment))
        } else {
            destination.join(self.file_name())
        }
    }
}

/// How files are transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStrategy {
    Archive,
    #[default]
    Individual,
    GitClone,
    SparseCheckout,
}

impl fmt::Display for DownloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Archive => "archive",
            Self::Individual => "individual",
            Self::GitClone => "git_clone",
            Self::SparseCheckout => "sparse_checkout",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a download run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl DownloadStatus {
    /// Whether the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// A declarative description of what to download and where
///
/// Built through [`DownloadRequestBuilder`]; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    reference: RepositoryReference,
    destination: PathBuf,
    strategy: DownloadStrategy,
    filters: FilterCriteria,
    overwrite_existing: bool,
    create_destination: bool,
    preserve_structure: bool,
    max_concurrent_workers: usize,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    show_progress: bool,
    dry_run: bool,
    request_id: Uuid,
    created_at: DateTime<Utc>,
}

impl DownloadRequest {
    /// Start building a request for `reference` into `destination`
    pub fn builder(
        reference: RepositoryReference,
        destination: impl Into<PathBuf>,
    ) -> DownloadRequestBuilder {
        DownloadRequestBuilder::new(reference, destination)
    }

    pub fn repository(&self) -> &Repository {
        self.reference.repository()
    }

    pub fn reference(&self) -> &RepositoryReference {
        &self.reference
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn strategy(&self) -> DownloadStrategy {
        self.strategy
    }

    pub fn filters(&self) -> &FilterCriteria {
        &self.filters
    }

    pub fn overwrite_existing(&self) -> bool {
        self.overwrite_existing
    }

    pub fn create_destination(&self) -> bool {
        self.create_destination
    }

    pub fn preserve_structure(&self) -> bool {
        self.preserve_structure
    }

    pub fn max_concurrent_workers(&self) -> usize {
        self.max_concurrent_workers
    }

    /// Upper bound for fetching a single file
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builder for [`DownloadRequest`]
#[derive(Debug, Clone)]
pub struct DownloadRequestBuilder {
    reference: RepositoryReference,
    destination: PathBuf,
    strategy: DownloadStrategy,
    filters: FilterCriteria,
    overwrite_existing: bool,
    create_destination: bool,
    preserve_structure: bool,
    max_concurrent_workers: usize,
    timeout: Duration,
    show_progress: bool,
    dry_run: bool,
}

impl DownloadRequestBuilder {
    /// Create a builder with default options
    pub fn new(reference: RepositoryReference, destination: impl Into<PathBuf>) -> Self {
        Self {
            reference,
            destination: destination.into(),
            strategy: DownloadStrategy::Individual,
            filters: FilterCriteria::default(),
            overwrite_existing: false,
            create_destination: true,
            preserve_structure: true,
            max_concurrent_workers: workers::DEFAULT_WORKER_COUNT,
            timeout: workers::DEFAULT_REQUEST_TIMEOUT,
            show_progress: false,
            dry_run: false,
        }
    }

    pub fn strategy(mut self, strategy: DownloadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn filters(mut self, filters: FilterCriteria) -> Self {
        self.filters = filters;
        self
    }

    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    pub fn create_destination(mut self, create: bool) -> Self {
        self.create_destination = create;
        self
    }

    pub fn preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }

    pub fn max_concurrent_workers(mut self, workers: usize) -> Self {
        self.max_concurrent_workers = workers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Finish the request, assigning its id and creation time
    pub fn build(self) -> DownloadRequest {
        DownloadRequest {
            reference: self.reference,
            destination: self.destination,
            strategy: self.strategy,
            filters: self.filters,
            overwrite_existing: self.overwrite_existing,
            create_destination: self.create_destination,
            preserve_structure: self.preserve_structure,
            max_concurrent_workers: self.max_concurrent_workers,
            timeout: self.timeout,
            show_progress: self.show_progress,
            dry_run: self.dry_run,
            request_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a download run
///
/// Every included file ends up in exactly one of `downloaded_files`,
/// `skipped_files`, `failed_files` or `pending_files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    /// The request this result answers
    pub request: DownloadRequest,
    /// Current or final status
    pub status: DownloadStatus,
    /// Progress at the time the result was taken
    pub progress: ProgressSnapshot,
    /// Repository paths written during the run
    pub downloaded_files: Vec<String>,
    /// Repository paths left untouched because they already existed locally
    pub skipped_files: Vec<String>,
    /// Repository path to error message
    pub failed_files: BTreeMap<String, String>,
    /// Repository paths selected but never transferred
    pub pending_files: Vec<String>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Whole-run failure cause
    pub error_message: Option<String>,
}

impl DownloadResult {
    /// Create an empty result for a request that is about to run
    pub fn new(request: DownloadRequest) -> Self {
        let started_at = Utc::now();
        Self {
            request,
            status: DownloadStatus::Pending,
            progress: ProgressSnapshot::empty(started_at),
            downloaded_files: Vec::new(),
            skipped_files: Vec::new(),
            failed_files: BTreeMap::new(),
            pending_files: Vec::new(),
            started_at,
            completed_at: None,
            error_message: None,
        }
    }

    /// Wall-clock duration of the run, up to now if it has not finished
    pub fn duration(&self) -> Duration {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Average transfer rate over the whole run in bytes per second
    pub fn average_speed(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.progress.completed_bytes as f64 / secs
    }

    /// Percentage of attempted transfers that succeeded
    ///
    /// Skipped and pending files are not attempts. A run with no attempts
    /// reports 100.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.downloaded_files.len() + self.failed_files.len();
        if attempted == 0 {
            return 100.0;
        }
        self.downloaded_files.len() as f64 / attempted as f64 * 100.0
    }

    /// Completed run in which some files failed
    pub fn is_partial(&self) -> bool {
        self.status == DownloadStatus::Completed && !self.failed_files.is_empty()
    }

    /// Number of files that reached an outcome
    pub fn settled_count(&self) -> usize {
        self.downloaded_files.len() + self.skipped_files.len() + self.failed_files.len()
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        match self.status {
            DownloadStatus::Failed => format!(
                "Download of {} failed: {}",
                self.request.reference(),
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
            _ => format!(
                "Download of {} {}: {} downloaded, {} skipped, {} failed, {} pending in {:.1}s",
                self.request.reference(),
                self.status,
                self.downloaded_files.len(),
                self.skipped_files.len(),
                self.failed_files.len(),
                self.pending_files.len(),
                self.duration().as_secs_f64()
            ),
        }
    }
}
