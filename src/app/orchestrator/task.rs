//! Per-file transfer
//!
//! One task runs per selected file. It decides skip or transfer, fetches with
//! the request's timeout and writes through the storage writer. Whatever
//! happens is returned as a [`FileOutcome`]; errors never leave the task.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::session::RunLedger;
use crate::app::client::RepositoryContentClient;
use crate::app::models::{DownloadRequest, RemoteFile};
use crate::app::storage::StorageWriter;
use crate::errors::FetchError;

/// Result of handling one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Content written to `target`
    Downloaded {
        path: String,
        target: PathBuf,
        bytes: u64,
    },
    /// Target already existed and overwriting was not requested
    Skipped { path: String },
    /// Fetch or write failed
    Failed { path: String, error: String },
}

impl FileOutcome {
    /// Repository path the outcome belongs to
    pub fn path(&self) -> &str {
        match self {
            Self::Downloaded { path, .. } | Self::Skipped { path } | Self::Failed { path, .. } => {
                path
            }
        }
    }

    fn failed(file: &RemoteFile, error: impl ToString) -> Self {
        let error = error.to_string();
        warn!("Failed to download {}: {}", file.path, error);
        Self::Failed {
            path: file.path.clone(),
            error,
        }
    }
}

/// Where `file` lands for `request`
pub fn target_path(file: &RemoteFile, request: &DownloadRequest) -> PathBuf {
    file.local_path(request.destination(), request.preserve_structure())
}

/// Whether `file` would be left alone because it already exists locally
pub async fn should_skip(
    file: &RemoteFile,
    request: &DownloadRequest,
    writer: &dyn StorageWriter,
) -> bool {
    !request.overwrite_existing() && writer.exists(&target_path(file, request)).await
}

/// Transfer a single file
pub async fn download_single_file(
    file: &RemoteFile,
    request: &DownloadRequest,
    client: &dyn RepositoryContentClient,
    writer: &dyn StorageWriter,
    ledger: &Mutex<RunLedger>,
) -> FileOutcome {
    let target = target_path(file, request);

    if should_skip(file, request, writer).await {
        debug!("Skipping existing file {}", target.display());
        return FileOutcome::Skipped {
            path: file.path.clone(),
        };
    }

    ledger.lock().await.record_start(&file.path);
    debug!("Downloading {} -> {}", file.path, target.display());

    let content = match tokio::time::timeout(request.timeout(), client.fetch_content(file)).await {
        Ok(Ok(content)) => content,
        Ok(Err(e)) => return FileOutcome::failed(file, e),
        Err(_) => {
            return FileOutcome::failed(
                file,
                FetchError::Timeout {
                    seconds: request.timeout().as_secs(),
                },
            )
        }
    };

    if let Some(parent) = target.parent() {
        if let Err(e) = writer.ensure_directory(parent).await {
            return FileOutcome::failed(file, e);
        }
    }

    match writer
        .write(&content, &target, request.show_progress())
        .await
    {
        Ok(bytes) => FileOutcome::Downloaded {
            path: file.path.clone(),
            target,
            bytes,
        },
        Err(e) => FileOutcome::failed(file, e),
    }
}
