//! Local storage for downloaded content
//!
//! [`StorageWriter`] is the seam between the orchestrator and the filesystem.
//! [`FsStorageWriter`] writes through a temporary `.part` file that is renamed
//! into place once complete, so an interrupted write never leaves a truncated
//! file under the final name.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::constants::files;
use crate::errors::{StorageError, StorageResult};

/// Writes fetched content to local storage
#[async_trait]
pub trait StorageWriter: Send + Sync {
    /// Make sure `path` exists as a directory, creating parents as needed
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Destination`] if the directory cannot be created.
    async fn ensure_directory(&self, path: &Path) -> StorageResult<()>;

    /// Write `content` to `target`, returning the number of bytes written
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] or [`StorageError::AtomicRename`] when
    /// the content could not be persisted.
    async fn write(&self, content: &[u8], target: &Path, show_progress: bool) -> StorageResult<u64>;

    /// Whether something already exists at `path`
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

/// Filesystem-backed [`StorageWriter`] with atomic writes
#[derive(Debug, Clone, Default)]
pub struct FsStorageWriter {
    progress: Option<MultiProgress>,
}

impl FsStorageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a progress container; per-file bars are drawn in it when a
    /// write asks for progress
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    fn file_bar(&self, target: &Path, len: u64, show_progress: bool) -> Option<ProgressBar> {
        let container = self.progress.as_ref().filter(|_| show_progress)?;
        let bar = container.add(ProgressBar::new(len));
        bar.set_style(
            ProgressStyle::with_template("  {msg:40!} {bytes:>10}/{total_bytes:<10} {wide_bar}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_message(name);
        Some(bar)
    }

    async fn write_temp(
        &self,
        content: &[u8],
        temp_path: &Path,
        bar: Option<&ProgressBar>,
    ) -> StorageResult<()> {
        let write_err = |source| StorageError::Write {
            path: temp_path.to_path_buf(),
            source,
        };

        let mut file = File::create(temp_path).await.map_err(write_err)?;
        for chunk in content.chunks(files::WRITE_CHUNK_SIZE) {
            file.write_all(chunk).await.map_err(write_err)?;
            if let Some(bar) = bar {
                bar.inc(chunk.len() as u64);
            }
        }
        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        Ok(())
    }
}

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// Sibling path used while a write is in flight
///
/// Unique per call, so concurrent writes to the same target never share a
/// temporary file.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}-{}{}", std::process::id(), id, files::TEMP_FILE_SUFFIX));
    target.with_file_name(name)
}

#[async_trait]
impl StorageWriter for FsStorageWriter {
    async fn ensure_directory(&self, path: &Path) -> StorageResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| StorageError::Destination {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write(&self, content: &[u8], target: &Path, show_progress: bool) -> StorageResult<u64> {
        let temp_path = temp_path_for(target);
        let bar = self.file_bar(target, content.len() as u64, show_progress);

        let written = self.write_temp(content, &temp_path, bar.as_ref()).await;
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                debug!("Could not remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&temp_path, target).await {
            warn!(
                "Rename {} -> {} failed: {}",
                temp_path.display(),
                target.display(),
                e
            );
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::AtomicRename {
                temp_path,
                final_path: target.to_path_buf(),
            });
        }

        debug!("Wrote {} bytes to {}", content.len(), target.display());
        Ok(content.len() as u64)
    }
}
