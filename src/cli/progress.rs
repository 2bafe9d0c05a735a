//! Progress display for download runs
//!
//! The display is fed [`ProgressSnapshot`]s polled from the orchestrator. On a
//! terminal it draws an overall `indicatif` bar; per-file bars drawn by the
//! storage writer share the same [`MultiProgress`]. Elsewhere it falls back to
//! a periodic text line on stderr.

use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

use crate::app::{DownloadResult, DownloadStatus, ProgressSnapshot};
use crate::constants::progress;
use crate::errors::{AppError, Result};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// How often the caller should poll and update
    pub update_interval: Duration,
    /// Show download rate in the bar message
    pub show_download_rate: bool,
    /// Show ETA in the bar message
    pub show_eta: bool,
    /// Maximum width for file names in display
    pub max_filename_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            update_interval: progress::DISPLAY_REFRESH_INTERVAL,
            show_download_rate: true,
            show_eta: true,
            max_filename_width: 40,
        }
    }
}

/// Overall progress display
pub struct ProgressDisplay {
    config: ProgressConfig,
    multi_progress: MultiProgress,
    main_progress: Option<ProgressBar>,
    is_terminal: bool,
    started: bool,
    last_text_report: Option<Instant>,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let multi_progress = if config.enable_progress_bars && is_terminal {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        Self {
            config,
            multi_progress,
            main_progress: None,
            is_terminal,
            started: false,
            last_text_report: None,
        }
    }

    /// Whether bars are drawn
    pub fn bars_enabled(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    /// Container shared with per-file bars
    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi_progress
    }

    pub fn update_interval(&self) -> Duration {
        self.config.update_interval
    }

    /// Start the display
    ///
    /// # Errors
    ///
    /// Returns an error if the bar template is rejected.
    pub fn start(&mut self, label: &str) -> Result<()> {
        self.started = true;
        if !self.bars_enabled() {
            eprintln!("Starting download of {}...", label);
            self.last_text_report = Some(Instant::now());
            return Ok(());
        }

        let main_pb = self.multi_progress.add(ProgressBar::new(0));
        main_pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );
        main_pb.set_message(format!("Listing {}", label));
        main_pb.enable_steady_tick(self.config.update_interval);

        self.main_progress = Some(main_pb);
        debug!("Progress display started for {}", label);
        Ok(())
    }

    /// Reflect a new snapshot; ignored until started
    pub fn update(&mut self, snapshot: &ProgressSnapshot) {
        if !self.started {
            return;
        }
        let Some(pb) = self.main_progress.clone() else {
            self.text_report(snapshot);
            return;
        };
        pb.set_length(snapshot.total_files as u64);
        pb.set_position(snapshot.processed_files() as u64);
        pb.set_message(self.status_message(snapshot));
    }

    fn text_report(&mut self, snapshot: &ProgressSnapshot) {
        let due = self
            .last_text_report
            .map_or(true, |last| last.elapsed() >= progress::TEXT_REPORT_INTERVAL);
        if !due || snapshot.total_files == 0 {
            return;
        }

        eprintln!(
            "Progress: {}/{} files ({:.1}%), {}",
            snapshot.processed_files(),
            snapshot.total_files,
            snapshot.percentage(),
            self.status_message(snapshot)
        );
        self.last_text_report = Some(Instant::now());
    }

    /// Message shown next to the bar
    pub fn status_message(&self, snapshot: &ProgressSnapshot) -> String {
        let mut parts = Vec::new();
        if self.config.show_download_rate {
            parts.push(snapshot.format_rate());
        }
        if self.config.show_eta {
            parts.push(format!("ETA {}", snapshot.format_eta()));
        }
        if snapshot.failed_files > 0 {
            parts.push(format!("{} failed", snapshot.failed_files));
        }
        if let Some(current) = &snapshot.current_file {
            parts.push(truncate_filename(current, self.config.max_filename_width));
        }
        parts.join(" | ")
    }

    /// Freeze the bar at the final counts
    pub fn finish(&mut self, result: &DownloadResult) {
        if let Some(pb) = self.main_progress.take() {
            pb.set_length(result.progress.total_files as u64);
            pb.set_position(result.progress.processed_files() as u64);
            match result.status {
                DownloadStatus::Completed => pb.finish_with_message("Download completed"),
                DownloadStatus::Cancelled => pb.abandon_with_message("Download cancelled"),
                _ => pb.abandon_with_message("Download failed"),
            }
        }
    }
}

/// Shorten `name` to `width` characters, keeping its end
pub fn truncate_filename(name: &str, width: usize) -> String {
    let len = name.chars().count();
    if len <= width {
        return name.to_string();
    }
    if width <= 3 {
        return name.chars().skip(len - width).collect();
    }
    let tail: String = name.chars().skip(len - (width - 3)).collect();
    format!("...{}", tail)
}
