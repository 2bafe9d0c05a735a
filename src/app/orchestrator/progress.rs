//! Progress tracking and statistics aggregation
//!
//! [`ProgressTracker`] holds the counters of one run. It is owned by the run's
//! ledger and only mutated under the ledger lock, so increments from
//! concurrent transfers are never lost or applied twice. Readers get
//! [`ProgressSnapshot`] copies.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::progress;

/// Point-in-time copy of a run's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Files selected for the run
    pub total_files: usize,
    /// Files transferred
    pub completed_files: usize,
    /// Files left untouched because they already existed
    pub skipped_files: usize,
    /// Files whose transfer failed
    pub failed_files: usize,
    /// Sum of the listed sizes of the selected files
    pub total_bytes: u64,
    /// Bytes written so far, never above `total_bytes`
    pub completed_bytes: u64,
    /// Most recently started file
    pub current_file: Option<String>,
    /// Average throughput since the run started
    pub bytes_per_second: f64,
    /// Estimated seconds until all bytes are written
    pub eta_seconds: Option<f64>,
    /// When the tracker was started
    pub started_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// A snapshot with no work recorded
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            total_files: 0,
            completed_files: 0,
            skipped_files: 0,
            failed_files: 0,
            total_bytes: 0,
            completed_bytes: 0,
            current_file: None,
            bytes_per_second: 0.0,
            eta_seconds: None,
            started_at,
        }
    }

    /// Files that reached an outcome
    pub fn processed_files(&self) -> usize {
        self.completed_files + self.skipped_files + self.failed_files
    }

    /// Calculate completion percentage by file count
    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.processed_files() as f64 / self.total_files as f64 * 100.0).min(100.0)
    }

    /// Check if all files are processed
    pub fn is_complete(&self) -> bool {
        self.processed_files() >= self.total_files
    }

    /// Format download rate as human-readable string
    pub fn format_rate(&self) -> String {
        if self.bytes_per_second < 1024.0 {
            format!("{:.1} B/s", self.bytes_per_second)
        } else if self.bytes_per_second < 1024.0 * 1024.0 {
            format!("{:.1} KB/s", self.bytes_per_second / 1024.0)
        } else {
            format!("{:.1} MB/s", self.bytes_per_second / (1024.0 * 1024.0))
        }
    }

    /// Format ETA as human-readable string
    pub fn format_eta(&self) -> String {
        match self.eta_seconds {
            Some(secs) if secs <= 0.0 => "Complete".to_string(),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(format_duration)
                .unwrap_or_else(|_| "Unknown".to_string()),
            None => "Unknown".to_string(),
        }
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Aggregate counters, throughput and ETA for one run
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    snapshot: ProgressSnapshot,
    started: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            snapshot: ProgressSnapshot::empty(Utc::now()),
            started: Instant::now(),
        }
    }

    /// Reset all counters and record the start time
    pub fn start(&mut self, total_files: usize, total_bytes: u64) {
        self.snapshot = ProgressSnapshot {
            total_files,
            total_bytes,
            ..ProgressSnapshot::empty(Utc::now())
        };
        self.started = Instant::now();
    }

    pub fn record_file_start(&mut self, path: &str) {
        self.snapshot.current_file = Some(path.to_string());
    }

    /// Count a transferred file and recompute throughput and ETA
    pub fn record_file_complete(&mut self, bytes_written: u64) {
        let s = &mut self.snapshot;
        s.completed_files = (s.completed_files + 1).min(s.total_files);
        s.completed_bytes = s.completed_bytes.saturating_add(bytes_written).min(s.total_bytes);
        self.update_rates(self.started.elapsed());
    }

    pub fn record_file_skipped(&mut self) {
        self.snapshot.skipped_files += 1;
    }

    pub fn record_file_failed(&mut self) {
        self.snapshot.failed_files += 1;
    }

    fn update_rates(&mut self, elapsed: Duration) {
        let s = &mut self.snapshot;
        let secs = elapsed.as_secs_f64();
        if secs < progress::MIN_ELAPSED_SECS {
            return;
        }

        let rate = s.completed_bytes as f64 / secs;
        let remaining = s.total_bytes.saturating_sub(s.completed_bytes) as f64;
        s.bytes_per_second = rate;
        s.eta_seconds = (rate > 0.0).then(|| remaining / rate);
    }

    /// Time since `start`
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Immutable copy of the current counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.clone()
    }
}
