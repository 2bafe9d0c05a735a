//! Configuration structures for the download orchestrator
//!
//! This module defines the concurrency limits and progress logging options
//! applied to every run the orchestrator executes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{progress, workers};

/// Configuration for the download orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker count suggested to request builders
    pub default_workers: usize,
    /// Hard ceiling on concurrent transfers; larger requests are clamped
    pub max_workers: usize,
    /// How often a running session logs a progress line
    #[serde(with = "humantime_serde")]
    pub progress_log_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_workers: workers::DEFAULT_WORKER_COUNT,
            max_workers: workers::MAX_WORKER_COUNT,
            progress_log_interval: progress::LOG_INTERVAL,
        }
    }
}

impl OrchestratorConfig {
    /// Set the default and maximum worker counts
    pub fn with_workers(mut self, default_workers: usize, max_workers: usize) -> Self {
        self.default_workers = default_workers;
        self.max_workers = max_workers;
        self
    }

    /// Set progress log interval
    pub fn with_progress_log_interval(mut self, interval: Duration) -> Self {
        self.progress_log_interval = interval;
        self
    }

    /// Worker count a run will actually use for `requested`
    ///
    /// Returns `None` for zero, which no run can execute with.
    pub fn effective_workers(&self, requested: usize) -> Option<usize> {
        (requested > 0).then(|| requested.min(self.max_workers))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("Maximum worker count cannot be zero".to_string());
        }

        if self.default_workers == 0 {
            return Err("Default worker count cannot be zero".to_string());
        }

        if self.default_workers > self.max_workers {
            return Err(format!(
                "Default worker count {} exceeds maximum {}",
                self.default_workers, self.max_workers
            ));
        }

        if self.progress_log_interval.is_zero() {
            return Err("Progress log interval cannot be zero".to_string());
        }

        Ok(())
    }
}
