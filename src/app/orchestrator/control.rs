//! Run control: cooperative cancellation and pause
//!
//! A [`RunControl`] is created per run and cloned into every place that needs
//! to observe it. Cancellation is a [`CancellationToken`]; pause is a `watch`
//! flag so waiters wake as soon as the run is resumed or cancelled.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Shared cancel and pause state of one run
#[derive(Debug, Clone)]
pub struct RunControl {
    token: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            token: CancellationToken::new(),
            paused: Arc::new(paused),
        }
    }

    /// Request cancellation; returns `true` only for the call that changed state
    pub fn cancel(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Pause the run; returns `true` only for the call that changed state
    pub fn pause(&self) -> bool {
        self.paused.send_if_modified(|paused| !std::mem::replace(paused, true))
    }

    /// Resume the run; returns `true` only for the call that changed state
    pub fn resume(&self) -> bool {
        self.paused.send_if_modified(|paused| std::mem::replace(paused, false))
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Wait while the run is paused
    ///
    /// Returns `true` when the run may proceed and `false` if it was cancelled
    /// instead. Returns immediately when the run is not paused.
    pub async fn wait_if_paused(&self) -> bool {
        let mut rx = self.paused.subscribe();
        loop {
            if self.token.is_cancelled() {
                return false;
            }
            if !*rx.borrow_and_update() {
                return true;
            }
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }
}
