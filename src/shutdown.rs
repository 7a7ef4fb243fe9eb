//! Engine liveness tracking and graceful shutdown coordination.
//!
//! Every started engine process holds an [`EngineGuard`] until it is disposed.
//! The coordinator cancels the active run and waits for the live count to
//! drain to zero, so Ctrl+C never leaves a packet-filter process behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of a shutdown operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { live: usize },
}

/// Counts engine processes that have been spawned but not yet disposed.
#[derive(Debug, Clone, Default)]
pub struct EngineTracker {
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl EngineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned engine.
    pub fn acquire(&self) -> EngineGuard {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        EngineGuard {
            live: self.live.clone(),
            notify: self.notify.clone(),
        }
    }

    /// Engines currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of engines that were ever alive at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Wait until no engine is alive, or the timeout elapses.
    pub async fn wait_idle(&self, timeout: Duration) -> ShutdownResult {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking so a release between the two is not missed.
            let notified = self.notify.notified();
            let count = self.live();
            if count == 0 {
                return ShutdownResult::Complete;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return ShutdownResult::Timeout { live: count };
            }

            tokio::select! {
                _ = notified => continue,
                _ = tokio::time::sleep(remaining) => {
                    let final_count = self.live();
                    if final_count == 0 {
                        return ShutdownResult::Complete;
                    }
                    return ShutdownResult::Timeout { live: final_count };
                }
            }
        }
    }
}

/// RAII guard for one live engine process.
#[derive(Debug)]
pub struct EngineGuard {
    live: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Coordinates graceful shutdown of an in-progress verification run.
pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    cancel: CancellationToken,
    tracker: EngineTracker,
}

impl ShutdownCoordinator {
    pub fn new(tracker: EngineTracker) -> Self {
        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            cancel: CancellationToken::new(),
            tracker,
        }
    }

    /// Token observed by the orchestrator, the supervisor and every probe.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn state(&self) -> ShutdownState {
        *self.state.read().await
    }

    /// Cancel the run and wait for every engine to be disposed.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        {
            let mut state = self.state.write().await;
            *state = ShutdownState::Draining;
        }
        tracing::info!(live = self.tracker.live(), "shutdown requested, cancelling run");
        self.cancel.cancel();

        let result = self.tracker.wait_idle(timeout).await;

        {
            let mut state = self.state.write().await;
            *state = ShutdownState::Stopped;
        }

        if let ShutdownResult::Timeout { live } = &result {
            tracing::warn!(live, "engines still alive after shutdown timeout");
        }
        result
    }
}
