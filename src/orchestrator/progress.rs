//! Live progress callbacks for a verification run.

use crate::probe::ProbeResult;

/// Events emitted while a run is in progress.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    /// A profile's engine is about to start. `index` is zero-based.
    ProfileStarted { profile: &'a str, index: usize, total: usize },
    /// The engine could not be started; `result` is the recorded Init failure.
    EngineFailed { result: &'a ProbeResult },
    /// One probe finished. Fired in completion order.
    ProbeCompleted { result: &'a ProbeResult },
    /// All probes for a profile finished and the engine was stopped.
    ProfileCompleted { profile: &'a str, successes: usize, total: usize },
}

/// Receives progress events. Called from probe tasks, so it must be cheap
/// and thread-safe.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: &ProgressEvent<'_>) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent<'_>) {
        self(event)
    }
}
