//! Counters emitted through the `metrics` facade.
//!
//! No recorder is installed by this crate; embedders that install one get
//! the counters, everyone else pays a no-op.

use crate::engine::EngineError;
use crate::probe::{Outcome, ProbeKind};

pub const PROBE_TOTAL: &str = "dpiv_probe_total";
pub const ENGINE_START_TOTAL: &str = "dpiv_engine_start_total";

/// Count one finished probe by kind and outcome.
pub fn record_probe_outcome(kind: ProbeKind, outcome: Outcome) {
    metrics::counter!(PROBE_TOTAL, "kind" => kind.as_str(), "outcome" => outcome.label()).increment(1);
}

/// Count one engine start attempt.
pub fn record_engine_start(result: Result<(), &EngineError>) {
    let outcome = match result {
        Ok(()) => "ready",
        Err(EngineError::BinaryNotFound(_)) => "binary_not_found",
        Err(EngineError::Spawn { .. }) => "spawn_failed",
        Err(EngineError::ReadinessTimeout(_)) => "readiness_timeout",
        Err(EngineError::ExitedBeforeReady) => "exited",
        Err(EngineError::Cancelled) => "cancelled",
    };
    metrics::counter!(ENGINE_START_TOTAL, "outcome" => outcome).increment(1);
}
