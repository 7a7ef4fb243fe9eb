//! Telemetry module.
//!
//! Provides structured logging, per-profile spans, and outcome counters.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{record_engine_start, record_probe_outcome, ENGINE_START_TOTAL, PROBE_TOTAL};
pub use spans::{ProfileSpan, SpanExt};
