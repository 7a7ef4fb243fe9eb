//! Span utilities and extension traits.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for per-profile spans.
pub struct ProfileSpan;

impl ProfileSpan {
    /// Create a span covering one profile's start/probe/stop cycle.
    ///
    /// Fields included:
    /// - `profile`: display name of the profile under test
    /// - `suite`: "standard" or "dpi"
    /// - `status`: filled in by `SpanExt::record_result`
    /// - `error.message`: filled in when the engine fails to start
    /// - `results`: number of results the profile produced
    pub fn new(profile: &str, suite: &str) -> Span {
        info_span!(
            "profile_cycle",
            profile = %profile,
            suite = %suite,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            results = tracing::field::Empty,
        )
    }
}
