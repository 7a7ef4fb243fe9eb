//! Engine lifecycle error types.
//!
//! Every variant is an *init failure*: the orchestrator records it as a
//! single Init result for the profile and moves on.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while starting the bypass engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine binary not found: {0}")]
    BinaryNotFound(PathBuf),

    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine did not signal readiness within {}ms", .0.as_millis())]
    ReadinessTimeout(Duration),

    #[error("Engine exited before signalling readiness")]
    ExitedBeforeReady,

    #[error("Engine start cancelled")]
    Cancelled,
}

impl EngineError {
    /// Returns true if the engine process was actually launched before failing.
    pub fn was_spawned(&self) -> bool {
        matches!(
            self,
            Self::ReadinessTimeout(_) | Self::ExitedBeforeReady | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failures_never_count_as_spawned() {
        let missing = EngineError::BinaryNotFound(PathBuf::from("bin/winws.exe"));
        assert!(!missing.was_spawned());

        let refused = EngineError::Spawn {
            binary: PathBuf::from("bin/winws.exe"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!refused.was_spawned());

        assert!(EngineError::ReadinessTimeout(Duration::from_secs(5)).was_spawned());
    }

    #[test]
    fn readiness_timeout_message_reports_millis() {
        let err = EngineError::ReadinessTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Engine did not signal readiness within 5000ms");
    }
}
