//! Network probes and their results.
//!
//! A probe never fails: every transport error, timeout, or cancellation is
//! folded into a [`ProbeResult`] so the orchestrator only ever sees data.

pub mod classify;
mod http;
mod network;
mod ping;
pub mod registry;
pub mod target;

use std::fmt;

use tokio_util::sync::CancellationToken;

pub use classify::{classify, DpiObservation, DpiThresholds, DpiVerdict};
pub use http::HttpClients;
pub use network::{NetworkProber, ProbeSettings};
pub use ping::parse_rtt_ms;
pub use registry::{builtin_dpi_suite, builtin_dpi_targets};
pub use target::{dpi_probes, expand_targets, standard_probes, DpiTarget, StandardTarget};

/// Target name used for engine start failures.
pub const INIT_TARGET: &str = "INIT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeKind {
    Http,
    Tls12,
    Tls13,
    Ping,
    Dpi,
    Init,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Tls12 => "TLS1.2",
            Self::Tls13 => "TLS1.3",
            Self::Ping => "Ping",
            Self::Dpi => "DPI",
            Self::Init => "Init",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting category of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
    LikelyBlocked,
    Unsupported,
}

impl Outcome {
    /// Status word shown in reports.
    pub fn status_word(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILED",
            Self::LikelyBlocked => "LIKELY BLOCKED",
            Self::Unsupported => "UNSUPPORTED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::LikelyBlocked => "likely_blocked",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Result of one probe. Identified by (profile, target, kind).
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub profile: String,
    pub target: String,
    pub kind: ProbeKind,
    pub success: bool,
    pub message: String,
    pub likely_blocked: bool,
    /// The platform could not run this probe at all (TLS1.3 only).
    pub unsupported: bool,
    pub timing_ms: Option<f64>,
    pub status_code: Option<u16>,
    pub bytes: Option<u64>,
}

impl ProbeResult {
    /// A failed result with no measurements.
    pub fn failure(
        profile: impl Into<String>,
        target: impl Into<String>,
        kind: ProbeKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            profile: profile.into(),
            target: target.into(),
            kind,
            success: false,
            message: message.into(),
            likely_blocked: false,
            unsupported: false,
            timing_ms: None,
            status_code: None,
            bytes: None,
        }
    }

    /// The single result recorded when the engine could not be started.
    pub fn init_failure(profile: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failure(profile, INIT_TARGET, ProbeKind::Init, message)
    }

    pub fn outcome(&self) -> Outcome {
        if self.unsupported {
            Outcome::Unsupported
        } else if self.success {
            Outcome::Success
        } else if self.likely_blocked {
            Outcome::LikelyBlocked
        } else {
            Outcome::Failure
        }
    }
}

/// One bounded network check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// GET over the default client (`Http`) or a TLS-pinned one.
    Http { url: String, kind: ProbeKind },
    Ping { host: String },
    Dpi(DpiTarget),
}

impl Probe {
    pub fn kind(&self) -> ProbeKind {
        match self {
            Self::Http { kind, .. } => *kind,
            Self::Ping { .. } => ProbeKind::Ping,
            Self::Dpi(_) => ProbeKind::Dpi,
        }
    }

    pub fn target_name(&self) -> String {
        match self {
            Self::Http { url, .. } => url.clone(),
            Self::Ping { host } => host.clone(),
            Self::Dpi(target) => target.display_name(),
        }
    }
}

/// Executes probes on behalf of the orchestrator.
#[async_trait::async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Run one probe. Must resolve promptly once `cancel` fires.
    async fn run(&self, profile: &str, probe: &Probe, cancel: &CancellationToken) -> ProbeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_precedence() {
        let mut r = ProbeResult::failure("p", "t", ProbeKind::Tls13, "x");
        assert_eq!(r.outcome(), Outcome::Failure);
        r.likely_blocked = true;
        assert_eq!(r.outcome(), Outcome::LikelyBlocked);
        r.unsupported = true;
        assert_eq!(r.outcome(), Outcome::Unsupported);
        assert_eq!(r.outcome().status_word(), "UNSUPPORTED");
    }

    #[test]
    fn init_failure_shape() {
        let r = ProbeResult::init_failure("ALT", "Engine binary not found");
        assert_eq!(r.kind, ProbeKind::Init);
        assert_eq!(r.target, INIT_TARGET);
        assert!(!r.success);
    }

    #[test]
    fn kind_display_names() {
        assert_eq!(ProbeKind::Tls12.to_string(), "TLS1.2");
        assert_eq!(ProbeKind::Ping.to_string(), "Ping");
    }
}
