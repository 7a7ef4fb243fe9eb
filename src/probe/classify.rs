//! DPI response classification.
//!
//! A DPI box that interferes with a TLS flow typically lets the first
//! 14-22 KB through and then resets, stalls, or injects a block page. A
//! response whose size lands in that window under an error status is
//! reported as likely blocked rather than as an ordinary failure. The window
//! is empirical; keep it configurable.

/// Default lower bound of the block-page window, in KB.
pub const DEFAULT_WARN_MIN_KB: f64 = 14.0;
/// Default upper bound of the block-page window, in KB.
pub const DEFAULT_WARN_MAX_KB: f64 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpiThresholds {
    pub warn_min_kb: f64,
    pub warn_max_kb: f64,
}

impl Default for DpiThresholds {
    fn default() -> Self {
        Self {
            warn_min_kb: DEFAULT_WARN_MIN_KB,
            warn_max_kb: DEFAULT_WARN_MAX_KB,
        }
    }
}

impl DpiThresholds {
    pub fn contains(&self, size_kb: f64) -> bool {
        size_kb >= self.warn_min_kb && size_kb <= self.warn_max_kb
    }
}

/// What a DPI probe observed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpiObservation {
    /// Status code, or `None` if no response headers arrived.
    pub status: Option<u16>,
    /// Body bytes actually received.
    pub bytes: u64,
    /// False when the body read ended in an error or timeout. Reported in
    /// the message only; the verdict depends on status and size.
    pub complete: bool,
}

impl DpiObservation {
    pub fn size_kb(&self) -> f64 {
        self.bytes as f64 / 1024.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpiVerdict {
    Success,
    LikelyBlocked,
    Failure,
}

impl DpiVerdict {
    /// Token used in probe messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::LikelyBlocked => "LIKELY_BLOCKED",
            Self::Failure => "FAIL",
        }
    }
}

pub fn classify(obs: &DpiObservation, thresholds: &DpiThresholds) -> DpiVerdict {
    let success_status = matches!(obs.status, Some(code) if (200..300).contains(&code));
    if success_status && obs.bytes > 0 {
        return DpiVerdict::Success;
    }

    let errored = match obs.status {
        None => true,
        Some(code) => code >= 400,
    };
    if errored && thresholds.contains(obs.size_kb()) {
        DpiVerdict::LikelyBlocked
    } else {
        DpiVerdict::Failure
    }
}
