//! Probe targets and suite construction.

use super::{Probe, ProbeKind};

/// A user-supplied domain, reduced to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardTarget {
    pub host: String,
}

impl StandardTarget {
    /// Strip scheme, path, and surrounding whitespace. Returns `None` when
    /// nothing remains.
    pub fn parse(input: &str) -> Option<Self> {
        let mut host = input.trim();
        if let Some((_, rest)) = host.split_once("://") {
            host = rest;
        }
        if let Some((head, _)) = host.split_once('/') {
            host = head;
        }
        let host = host.trim();
        if host.is_empty() {
            return None;
        }
        Some(Self { host: host.to_string() })
    }

    /// URL used by the HTTP family probes.
    pub fn url(&self) -> String {
        format!("https://{}", self.host)
    }
}

/// One entry of the DPI suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpiTarget {
    pub id: String,
    pub provider: String,
    pub url: String,
    /// How many probes to issue for this entry.
    pub times: u32,
}

impl DpiTarget {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            url: url.into(),
            times: 1,
        }
    }

    pub fn repeated(mut self, times: u32) -> Self {
        self.times = times;
        self
    }

    /// Target that replaces the whole registry with one caller-supplied URL.
    pub fn custom(url: &str) -> Self {
        let url = url.trim();
        let url = if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };
        Self::new("CUSTOM", "Custom", url)
    }

    /// Name used in results and reports.
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.id, self.provider)
    }
}

/// Expand repeat counts. Repeated entries get `@<n>` id suffixes.
pub fn expand_targets(targets: &[DpiTarget]) -> Vec<DpiTarget> {
    let mut expanded = Vec::with_capacity(targets.len());
    for target in targets {
        let times = target.times.max(1);
        for i in 0..times {
            let id = if times > 1 {
                format!("{}@{i}", target.id)
            } else {
                target.id.clone()
            };
            expanded.push(DpiTarget {
                id,
                provider: target.provider.clone(),
                url: target.url.clone(),
                times: 1,
            });
        }
    }
    expanded
}

/// Probes for the standard suite: HTTP, TLS1.2 and TLS1.3 per domain, then
/// one ping per domain.
pub fn standard_probes(targets: &[StandardTarget]) -> Vec<Probe> {
    let mut probes = Vec::with_capacity(targets.len() * 4);
    for target in targets {
        for kind in [ProbeKind::Http, ProbeKind::Tls12, ProbeKind::Tls13] {
            probes.push(Probe::Http { url: target.url(), kind });
        }
    }
    for target in targets {
        probes.push(Probe::Ping { host: target.host.clone() });
    }
    probes
}

/// Probes for the DPI suite, one per already-expanded target.
pub fn dpi_probes(targets: &[DpiTarget]) -> Vec<Probe> {
    targets.iter().cloned().map(Probe::Dpi).collect()
}
