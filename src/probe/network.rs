// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! Real network probe runner.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::classify::{classify, DpiObservation, DpiThresholds, DpiVerdict};
use super::http::{fetch_range, get, HttpClients, ProbeError};
use super::ping::ping_once;
use super::target::{DpiTarget, StandardTarget};
use super::{Probe, ProbeKind, ProbeResult, ProbeRunner};
use crate::telemetry::record_probe_outcome;

/// Per-kind probe budgets and DPI parameters.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub http_timeout: Duration,
    pub ping_timeout: Duration,
    pub dpi_timeout: Duration,
    pub dpi_range_bytes: u64,
    pub thresholds: DpiThresholds,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(3),
            dpi_timeout: Duration::from_secs(7),
            dpi_range_bytes: 262_144,
            thresholds: DpiThresholds::default(),
        }
    }
}

/// Runs probes against the live network.
#[derive(Debug, Clone)]
pub struct NetworkProber {
    clients: HttpClients,
    settings: ProbeSettings,
}

impl NetworkProber {
    pub fn new(settings: ProbeSettings) -> Result<Self, reqwest::Error> {
        let clients = HttpClients::build(settings.http_timeout)?;
        Ok(Self::with_clients(clients, settings))
    }

    pub fn with_clients(clients: HttpClients, settings: ProbeSettings) -> Self {
        Self { clients, settings }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Pre-flight check run without any engine: true when a plain GET fails
    /// within `budget`. Any response at all counts as reachable.
    pub async fn is_domain_blocked(&self, target: &StandardTarget, budget: Duration) -> bool {
        self.is_url_blocked(&target.url(), budget).await
    }

    pub async fn is_url_blocked(&self, url: &str, budget: Duration) -> bool {
        match tokio::time::timeout(budget, get(&self.clients.default, url)).await {
            Ok(Ok(response)) => {
                tracing::debug!(%url, status = response.status, "reachable without bypass");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(%url, error = %e, "unreachable without bypass");
                true
            }
            Err(_) => true,
        }
    }

    async fn probe_http(&self, profile: &str, url: &str, kind: ProbeKind) -> ProbeResult {
        let client = match kind {
            ProbeKind::Tls12 => &self.clients.tls12,
            ProbeKind::Tls13 => match &self.clients.tls13 {
                Some(client) => client,
                None => {
                    let mut result = ProbeResult::failure(profile, url, kind, ProbeError::Unsupported.to_string());
                    result.unsupported = true;
                    return result;
                }
            },
            _ => &self.clients.default,
        };

        let outcome = match tokio::time::timeout(self.settings.http_timeout, get(client, url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout),
        };

        match outcome {
            Ok(response) => {
                tracing::debug!(%profile, %url, %kind, status = response.status, "http probe answered");
                ProbeResult {
                    success: response.success,
                    message: format!("HTTP {}", response.status),
                    timing_ms: Some(response.elapsed.as_secs_f64() * 1000.0),
                    status_code: Some(response.status),
                    bytes: response.content_length,
                    ..ProbeResult::failure(profile, url, kind, "")
                }
            }
            Err(e) => {
                tracing::warn!(%profile, %url, %kind, error = %e, "http probe failed");
                ProbeResult::failure(profile, url, kind, e.to_string())
            }
        }
    }

    async fn probe_ping(&self, profile: &str, host: &str) -> ProbeResult {
        match ping_once(host, self.settings.ping_timeout).await {
            Ok(rtt) => ProbeResult {
                success: true,
                message: match rtt {
                    Some(ms) => format!("{ms} ms"),
                    None => "reply received".to_string(),
                },
                timing_ms: rtt,
                ..ProbeResult::failure(profile, host, ProbeKind::Ping, "")
            },
            Err(e) => ProbeResult::failure(profile, host, ProbeKind::Ping, e.to_string()),
        }
    }

    async fn probe_dpi(&self, profile: &str, target: &DpiTarget) -> ProbeResult {
        let started = Instant::now();
        let fetch = fetch_range(
            &self.clients.default,
            &target.url,
            self.settings.dpi_range_bytes,
            self.settings.dpi_timeout,
        )
        .await;

        let obs = DpiObservation { status: fetch.status, bytes: fetch.bytes, complete: fetch.complete };
        let verdict = classify(&obs, &self.settings.thresholds);
        let name = target.display_name();

        let message = match (fetch.status, &fetch.error) {
            (Some(code), None) => format!(
                "HTTP {code} size={} KB={:.1} {}",
                obs.bytes,
                obs.size_kb(),
                verdict.as_str()
            ),
            (Some(code), Some(err)) => format!(
                "HTTP {code} size={} KB={:.1} {} ({err})",
                obs.bytes,
                obs.size_kb(),
                verdict.as_str()
            ),
            (None, Some(err)) => err.to_string(),
            (None, None) => "error: no response".to_string(),
        };

        tracing::info!(
            %profile,
            target = %name,
            status = ?fetch.status,
            bytes = obs.bytes,
            verdict = verdict.as_str(),
            "dpi probe finished"
        );

        ProbeResult {
            success: verdict == DpiVerdict::Success,
            message,
            likely_blocked: verdict == DpiVerdict::LikelyBlocked,
            timing_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            status_code: fetch.status,
            bytes: fetch.status.map(|_| obs.bytes),
            ..ProbeResult::failure(profile, name.clone(), ProbeKind::Dpi, "")
        }
    }
}

#[async_trait::async_trait]
impl ProbeRunner for NetworkProber {
    async fn run(&self, profile: &str, probe: &Probe, cancel: &CancellationToken) -> ProbeResult {
        let work = async {
            match probe {
                Probe::Http { url, kind } => self.probe_http(profile, url, *kind).await,
                Probe::Ping { host } => self.probe_ping(profile, host).await,
                Probe::Dpi(target) => self.probe_dpi(profile, target).await,
            }
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => ProbeResult::failure(
                profile,
                probe.target_name(),
                probe.kind(),
                ProbeError::Cancelled.to_string(),
            ),
            result = work => result,
        };

        record_probe_outcome(result.kind, result.outcome());
        result
    }
}
