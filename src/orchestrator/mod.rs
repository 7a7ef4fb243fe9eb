//! Test orchestration.
//!
//! Profiles are tested strictly one at a time:
//! `select -> start engine -> settle -> probe in parallel -> stop -> settle`.
//! Only one engine is ever alive, and every path that started one stops it.

mod progress;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::engine::{CatalogError, EngineControl, EngineError, Profile, ProfileCatalog};
use crate::probe::{dpi_probes, standard_probes, DpiTarget, Probe, ProbeResult, ProbeRunner, StandardTarget};
use crate::telemetry::{ProfileSpan, SpanExt};

pub use progress::{NoProgress, ProgressEvent, ProgressSink};

/// Fatal run errors. Nothing has been started when one of these is returned.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("No profiles available")]
    NoProfiles,
    #[error("None of the selected profiles exist: {}", .0.join(", "))]
    NoProfilesSelected(Vec<String>),
    #[error("Failed to enumerate profiles: {0}")]
    Catalog(#[from] CatalogError),
    #[error("A domain is required for the standard suite")]
    EmptyDomain,
    #[error("The DPI suite has no targets")]
    NoTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Standard,
    Dpi,
}

impl SuiteKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Dpi => "dpi",
        }
    }

    /// Name used in report headers.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Dpi => "DPI",
        }
    }
}

/// The probe suite of a run.
#[derive(Debug, Clone)]
pub enum Suite {
    Standard { targets: Vec<StandardTarget> },
    /// Targets are already expanded (one probe each).
    Dpi { targets: Vec<DpiTarget> },
}

impl Suite {
    pub fn kind(&self) -> SuiteKind {
        match self {
            Self::Standard { .. } => SuiteKind::Standard,
            Self::Dpi { .. } => SuiteKind::Dpi,
        }
    }

    /// Probes issued for every profile, in submission order.
    pub fn probes(&self) -> Vec<Probe> {
        match self {
            Self::Standard { targets } => standard_probes(targets),
            Self::Dpi { targets } => dpi_probes(targets),
        }
    }
}

/// Which profiles a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelection {
    All,
    /// Display names, matched case-insensitively, tested in the given order.
    Named(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub suite: Suite,
    pub selection: ProfileSelection,
}

/// All results of one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct TestRun {
    pub suite: SuiteKind,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Profiles that produced results, in test order.
    pub profiles: Vec<String>,
    /// Results grouped by profile in test order, each batch in submission order.
    pub results: Vec<ProbeResult>,
    /// The run was cut short; the interrupted profile's batch was discarded.
    pub cancelled: bool,
}

impl TestRun {
    pub fn results_for<'a>(&'a self, profile: &'a str) -> impl Iterator<Item = &'a ProbeResult> + 'a {
        self.results.iter().filter(move |r| r.profile == profile)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub settle_after_start: Duration,
    pub settle_after_stop: Duration,
    /// Upper bound on probes in flight for one profile.
    pub max_parallel: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            settle_after_start: Duration::from_millis(500),
            settle_after_stop: Duration::from_millis(1000),
            max_parallel: 32,
        }
    }
}

enum ProfileCycle {
    Completed(Vec<ProbeResult>),
    InitFailed(ProbeResult),
    Cancelled,
}

/// Drives the per-profile engine/probe cycle.
pub struct TestOrchestrator<E: EngineControl> {
    engine: Arc<E>,
    runner: Arc<dyn ProbeRunner>,
    config: OrchestratorConfig,
    progress: Arc<dyn ProgressSink>,
}

impl<E: EngineControl> TestOrchestrator<E> {
    pub fn new(engine: Arc<E>, runner: Arc<dyn ProbeRunner>, config: OrchestratorConfig) -> Self {
        Self {
            engine,
            runner,
            config,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Execute `plan` over the catalog.
    ///
    /// Per-profile failures become results; only catalog and plan problems
    /// are returned as errors. On cancellation the live engine is stopped
    /// and the partial run is returned with `cancelled` set.
    pub async fn run(
        &self,
        catalog: &dyn ProfileCatalog,
        plan: &RunPlan,
        cancel: &CancellationToken,
    ) -> Result<TestRun, RunError> {
        let probes = plan.suite.probes();
        if probes.is_empty() {
            return Err(match plan.suite.kind() {
                SuiteKind::Standard => RunError::EmptyDomain,
                SuiteKind::Dpi => RunError::NoTargets,
            });
        }
        let profiles = resolve_profiles(catalog, &plan.selection).await?;
        let suite = plan.suite.kind();

        tracing::info!(
            suite = suite.label(),
            profiles = profiles.len(),
            probes_per_profile = probes.len(),
            "starting verification run"
        );

        let started_at = Local::now();
        let mut tested = Vec::with_capacity(profiles.len());
        let mut results = Vec::new();
        let mut cancelled = false;

        for (index, profile) in profiles.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            self.progress.on_event(&ProgressEvent::ProfileStarted {
                profile: &profile.name,
                index,
                total: profiles.len(),
            });

            let span = ProfileSpan::new(&profile.name, suite.label());
            let cycle = self
                .run_profile(profile, &probes, cancel, &span)
                .instrument(span.clone())
                .await;

            match cycle {
                ProfileCycle::Completed(batch) => {
                    let successes = batch.iter().filter(|r| r.success).count();
                    span.record("results", batch.len());
                    self.progress.on_event(&ProgressEvent::ProfileCompleted {
                        profile: &profile.name,
                        successes,
                        total: batch.len(),
                    });
                    tested.push(profile.name.clone());
                    results.extend(batch);
                }
                ProfileCycle::InitFailed(result) => {
                    span.record("results", 1usize);
                    self.progress.on_event(&ProgressEvent::EngineFailed { result: &result });
                    tested.push(profile.name.clone());
                    results.push(result);
                }
                ProfileCycle::Cancelled => {
                    cancelled = true;
                    break;
                }
            }

            if index + 1 < profiles.len() && !settle(self.config.settle_after_stop, cancel).await {
                cancelled = true;
                break;
            }
        }

        if cancelled {
            tracing::warn!(completed = tested.len(), "verification run cancelled");
        } else {
            tracing::info!(profiles = tested.len(), results = results.len(), "verification run finished");
        }

        Ok(TestRun {
            suite,
            started_at,
            finished_at: Local::now(),
            profiles: tested,
            results,
            cancelled,
        })
    }

    async fn run_profile(
        &self,
        profile: &Profile,
        probes: &[Probe],
        cancel: &CancellationToken,
        span: &tracing::Span,
    ) -> ProfileCycle {
        let mut handle = match self.engine.start(profile, cancel).await {
            Ok(handle) => handle,
            Err(EngineError::Cancelled) => return ProfileCycle::Cancelled,
            Err(e) => {
                tracing::error!(profile = %profile.name, error = %e, "engine start failed");
                span.record_result::<(), _>(&Err(&e));
                return ProfileCycle::InitFailed(ProbeResult::init_failure(&profile.name, e.to_string()));
            }
        };
        tracing::info!(profile = %profile.name, "engine ready");

        // The engine is live from here on; every path below reaches stop.
        let batch = if settle(self.config.settle_after_start, cancel).await {
            Some(self.run_batch(&profile.name, probes, cancel).await)
        } else {
            None
        };

        self.engine.stop(&mut handle).await;

        match batch {
            Some(batch) if !cancel.is_cancelled() => {
                span.record_result::<(), String>(&Ok(()));
                ProfileCycle::Completed(batch)
            }
            _ => ProfileCycle::Cancelled,
        }
    }

    /// Run every probe for one profile on a separate task, so a panicking
    /// probe turns into failure results instead of unwinding past the stop.
    async fn run_batch(&self, profile: &str, probes: &[Probe], cancel: &CancellationToken) -> Vec<ProbeResult> {
        let runner = self.runner.clone();
        let progress = self.progress.clone();
        let cancel_task = cancel.clone();
        let profile_name: Arc<str> = Arc::from(profile);
        let owned: Vec<Probe> = probes.to_vec();
        let max_parallel = self.config.max_parallel.max(1);

        tracing::debug!(%profile, probes = probes.len(), max_parallel, "running probe batch");

        let task = tokio::spawn(async move {
            let mut completed: Vec<(usize, ProbeResult)> = futures::stream::iter(owned.into_iter().enumerate())
                .map(|(index, probe)| {
                    let runner = runner.clone();
                    let progress = progress.clone();
                    let cancel = cancel_task.clone();
                    let profile = profile_name.clone();
                    async move {
                        let result = runner.run(&profile, &probe, &cancel).await;
                        progress.on_event(&ProgressEvent::ProbeCompleted { result: &result });
                        (index, result)
                    }
                })
                .buffer_unordered(max_parallel)
                .collect()
                .await;
            completed.sort_by_key(|(index, _)| *index);
            completed.into_iter().map(|(_, result)| result).collect::<Vec<_>>()
        });

        match task.await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(%profile, error = %e, "probe batch aborted");
                probes
                    .iter()
                    .map(|p| ProbeResult::failure(profile, p.target_name(), p.kind(), format!("error: {e}")))
                    .collect()
            }
        }
    }
}

async fn resolve_profiles(
    catalog: &dyn ProfileCatalog,
    selection: &ProfileSelection,
) -> Result<Vec<Profile>, RunError> {
    let available = catalog.list_available_profiles().await?;
    if available.is_empty() {
        return Err(RunError::NoProfiles);
    }

    match selection {
        ProfileSelection::All => Ok(available),
        ProfileSelection::Named(names) => {
            let mut chosen: Vec<Profile> = Vec::with_capacity(names.len());
            for name in names {
                match available.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
                    Some(p) if !chosen.iter().any(|c| c.name == p.name) => chosen.push(p.clone()),
                    Some(_) => {}
                    None => tracing::warn!(profile = %name, "selected profile not found, skipping"),
                }
            }
            if chosen.is_empty() {
                Err(RunError::NoProfilesSelected(names.clone()))
            } else {
                Ok(chosen)
            }
        }
    }
}

/// Sleep for `delay` unless cancelled first. Returns false on cancellation.
async fn settle(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
