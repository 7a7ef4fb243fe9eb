//! dpi-verify
//!
//! Empirical verification of DPI-bypass engine profiles. For every profile
//! the external engine is launched, probes are fired at blocked targets, and
//! the engine is stopped again before the next profile starts.
//!
//! # Guarantees
//!
//! - Engine: at most one live process; every started engine is stopped.
//! - Probes: failures are data, never errors. Each probe is time-bounded.
//! - Reports: plain text, one section per tested profile.

pub mod cli;
pub mod config;
pub mod engine;
pub mod lists;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod shutdown;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use engine::{DirectoryCatalog, EngineLine, ProcessSupervisor, ProfileCatalog, SupervisorConfig};
use lists::{HostLists, GENERAL_LIST};
use orchestrator::{
    OrchestratorConfig, ProfileSelection, ProgressSink, RunError, RunPlan, Suite, SuiteKind, TestOrchestrator,
    TestRun,
};
use probe::{builtin_dpi_targets, DpiTarget, NetworkProber, ProbeSettings, StandardTarget};
use report::{ReportError, ReportWriter};
use shutdown::EngineTracker;

/// Budget for the pre-flight reachability check.
pub const PREFLIGHT_BUDGET: Duration = Duration::from_secs(7);

/// Verifier configuration.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub base_dir: PathBuf,
    pub supervisor: SupervisorConfig,
    pub profiles_dir: PathBuf,
    pub report_dir: PathBuf,
    pub probes: ProbeSettings,
    pub orchestrator: OrchestratorConfig,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let base = PathBuf::from(".");
        Self {
            supervisor: SupervisorConfig::default(),
            profiles_dir: base.join("profiles"),
            report_dir: base.join("reports"),
            probes: ProbeSettings::default(),
            orchestrator: OrchestratorConfig::default(),
            base_dir: base,
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Failed to build HTTP clients: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// The verification facade used by the CLI and by embedding UIs.
pub struct Verifier {
    config: VerifierConfig,
    tracker: EngineTracker,
    catalog: Arc<dyn ProfileCatalog>,
    prober: Arc<NetworkProber>,
    orchestrator: TestOrchestrator<ProcessSupervisor>,
    lists: HostLists,
    reports: ReportWriter,
}

impl Verifier {
    /// Create a verifier reading profiles from `config.profiles_dir`.
    pub fn new(config: VerifierConfig) -> Result<Self, VerifierError> {
        let catalog = Arc::new(DirectoryCatalog::new(config.profiles_dir.clone()));
        Self::with_catalog(config, catalog)
    }

    pub fn with_catalog(config: VerifierConfig, catalog: Arc<dyn ProfileCatalog>) -> Result<Self, VerifierError> {
        let tracker = EngineTracker::new();
        let prober = Arc::new(NetworkProber::new(config.probes.clone()).map_err(VerifierError::HttpClient)?);
        let supervisor = Arc::new(ProcessSupervisor::new(config.supervisor.clone(), tracker.clone()));
        let orchestrator = TestOrchestrator::new(supervisor, prober.clone(), config.orchestrator.clone());

        Ok(Self {
            tracker,
            catalog,
            prober,
            orchestrator,
            lists: HostLists::new(),
            reports: ReportWriter::new(config.report_dir.clone()),
            config,
        })
    }

    /// Receive progress callbacks per profile and per probe.
    pub fn with_progress(self, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            orchestrator: self.orchestrator.with_progress(progress),
            ..self
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Live engine accounting, shared with a [`shutdown::ShutdownCoordinator`].
    pub fn tracker(&self) -> &EngineTracker {
        &self.tracker
    }

    pub fn catalog(&self) -> &Arc<dyn ProfileCatalog> {
        &self.catalog
    }

    pub fn lists(&self) -> &HostLists {
        &self.lists
    }

    /// Raw engine output lines.
    pub fn subscribe_engine_output(&self) -> broadcast::Receiver<EngineLine> {
        self.orchestrator.engine().subscribe()
    }

    /// Pre-flight check with no engine running. `None` for an unparsable domain.
    pub async fn is_domain_blocked(&self, domain: &str) -> Option<bool> {
        let target = StandardTarget::parse(domain)?;
        Some(self.prober.is_domain_blocked(&target, PREFLIGHT_BUDGET).await)
    }

    /// Run one suite over the selected profiles.
    ///
    /// Standard runs take one or more domains. DPI runs use the built-in
    /// registry, or a single custom target when `targets` names one.
    pub async fn run_tests(
        &self,
        kind: SuiteKind,
        selection: ProfileSelection,
        targets: &[String],
        cancel: &CancellationToken,
    ) -> Result<TestRun, VerifierError> {
        let suite = match kind {
            SuiteKind::Standard => {
                let parsed: Vec<StandardTarget> = targets.iter().filter_map(|d| StandardTarget::parse(d)).collect();
                self.register_domains(&parsed).await;
                Suite::Standard { targets: parsed }
            }
            SuiteKind::Dpi => {
                let targets = match targets.iter().map(|t| t.trim()).find(|t| !t.is_empty()) {
                    Some(url) => vec![DpiTarget::custom(url)],
                    None => builtin_dpi_targets(),
                };
                Suite::Dpi { targets }
            }
        };

        let plan = RunPlan { suite, selection };
        Ok(self.orchestrator.run(self.catalog.as_ref(), &plan, cancel).await?)
    }

    /// Write the plain-text report. Returns the new file's path.
    pub async fn export_report(&self, run: &TestRun) -> Result<PathBuf, ReportError> {
        self.reports.export(run).await
    }

    async fn register_domains(&self, targets: &[StandardTarget]) {
        let list = self.config.supervisor.layout.lists_dir.join(GENERAL_LIST);
        for target in targets {
            if let Err(e) = self.lists.add_domain(&list, &target.host).await {
                tracing::warn!(domain = %target.host, error = %e, "could not register domain");
            }
        }
    }
}
