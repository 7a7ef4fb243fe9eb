// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process supervisor for the bypass engine.
//!
//! Launches the engine with rendered arguments, watches its output for the
//! capture-started marker, and guarantees termination on stop.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::args::{render_arguments, LaunchLayout, LaunchOptions};
use super::error::EngineError;
use super::handle::EngineHandle;
use super::profile::Profile;
use super::EngineControl;
use crate::shutdown::EngineTracker;
use crate::telemetry::record_engine_start;

/// Output substring the engine prints once packet capture is running.
pub const READY_MARKER: &str = "windivert initialized. capture is started.";

const LINE_CHANNEL_CAPACITY: usize = 256;
const KILL_CONFIRM_WAIT: Duration = Duration::from_secs(2);

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Engine executable.
    pub binary: PathBuf,
    /// Working directory for the engine; relative list paths resolve here.
    pub working_dir: PathBuf,
    pub layout: LaunchLayout,
    pub options: LaunchOptions,
    /// How long to wait for the readiness marker.
    pub ready_timeout: Duration,
    /// How long a graceful close may take.
    pub stop_timeout: Duration,
    /// Fixed extension added to `stop_timeout` before forcing termination.
    pub stop_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        let base = PathBuf::from(".");
        Self {
            binary: base.join(default_binary()),
            layout: LaunchLayout::under(&base),
            working_dir: base,
            options: LaunchOptions::default(),
            ready_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// Platform default location of the engine executable, relative to the base dir.
pub fn default_binary() -> &'static str {
    if cfg!(windows) {
        "bin/winws.exe"
    } else {
        "bin/nfqws"
    }
}

/// Which engine stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One raw line of engine output, as published to subscribers.
#[derive(Debug, Clone)]
pub struct EngineLine {
    pub profile: String,
    pub stream: StreamKind,
    pub line: String,
}

/// Starts and stops engine processes.
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    tracker: EngineTracker,
    lines: broadcast::Sender<EngineLine>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, tracker: EngineTracker) -> Self {
        let (lines, _) = broadcast::channel(LINE_CHANNEL_CAPACITY);
        Self { config, tracker, lines }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &EngineTracker {
        &self.tracker
    }

    /// Receive raw engine output lines. Lagging receivers drop old lines.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineLine> {
        self.lines.subscribe()
    }

    fn build_command(&self, profile: &Profile) -> Command {
        let args = render_arguments(&profile.arguments, &self.config.layout, self.config.options);
        tracing::debug!(profile = %profile.name, args = ?args, "rendered engine arguments");

        let mut command = Command::new(&self.config.binary);
        command
            .args(&args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            use windows_sys::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        command
    }

    async fn launch(&self, profile: &Profile, cancel: &CancellationToken) -> Result<EngineHandle, EngineError> {
        if !self.config.binary.is_file() {
            return Err(EngineError::BinaryNotFound(self.config.binary.clone()));
        }

        let mut child = self.build_command(profile).spawn().map_err(|source| EngineError::Spawn {
            binary: self.config.binary.clone(),
            source,
        })?;
        let guard = self.tracker.acquire();
        tracing::info!(profile = %profile.name, pid = ?child.id(), "engine spawned");

        let (ready_tx, ready_rx) = oneshot::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(
                stdout,
                StreamKind::Stdout,
                profile.name.clone(),
                self.lines.clone(),
                Some(ready_tx),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(
                stderr,
                StreamKind::Stderr,
                profile.name.clone(),
                self.lines.clone(),
                None,
            ));
        }

        let mut handle = EngineHandle::new(child, readers, guard);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EngineError::Cancelled),
            ready = ready_rx => match ready {
                Ok(()) => Ok(()),
                Err(_) => Err(EngineError::ExitedBeforeReady),
            },
            () = tokio::time::sleep(self.config.ready_timeout) => {
                Err(EngineError::ReadinessTimeout(self.config.ready_timeout))
            }
        };

        match outcome {
            Ok(()) => Ok(handle),
            Err(e) => {
                tracing::warn!(profile = %profile.name, error = %e, "engine failed to become ready");
                self.stop(&mut handle).await;
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
impl EngineControl for ProcessSupervisor {
    type Handle = EngineHandle;

    async fn start(&self, profile: &Profile, cancel: &CancellationToken) -> Result<EngineHandle, EngineError> {
        let result = self.launch(profile, cancel).await;
        record_engine_start(result.as_ref().map(|_| ()));
        result
    }

    async fn stop(&self, handle: &mut EngineHandle) {
        if handle.is_disposed() {
            return;
        }
        if handle.has_exited() {
            handle.dispose();
            return;
        }

        let pid = handle.pid();
        if let Err(e) = handle.signal_close() {
            tracing::warn!(?pid, error = %e, "graceful close failed, killing engine");
            if let Err(e) = handle.force_kill() {
                tracing::warn!(?pid, error = %e, "kill failed");
            }
        }

        let limit = self.config.stop_timeout + self.config.stop_grace;
        if !handle.wait_for_exit(limit).await {
            tracing::warn!(?pid, limit_ms = limit.as_millis() as u64, "engine ignored close, killing");
            if let Err(e) = handle.force_kill() {
                tracing::warn!(?pid, error = %e, "kill failed");
            }
            if !handle.wait_for_exit(KILL_CONFIRM_WAIT).await {
                tracing::error!(?pid, "engine still running after kill");
            }
        }

        handle.dispose();
        tracing::info!(?pid, "engine stopped");
    }
}

/// Drain one output stream, publishing every line and firing `ready` on the
/// first line that carries the readiness marker.
fn spawn_reader<R>(
    stream: R,
    kind: StreamKind,
    profile: String,
    lines: broadcast::Sender<EngineLine>,
    mut ready: Option<oneshot::Sender<()>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if ready.is_some() && line.to_lowercase().contains(READY_MARKER) {
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(());
                        }
                    }
                    match kind {
                        StreamKind::Stdout => tracing::trace!(target: "engine", %profile, "{line}"),
                        StreamKind::Stderr => tracing::debug!(target: "engine", %profile, "stderr: {line}"),
                    }
                    // No subscribers is not an error.
                    let _ = lines.send(EngineLine {
                        profile: profile.clone(),
                        stream: kind,
                        line,
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(%profile, error = %e, "engine stream read failed");
                    break;
                }
            }
        }
    })
}
