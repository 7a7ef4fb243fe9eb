// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! Owned handle to one running engine process.

use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::shutdown::EngineGuard;

/// A launched engine process plus the tasks draining its output.
///
/// Created by the supervisor on start and consumed by `dispose`. Dropping a
/// handle disposes it, which kills the process if it is still alive.
#[derive(Debug)]
pub struct EngineHandle {
    child: Child,
    pid: Option<u32>,
    readers: Vec<JoinHandle<()>>,
    exited: bool,
    disposed: bool,
    guard: Option<EngineGuard>,
}

impl EngineHandle {
    pub(crate) fn new(child: Child, readers: Vec<JoinHandle<()>>, guard: EngineGuard) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            readers,
            exited: false,
            disposed: false,
            guard: Some(guard),
        }
    }

    /// OS process identifier, if the process was running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Non-blocking exit check. Keeps polling the process after `dispose`
    /// until its exit has been observed.
    pub fn has_exited(&mut self) -> bool {
        if self.exited {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = ?self.pid, %status, "engine exited");
                self.mark_exited();
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(pid = ?self.pid, error = %e, "failed to poll engine status");
                false
            }
        }
    }

    /// Wait up to `limit` for the process to exit. Returns whether it did.
    pub async fn wait_for_exit(&mut self, limit: Duration) -> bool {
        if self.has_exited() {
            return true;
        }
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid = ?self.pid, %status, "engine exited");
                self.mark_exited();
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(pid = ?self.pid, error = %e, "failed to wait for engine");
                false
            }
            Err(_) => false,
        }
    }

    /// Ask the engine to shut down on its own.
    pub fn signal_close(&self) -> std::io::Result<()> {
        let pid = self
            .pid
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "engine has no pid"))?;
        platform::request_close(pid)
    }

    /// Begin forced termination without waiting for it.
    pub fn force_kill(&mut self) -> std::io::Result<()> {
        if self.exited {
            return Ok(());
        }
        self.child.start_kill()
    }

    /// Release the process and its reader tasks. Idempotent.
    ///
    /// The tracker slot is freed only once the exit has been observed; a
    /// process that is still alive keeps it until a later `has_exited` or
    /// `wait_for_exit` confirms the exit.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if !self.has_exited() {
            if let Err(e) = self.child.start_kill() {
                tracing::warn!(pid = ?self.pid, error = %e, "kill during dispose failed");
            }
        }
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        self.disposed = true;
        if !self.has_exited() {
            tracing::warn!(pid = ?self.pid, "engine exit not yet observed, slot stays occupied");
        }
    }

    fn mark_exited(&mut self) {
        self.exited = true;
        self.guard.take();
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.dispose();
        if self.guard.take().is_some() {
            tracing::error!(pid = ?self.pid, "engine handle dropped before its exit was observed");
        }
    }
}

#[cfg(unix)]
mod platform {
    /// Send SIGTERM to a process.
    pub fn request_close(pid: u32) -> std::io::Result<()> {
        let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if ret == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(windows)]
mod platform {
    use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

    /// Deliver Ctrl+Break to the engine's process group.
    ///
    /// The supervisor spawns the engine in its own group so the event never
    /// reaches this process.
    pub fn request_close(pid: u32) -> std::io::Result<()> {
        let ok = unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) };
        if ok == 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    pub fn request_close(_pid: u32) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "graceful close is not supported on this platform",
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::shutdown::EngineTracker;

    fn spawn(tracker: &EngineTracker, script: &str) -> EngineHandle {
        let child = tokio::process::Command::new("/bin/sh")
            .args(["-c", script])
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        EngineHandle::new(child, Vec::new(), tracker.acquire())
    }

    #[tokio::test]
    async fn slot_is_held_until_exit_is_observed() {
        let tracker = EngineTracker::new();
        let mut handle = spawn(&tracker, "exec sleep 30");
        assert!(!handle.has_exited());
        assert_eq!(tracker.live(), 1);

        handle.dispose();
        assert!(handle.is_disposed());
        // A freed slot always means the exit was seen.
        if tracker.live() == 0 {
            assert!(handle.has_exited());
        }

        assert!(handle.wait_for_exit(Duration::from_secs(2)).await);
        assert!(handle.has_exited());
        assert_eq!(tracker.live(), 0);
    }

    #[tokio::test]
    async fn self_exit_frees_slot_on_first_poll() {
        let tracker = EngineTracker::new();
        let mut handle = spawn(&tracker, "exit 0");
        assert!(handle.wait_for_exit(Duration::from_secs(2)).await);
        assert_eq!(tracker.live(), 0);

        handle.dispose();
        handle.dispose();
        assert!(handle.has_exited());
        assert_eq!(tracker.live(), 0);
    }

    #[tokio::test]
    async fn dropped_handle_releases_slot() {
        let tracker = EngineTracker::new();
        let mut handle = spawn(&tracker, "trap '' TERM; exec sleep 30");
        handle.signal_close().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // TERM is ignored, so the engine is still alive and counted.
        assert!(!handle.has_exited());
        assert_eq!(tracker.live(), 1);

        drop(handle);
        assert_eq!(tracker.live(), 0);
    }
}
