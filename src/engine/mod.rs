//! Bypass engine lifecycle.
//!
//! Profiles describe how to launch the engine; the supervisor owns the
//! process from spawn until disposal. The [`EngineControl`] trait is the seam
//! the orchestrator drives, so tests can substitute a fake engine.

pub mod args;
pub mod error;
mod handle;
pub mod profile;
mod supervisor;

pub use args::{render_arguments, LaunchLayout, LaunchOptions, DEFAULT_ARGUMENTS};
pub use error::EngineError;
pub use handle::EngineHandle;
pub use profile::{CatalogError, DirectoryCatalog, Profile, ProfileCatalog, StaticCatalog};
pub use supervisor::{
    default_binary, EngineLine, ProcessSupervisor, StreamKind, SupervisorConfig, READY_MARKER,
};

use tokio_util::sync::CancellationToken;

/// Start/stop contract for an engine implementation.
#[async_trait::async_trait]
pub trait EngineControl: Send + Sync {
    /// Live engine handle. Exclusively owned by the caller until stopped.
    type Handle: Send;

    /// Launch the engine for `profile` and wait for readiness.
    ///
    /// On any failure the engine has already been stopped when this returns.
    async fn start(&self, profile: &Profile, cancel: &CancellationToken) -> Result<Self::Handle, EngineError>;

    /// Terminate the engine and release the handle. Never fails and is
    /// idempotent; errors are logged.
    async fn stop(&self, handle: &mut Self::Handle);
}
