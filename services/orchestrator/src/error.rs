//! Orchestrator errors.

use std::path::PathBuf;

use fleet_command::CommandError;
use fleet_monitoring::PublishError;
use fleet_reconcile::{ReconcileError, ResourceKind};
use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to read cluster manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("invalid cluster manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Shutdown was requested before this resource was converged.
    #[error("stopped before converging the {0}")]
    Interrupted(ResourceKind),

    /// The reconciler returned a handle for a different resource kind.
    #[error("reconciling the {0} returned a mismatched handle")]
    UnexpectedHandle(ResourceKind),

    #[error("{step}: {source}")]
    Command {
        step: &'static str,
        #[source]
        source: CommandError,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl OrchestratorError {
    pub(crate) fn command(step: &'static str) -> impl FnOnce(CommandError) -> Self {
        move |source| Self::Command { step, source }
    }

    /// Returns true if the caller stopped the run.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Interrupted(_)
                | Self::Command {
                    source: CommandError::Cancelled { .. },
                    ..
                }
        )
    }
}
