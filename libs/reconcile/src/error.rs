//! Reconciliation errors.

use fleet_provider::ProviderError;
use thiserror::Error;

use crate::descriptor::ResourceRef;

/// Result type for resolve and reconcile operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised while resolving or converging a resource.
///
/// Every variant names the resource it is about. Nothing here is retried
/// internally; the caller decides.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// More than one live resource matched where one was expected.
    #[error("{resource} is ambiguous: {matches} matches ({detail})")]
    ResolutionAmbiguous {
        resource: ResourceRef,
        matches: usize,
        detail: String,
    },

    /// A required resource does not exist and cannot be created.
    #[error("{resource} not found: {detail}")]
    ResourceNotFound { resource: ResourceRef, detail: String },

    /// The provider refused a create or update.
    #[error("{resource}: provider rejected {attribute}: {source}")]
    ReconcileRejected {
        resource: ResourceRef,
        attribute: &'static str,
        #[source]
        source: ProviderError,
    },

    /// A read-only query failed.
    #[error("{resource}: lookup failed: {source}")]
    Lookup {
        resource: ResourceRef,
        #[source]
        source: ProviderError,
    },

    /// Private key material could not be stored.
    #[error("{resource}: failed to store private key: {source}")]
    KeyMaterial {
        resource: ResourceRef,
        #[source]
        source: std::io::Error,
    },
}

impl ReconcileError {
    /// The resource this error is about.
    pub fn resource(&self) -> &ResourceRef {
        match self {
            Self::ResolutionAmbiguous { resource, .. }
            | Self::ResourceNotFound { resource, .. }
            | Self::ReconcileRejected { resource, .. }
            | Self::Lookup { resource, .. }
            | Self::KeyMaterial { resource, .. } => resource,
        }
    }

    /// Returns true if re-running the whole reconciliation may help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReconcileRejected { source, .. } | Self::Lookup { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }
}
