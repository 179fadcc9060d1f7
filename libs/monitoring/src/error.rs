//! Monitoring publication errors.

use std::path::PathBuf;

use fleet_provider::ProviderError;
use thiserror::Error;

/// Result type for rendering and publishing.
pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    /// The provider refused a dashboard, alarm or parameter.
    #[error("provider rejected {target}: {source}")]
    PublishRejected {
        target: String,
        #[source]
        source: ProviderError,
    },

    /// Reading the stored configuration hash failed.
    #[error("failed to read parameter {parameter}: {source}")]
    ParameterLookup {
        parameter: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to read template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {path} is not valid JSON: {source}")]
    TemplateParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Dashboard and alarm templates must be JSON arrays.
    #[error("template {path} must be a JSON array of items")]
    TemplateShape { path: PathBuf },
}

impl PublishError {
    pub(crate) fn rejected(target: impl Into<String>, source: ProviderError) -> Self {
        Self::PublishRejected {
            target: target.into(),
            source,
        }
    }
}
