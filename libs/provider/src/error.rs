//! Provider errors.

use thiserror::Error;

use crate::request::Operation;

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error codes the provider uses for "no such resource".
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchEntity",
    "InvalidKeyPair.NotFound",
    "InvalidGroup.NotFound",
    "InvalidSubnetID.NotFound",
    "ParameterNotFound",
    "ResourceNotFound",
];

/// Error codes worth retrying.
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalError",
    "InternalFailure",
    "ServiceUnavailable",
    "InvocationDoesNotExist",
];

/// Errors returned by a provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure talking to the provider.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error.
    #[error("{operation} failed: {code}: {message}")]
    Service {
        operation: Operation,
        code: String,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    /// The provider returned a response for a different operation.
    #[error("unexpected response to {operation}: got {actual}")]
    UnexpectedResponse {
        operation: Operation,
        actual: Operation,
    },

    /// A recorded client saw a request that differs from the next recording.
    #[error("unexpected request: expected {expected}, got {actual}")]
    UnexpectedRequest { expected: String, actual: String },

    /// A recorded client ran out of recordings.
    #[error("no recorded response left for {0}")]
    NoRecording(Operation),
}

impl ProviderError {
    /// Build a service error.
    pub fn service(
        operation: Operation,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            operation,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if the provider reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { code, .. } if NOT_FOUND_CODES.contains(&code.as_str()))
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Service { code, .. } => TRANSIENT_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    /// The provider error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = ProviderError::service(Operation::GetInstanceProfile, "NoSuchEntity", "gone");
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        let err = ProviderError::service(Operation::ListCommandInvocations, "Throttling", "slow");
        assert!(err.is_transient());
        assert!(!err.is_not_found());
        assert_eq!(err.code(), Some("Throttling"));
    }

    #[test]
    fn test_recording_errors_are_not_transient() {
        let err = ProviderError::NoRecording(Operation::SendCommand);
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "no recorded response left for SendCommand");
    }
}
