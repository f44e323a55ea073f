//! Provider errors.

use std::time::Duration;

use gandi_id::IdError;
use gandi_reconcile::ConvergenceError;
use thiserror::Error;

use crate::client::ClientError;
use crate::lifecycle::Phase;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write was accepted but never became visible in time. The write is
    /// not undone; re-applying is safe.
    #[error("timeout after {elapsed:?} waiting for {resource}: {reason}")]
    ConvergenceTimeout {
        resource: String,
        elapsed: Duration,
        reason: String,
    },

    /// The remote rejected a call.
    #[error("remote error: {0}")]
    Remote(ClientError),

    #[error("invalid id: {0}")]
    InvalidId(#[from] IdError),

    /// The declared change cannot be applied in place.
    #[error("{resource}: changing {attribute} requires replacing the resource")]
    RequiresReplacement { resource: String, attribute: String },

    #[error("{resource}: cannot {operation} while {phase}")]
    InvalidTransition {
        resource: String,
        phase: Phase,
        operation: &'static str,
    },

    /// Declared attributes the remote would reject.
    #[error("invalid {attribute}: {message}")]
    InvalidSpec {
        attribute: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Returns true if re-running the same operation later may succeed.
    ///
    /// Nothing retries automatically; this is for the caller's reporting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConvergenceTimeout { .. } => true,
            Self::Remote(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn invalid_spec(attribute: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            attribute,
            message: message.into(),
        }
    }

    pub(crate) fn requires_replacement(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::RequiresReplacement {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

impl From<ClientError> for ProviderError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::NotFound(what) => Self::NotFound(what),
            other => Self::Remote(other),
        }
    }
}

impl From<ConvergenceError<ClientError>> for ProviderError {
    fn from(e: ConvergenceError<ClientError>) -> Self {
        match e {
            ConvergenceError::Timeout {
                resource,
                elapsed,
                reason,
            } => Self::ConvergenceTimeout {
                resource,
                elapsed,
                reason,
            },
            ConvergenceError::Terminal { source, .. } => source.into(),
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = ProviderError::ConvergenceTimeout {
            resource: "record".to_string(),
            elapsed: Duration::from_secs(60),
            reason: "not listed".to_string(),
        };
        assert!(timeout.is_retryable());

        assert!(ProviderError::from(ClientError::api(503, "503", "unavailable")).is_retryable());
        assert!(ProviderError::from(ClientError::api(429, "429", "slow down")).is_retryable());
        assert!(!ProviderError::from(ClientError::api(403, "403", "forbidden")).is_retryable());
        assert!(!ProviderError::requires_replacement("r", "name").is_retryable());
    }

    #[test]
    fn test_not_found_is_kept_distinct() {
        let err = ProviderError::from(ClientError::NotFound("record".to_string()));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_convergence_error_conversion() {
        let err: ProviderError = ConvergenceError::<ClientError>::Terminal {
            resource: "r".to_string(),
            source: ClientError::api(400, "400", "bad"),
        }
        .into();
        assert!(matches!(err, ProviderError::Remote(ClientError::Api { status: 400, .. })));

        let err: ProviderError = ConvergenceError::<ClientError>::Timeout {
            resource: "r".to_string(),
            elapsed: Duration::from_secs(1),
            reason: "pending".to_string(),
        }
        .into();
        assert!(err.to_string().contains("pending"));
    }
}
