//! Convergence errors.

use std::time::Duration;

use thiserror::Error;

/// Why a convergence wait ended without the expected condition.
#[derive(Debug, Error)]
pub enum ConvergenceError<E> {
    /// Timeout waiting for convergence. Carries the last not-yet reason.
    #[error("timeout after {elapsed:?} waiting for {resource}: {reason}")]
    Timeout {
        resource: String,
        elapsed: Duration,
        reason: String,
    },

    /// The check itself failed in a way retrying cannot fix.
    #[error("{resource}: {source}")]
    Terminal { resource: String, source: E },
}

impl<E> ConvergenceError<E> {
    /// Returns true if the wait ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Map the terminal error type.
    pub fn map_terminal<F, G>(self, f: G) -> ConvergenceError<F>
    where
        G: FnOnce(E) -> F,
    {
        match self {
            Self::Timeout {
                resource,
                elapsed,
                reason,
            } => ConvergenceError::Timeout {
                resource,
                elapsed,
                reason,
            },
            Self::Terminal { resource, source } => ConvergenceError::Terminal {
                resource,
                source: f(source),
            },
        }
    }
}
