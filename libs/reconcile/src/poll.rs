//! Convergence poller.
//!
//! Bridges an accept-now/apply-later remote write to a confirmed read. The
//! shape is the same for every resource kind; only the check differs (a list
//! entry appears, a field reaches a value, a status turns `running`).

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ConvergenceError;

/// Default interval between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default overall budget for one convergence wait.
pub const DEFAULT_CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a single convergence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult<T, E> {
    /// The expected condition holds. May carry something discovered on the
    /// way, such as the id of a newly listed key.
    Converged(T),

    /// Not there yet; retry after the interval.
    NotYetConverged(String),

    /// The read failed in a way retrying cannot fix.
    TerminalFailure(E),
}

impl<T, E> ConvergenceResult<T, E> {
    /// Shorthand for `NotYetConverged`.
    pub fn pending(reason: impl Into<String>) -> Self {
        Self::NotYetConverged(reason.into())
    }

    /// Returns true if the condition holds.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged(_))
    }
}

/// Fixed-interval poller bounded by a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    /// Wait between checks.
    pub interval: Duration,

    /// Overall budget, measured from the first check.
    pub timeout: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_CONVERGENCE_TIMEOUT,
        }
    }
}

impl Poller {
    /// Create a poller.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Same interval, different budget.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Run `check` until it converges, fails terminally, or time runs out.
    ///
    /// The first check runs immediately. A check still in flight at the
    /// deadline is dropped and reported as a timeout.
    pub async fn poll_until<T, E, F, Fut>(
        &self,
        resource: &str,
        mut check: F,
    ) -> Result<T, ConvergenceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ConvergenceResult<T, E>>,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout_at(deadline, check()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(resource, attempt, "Convergence check still running at deadline");
                    return Err(ConvergenceError::Timeout {
                        resource: resource.to_string(),
                        elapsed: started.elapsed(),
                        reason: "check did not complete before the deadline".to_string(),
                    });
                }
            };

            match outcome {
                ConvergenceResult::Converged(value) => {
                    debug!(
                        resource,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Converged"
                    );
                    return Ok(value);
                }
                ConvergenceResult::TerminalFailure(source) => {
                    return Err(ConvergenceError::Terminal {
                        resource: resource.to_string(),
                        source,
                    });
                }
                ConvergenceResult::NotYetConverged(reason) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(resource, attempt, reason = %reason, "Convergence timed out");
                        return Err(ConvergenceError::Timeout {
                            resource: resource.to_string(),
                            elapsed: now - started,
                            reason,
                        });
                    }

                    debug!(resource, attempt, reason = %reason, "Not yet converged");
                    tokio::time::sleep(self.interval.min(deadline - now)).await;
                }
            }
        }
    }
}
