//! Resource lifecycle orchestration.
//!
//! Every managed resource goes through the same sequence: issue a write,
//! wait for it to become visible, read it back. [`Lifecycle`] owns that
//! sequence for all resource kinds. It serializes operations per resource,
//! bounds each one by a deadline, and tracks the resource's [`Phase`].
//!
//! # Phases
//!
//! ```text
//! Absent ──create──▶ Creating ──write accepted──▶ Converging ──▶ Present
//! Present ──update──▶ Updating ──write accepted──▶ Converging ──▶ Present
//! Present ──delete──▶ Deleting ──▶ Absent
//! ```
//!
//! An operation that fails after its write was accepted leaves the resource
//! `Unconfirmed`: the remote may or may not hold the change, so nothing is
//! recorded as present. Any operation may start from `Unconfirmed`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use gandi_reconcile::{ConvergenceResult, Poller, DEFAULT_POLL_INTERVAL};
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::config::Config;
use crate::error::{ProviderError, Result};
use crate::locks::ResourceLocks;

/// Default operation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle phase of one managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Absent,
    Creating,
    Updating,
    Converging,
    Present,
    Deleting,
    /// A write was issued but its effect was never confirmed.
    Unconfirmed,
}

impl Phase {
    /// Returns true while an operation is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Updating | Self::Converging | Self::Deleting
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Updating => "updating",
            Self::Converging => "converging",
            Self::Present => "present",
            Self::Deleting => "deleting",
            Self::Unconfirmed => "unconfirmed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a delete did to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The remote object was destroyed.
    Removed,

    /// The remote object was returned to its default.
    Reverted,

    /// Only the values this tool owned were removed from a shared object.
    PartiallyReleased,

    /// The resource was dropped from management; the remote is untouched.
    Forgotten,
}

/// Key used to serialize operations.
///
/// A recorded state's key is the resource's identity. A spec's key names
/// the slot a creation happens in: the same as the identity when the
/// identity is chosen locally, a parent-scoped key when the remote assigns
/// it (keys listed under a domain, instances named by the API).
pub trait ResourceKey {
    fn resource_key(&self) -> String;
}

/// One kind of managed resource.
///
/// `read`, `update` and `delete` take the last recorded state rather than
/// just the identity: shared records need the previously declared values to
/// tell their own values from everyone else's.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Declared configuration.
    type Spec: ResourceKey + Send + Sync;

    /// Recorded state.
    type State: ResourceKey + Clone + Send + Sync;

    /// Kind name, for logs.
    const KIND: &'static str;

    /// Budget for one operation, unless overridden by configuration.
    fn default_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &Self::Spec) -> Result<Self::State>;

    /// Read the remote object. `NotFound` means it no longer exists.
    async fn read(&self, state: &Self::State) -> Result<Self::State>;

    async fn update(
        &self,
        ctx: &mut OpContext<'_>,
        prior: &Self::State,
        spec: &Self::Spec,
    ) -> Result<Self::State>;

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &Self::State) -> Result<DeleteOutcome>;
}

/// Context of one running operation.
///
/// Resources call [`accepted`](Self::accepted) once the remote has taken a
/// write, and [`converge`](Self::converge) to wait for it to show.
#[derive(Debug)]
pub struct OpContext<'a> {
    resource: &'a str,
    phase: &'a mut Phase,
    interval: Duration,
    deadline: Instant,
    write_accepted: bool,
}

impl<'a> OpContext<'a> {
    fn new(resource: &'a str, phase: &'a mut Phase, interval: Duration, deadline: Instant) -> Self {
        Self {
            resource,
            phase,
            interval,
            deadline,
            write_accepted: false,
        }
    }

    /// Key of the resource being operated on.
    pub fn resource(&self) -> &str {
        self.resource
    }

    pub fn phase(&self) -> Phase {
        *self.phase
    }

    /// Time left before the operation's deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Note that the remote accepted a write.
    pub fn accepted(&mut self) {
        self.write_accepted = true;
        if matches!(*self.phase, Phase::Creating | Phase::Updating) {
            self.transition(Phase::Converging);
        }
    }

    /// Returns true once a write has been accepted.
    pub fn write_accepted(&self) -> bool {
        self.write_accepted
    }

    /// Poll `check` until it converges, using whatever budget is left.
    pub async fn converge<T, F, Fut>(&mut self, check: F) -> Result<T>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ConvergenceResult<T, ClientError>> + Send,
    {
        self.accepted();
        let poller = Poller::new(self.interval, self.remaining());
        Ok(poller.poll_until(self.resource, check).await?)
    }

    fn transition(&mut self, to: Phase) {
        debug!(resource = %self.resource, from = %self.phase, to = %to, "Phase transition");
        *self.phase = to;
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn running_phase(&self) -> Phase {
        match self {
            Self::Create => Phase::Creating,
            Self::Update => Phase::Updating,
            Self::Delete => Phase::Deleting,
        }
    }

    fn allowed_from(&self, phase: Phase) -> bool {
        match self {
            Self::Create => matches!(phase, Phase::Absent | Phase::Unconfirmed),
            Self::Update | Self::Delete => matches!(phase, Phase::Present | Phase::Unconfirmed),
        }
    }
}

/// Sequences operations for every resource kind.
#[derive(Debug)]
pub struct Lifecycle {
    poll_interval: Duration,
    timeout: Option<Duration>,
    locks: ResourceLocks,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Lifecycle {
    /// Create a lifecycle using per-kind default timeouts.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            locks: ResourceLocks::new(),
        }
    }

    /// Create a lifecycle from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.timeout,
            ..Self::new(config.poll_interval)
        }
    }

    /// Use `timeout` for every operation of every kind.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    /// Current phase of a resource, if it has been seen.
    pub async fn phase(&self, key: &str) -> Option<Phase> {
        self.locks.phase(key).await
    }

    fn timeout_for<R: Resource>(&self, resource: &R) -> Duration {
        self.timeout.unwrap_or_else(|| resource.default_timeout())
    }

    /// Create a resource and wait until it is visible.
    pub async fn create<R: Resource>(&self, resource: &R, spec: &R::Spec) -> Result<R::State> {
        let key = spec.resource_key();
        let timeout = self.timeout_for(resource);
        let mut phase = self.locks.acquire(&key, Phase::Absent).await;
        let from = begin(&key, &mut phase, Operation::Create)?;

        info!(resource = %key, kind = R::KIND, "Creating resource");
        let deadline = Instant::now() + timeout;
        let mut ctx = OpContext::new(&key, &mut phase, self.poll_interval, deadline);
        let result = bounded(&key, timeout, deadline, resource.create(&mut ctx, spec)).await;
        let accepted = ctx.write_accepted();

        let Ok(state) = &result else {
            settle(&key, &mut phase, Operation::Create, from, accepted, &result, Phase::Present);
            return result;
        };

        let id = state.resource_key();
        if id == key {
            settle(&key, &mut phase, Operation::Create, from, accepted, &result, Phase::Present);
        } else {
            // The slot is free for the next creation; the new identity is present.
            settle(&key, &mut phase, Operation::Create, from, accepted, &result, Phase::Absent);
            drop(phase);
            *self.locks.acquire(&id, Phase::Present).await = Phase::Present;
            debug!(resource = %id, slot = %key, "Registered created resource");
        }
        result
    }

    /// Read a resource back. Returns `None` if it no longer exists.
    pub async fn read<R: Resource>(&self, resource: &R, state: &R::State) -> Result<Option<R::State>> {
        let key = state.resource_key();
        let timeout = self.timeout_for(resource);
        let mut phase = self.locks.acquire(&key, Phase::Present).await;

        let deadline = Instant::now() + timeout;
        match bounded(&key, timeout, deadline, resource.read(state)).await {
            Ok(state) => {
                if *phase != Phase::Present {
                    debug!(resource = %key, from = %*phase, "Read confirms resource");
                    *phase = Phase::Present;
                }
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                info!(resource = %key, kind = R::KIND, "Resource no longer exists");
                *phase = Phase::Absent;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a new spec to an existing resource.
    ///
    /// Resources reject changes to attributes they cannot update in place
    /// with [`ProviderError::RequiresReplacement`].
    pub async fn update<R: Resource>(
        &self,
        resource: &R,
        prior: &R::State,
        spec: &R::Spec,
    ) -> Result<R::State> {
        let key = prior.resource_key();
        let timeout = self.timeout_for(resource);
        let mut phase = self.locks.acquire(&key, Phase::Present).await;
        let from = begin(&key, &mut phase, Operation::Update)?;

        info!(resource = %key, kind = R::KIND, "Updating resource");
        let deadline = Instant::now() + timeout;
        let mut ctx = OpContext::new(&key, &mut phase, self.poll_interval, deadline);
        let result = bounded(&key, timeout, deadline, resource.update(&mut ctx, prior, spec)).await;
        let accepted = ctx.write_accepted();

        settle(&key, &mut phase, Operation::Update, from, accepted, &result, Phase::Present);
        result
    }

    /// Delete a resource.
    pub async fn delete<R: Resource>(&self, resource: &R, state: &R::State) -> Result<DeleteOutcome> {
        let key = state.resource_key();
        let timeout = self.timeout_for(resource);
        let mut phase = self.locks.acquire(&key, Phase::Present).await;
        let from = begin(&key, &mut phase, Operation::Delete)?;

        info!(resource = %key, kind = R::KIND, "Deleting resource");
        let deadline = Instant::now() + timeout;
        let mut ctx = OpContext::new(&key, &mut phase, self.poll_interval, deadline);
        let result = bounded(&key, timeout, deadline, resource.delete(&mut ctx, state)).await;
        let accepted = ctx.write_accepted();

        if let Ok(outcome) = &result {
            match outcome {
                DeleteOutcome::Forgotten => {
                    info!(resource = %key, kind = R::KIND, "Resource forgotten, remote left untouched")
                }
                outcome => info!(resource = %key, kind = R::KIND, outcome = ?outcome, "Resource deleted"),
            }
        }
        settle(&key, &mut phase, Operation::Delete, from, accepted, &result, Phase::Absent);
        result
    }
}

/// Check that `operation` may start and enter its running phase.
fn begin(key: &str, phase: &mut OwnedMutexGuard<Phase>, operation: Operation) -> Result<Phase> {
    let mut from = **phase;
    if from.is_in_flight() {
        // The previous operation was dropped mid-way.
        warn!(resource = %key, phase = %from, "Previous operation was abandoned");
        from = Phase::Unconfirmed;
    }
    if !operation.allowed_from(from) {
        return Err(ProviderError::InvalidTransition {
            resource: key.to_string(),
            phase: from,
            operation: operation.as_str(),
        });
    }
    **phase = operation.running_phase();
    debug!(resource = %key, from = %from, to = %**phase, "Phase transition");
    Ok(from)
}

/// Record the phase an operation ends in.
fn settle<T>(
    key: &str,
    phase: &mut OwnedMutexGuard<Phase>,
    operation: Operation,
    from: Phase,
    accepted: bool,
    result: &Result<T>,
    success: Phase,
) {
    let to = match result {
        Ok(_) => success,
        Err(_) if accepted => Phase::Unconfirmed,
        Err(_) => from,
    };
    if let Err(e) = result {
        warn!(
            resource = %key,
            operation = operation.as_str(),
            error = %e,
            retryable = e.is_retryable(),
            "Operation failed"
        );
    }
    debug!(resource = %key, from = %**phase, to = %to, "Phase transition");
    **phase = to;
}

/// Run `operation`, failing with a timeout if it is still running at `deadline`.
async fn bounded<T>(
    key: &str,
    timeout: Duration,
    deadline: Instant,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout_at(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::ConvergenceTimeout {
            resource: key.to_string(),
            elapsed: timeout,
            reason: "operation did not finish before its deadline".to_string(),
        }),
    }
}
