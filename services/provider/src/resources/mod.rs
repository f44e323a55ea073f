//! Managed resource kinds.
//!
//! Each kind implements [`Resource`](crate::lifecycle::Resource) over one of
//! the client traits and is driven through
//! [`Lifecycle`](crate::lifecycle::Lifecycle).

use gandi_reconcile::ConvergenceResult;
use tracing::debug;

use crate::client::ClientError;

pub mod dnssec_key;
pub mod domain;
pub mod domain_attachment;
pub mod glue_record;
pub mod livedns_key;
pub mod livedns_record;
pub mod nameservers;
pub mod simplehosting_instance;
pub mod simplehosting_vhost;

pub use dnssec_key::{DnssecKeySpec, DnssecKeyState, DnssecKeys};
pub use domain::{DomainSpec, DomainState, Domains};
pub use domain_attachment::{AttachmentSpec, AttachmentState, DomainAttachments};
pub use glue_record::{GlueRecordSpec, GlueRecordState, GlueRecords};
pub use livedns_key::{LiveDnsKeySpec, LiveDnsKeyState, LiveDnsKeys};
pub use livedns_record::{LiveDnsRecords, RecordSpec, RecordState};
pub use nameservers::{Nameservers, NameserversSpec, NameserversState};
pub use simplehosting_instance::{InstanceSpec, InstanceState, SimpleHostingInstances};
pub use simplehosting_vhost::{SimpleHostingVhosts, VhostSpec, VhostState};

/// Status of a SimpleHosting object ready for use.
pub const RUNNING: &str = "running";

/// Outcome of a read that failed inside a convergence check.
///
/// Transient failures keep the poller waiting; everything else ends the wait.
pub(crate) fn check_failed<U>(e: ClientError, what: &str) -> ConvergenceResult<U, ClientError> {
    if e.is_transient() {
        debug!(what, error = %e, "Transient read failure, still waiting");
        ConvergenceResult::pending(format!("reading {what} failed: {e}"))
    } else {
        ConvergenceResult::TerminalFailure(e)
    }
}

/// Unwrap a read made inside a convergence check.
///
/// A missing object is not visible yet.
pub(crate) fn visible<T, U>(
    result: Result<T, ClientError>,
    what: &str,
) -> Result<T, ConvergenceResult<U, ClientError>> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => Err(ConvergenceResult::pending(format!("{what} not visible yet"))),
        Err(e) => Err(check_failed(e, what)),
    }
}

/// Check outcome for waiting until an object is gone.
pub(crate) fn gone<T>(result: Result<T, ClientError>, what: &str) -> ConvergenceResult<(), ClientError> {
    match result {
        Err(e) if e.is_not_found() => ConvergenceResult::Converged(()),
        Err(e) => check_failed(e, what),
        Ok(_) => ConvergenceResult::pending(format!("{what} still exists")),
    }
}

/// Treat a missing object as already deleted.
pub(crate) fn ignore_not_found(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
