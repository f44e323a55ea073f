//! Reconciliation core primitives.
//!
//! This library provides the pieces shared by every managed resource whose
//! remote API is slow-consistent. Key concepts:
//!
//! - **Canonical form**: values compared independently of the transport's
//!   quoting convention ([`codec`]).
//! - **Shared value sets**: records whose values are partly ours and partly
//!   someone else's ([`merge`]).
//! - **Convergence**: waiting, within a bounded time, for an accepted write
//!   to become visible ([`poll`]).
//!
//! # Invariants
//!
//! - Codec and merge functions are pure and deterministic
//! - Externally owned values are never removed by a merge
//! - Values removed from the declaration are never re-added by a merge
//! - A poll never outlives its timeout

pub mod codec;
mod error;
pub mod merge;
pub mod poll;

pub use codec::{canonical_eq, is_wrapped, unwrap, wrap};
pub use error::ConvergenceError;
pub use merge::{
    dedupe, externally_owned, intersect_declared_with_remote, reconcile, remove_owned,
    sets_equal_unordered,
};
pub use poll::{
    ConvergenceResult, Poller, DEFAULT_CONVERGENCE_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
