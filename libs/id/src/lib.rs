//! # gandi-id
//!
//! Typed identities for the Gandi resources managed by this workspace.
//!
//! ## Design Principles
//!
//! - Identities are assigned or derived by the remote; names are labels
//! - Every identity has one canonical string form with strict parsing
//! - Identities round-trip (parse → format → parse)
//! - Identities are typed so a key id can't be passed where a vhost is expected
//!
//! ## Formats
//!
//! - Records: `{zone}/{name}/{type}`, e.g. `example.com/www/A`
//! - Scoped sub-objects: `{parent}/{id}`, e.g. `example.com/42` for a DNSSEC
//!   key, `7a1c.../www.example.com` for a vhost
//!
//! Scoped identities also accept a bare `{id}` when the parent is already
//! known from configuration, which is how previously stored state looks.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;
