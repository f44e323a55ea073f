//! Gandi provider reconciliation core.
//!
//! Drives Gandi resources (LiveDNS records and keys, domains, glue records,
//! SimpleHosting instances and vhosts) toward a declared state over an API
//! whose writes become visible some time after they are accepted.
//!
//! ## Architecture
//!
//! ```text
//! Provider
//! ├── Lifecycle               (per-resource locks, phases, deadlines)
//! │   └── Resource kinds      (create / read / update / delete)
//! │       └── Poller          (waits for accepted writes to show)
//! └── Client traits           (GandiClient over HTTP, MockGandi in memory)
//! ```
//!
//! ## Modules
//!
//! - `client`: remote API traits and their implementations
//! - `lifecycle`: operation sequencing and phase tracking
//! - `resources`: the managed resource kinds
//! - `provider`: wiring from configuration

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod provider;
pub mod resources;
pub mod telemetry;

pub use config::{Config, Credentials, LogFormat};
pub use error::{ProviderError, Result};
pub use lifecycle::{DeleteOutcome, Lifecycle, OpContext, Phase, Resource, ResourceKey};
pub use provider::Provider;
