//! Remote API clients.
//!
//! The reconciliation core only talks to the remote through the traits in
//! this module, one per Gandi API family. [`GandiClient`] implements all of
//! them over HTTP; [`MockGandi`] implements them in memory for tests.
//!
//! Writes may return before the object is visible to reads. Callers that
//! need the result of a write must confirm it through the poller.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod types;

pub use http::GandiClient;
pub use mock::MockGandi;
pub use types::*;

/// Errors returned by a remote client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The object does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Create an API error from response details.
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true for 404-class errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for failures a later attempt may not hit: rate limiting,
    /// server errors and network errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound(_) | Self::Decode(_) => false,
        }
    }

    /// HTTP status, when the remote answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }
}

/// LiveDNS API: records, signing keys, zone attachment.
#[async_trait]
pub trait LiveDnsApi: Send + Sync {
    async fn get_record(&self, zone: &str, name: &str, rtype: &str) -> Result<DomainRecord, ClientError>;

    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<(), ClientError>;

    async fn update_record(
        &self,
        zone: &str,
        name: &str,
        rtype: &str,
        ttl: u32,
        values: &[String],
    ) -> Result<(), ClientError>;

    async fn delete_record(&self, zone: &str, name: &str, rtype: &str) -> Result<(), ClientError>;

    /// Keys in creation order.
    async fn list_keys(&self, fqdn: &str) -> Result<Vec<SigningKey>, ClientError>;

    async fn get_key(&self, fqdn: &str, uuid: &str) -> Result<SigningKey, ClientError>;

    /// Ask LiveDNS to generate a new signing key. The API does not return
    /// the key's uuid.
    async fn sign_domain(&self, fqdn: &str) -> Result<(), ClientError>;

    async fn delete_key(&self, fqdn: &str, uuid: &str) -> Result<(), ClientError>;

    async fn get_livedns_domain(&self, fqdn: &str) -> Result<LiveDnsDomain, ClientError>;

    async fn attach_domain_to_zone(&self, zone: &str, fqdn: &str) -> Result<(), ClientError>;
}

/// Domain API: registration, nameservers, DNSSEC keys, glue records.
#[async_trait]
pub trait DomainApi: Send + Sync {
    async fn create_domain(&self, request: &CreateDomainRequest) -> Result<(), ClientError>;

    async fn get_domain(&self, fqdn: &str) -> Result<DomainDetails, ClientError>;

    async fn set_autorenew(&self, fqdn: &str, enabled: bool) -> Result<(), ClientError>;

    async fn set_contacts(&self, fqdn: &str, contacts: &Contacts) -> Result<(), ClientError>;

    async fn get_nameservers(&self, fqdn: &str) -> Result<Vec<String>, ClientError>;

    async fn update_nameservers(&self, fqdn: &str, nameservers: &[String]) -> Result<(), ClientError>;

    /// Point the domain back at LiveDNS nameservers.
    async fn enable_livedns(&self, fqdn: &str) -> Result<(), ClientError>;

    async fn list_dnssec_keys(&self, fqdn: &str) -> Result<Vec<DnssecKey>, ClientError>;

    async fn create_dnssec_key(&self, fqdn: &str, request: &DnssecKeyRequest) -> Result<(), ClientError>;

    async fn delete_dnssec_key(&self, fqdn: &str, id: &str) -> Result<(), ClientError>;

    async fn get_glue_record(&self, fqdn: &str, name: &str) -> Result<GlueRecord, ClientError>;

    async fn create_glue_record(&self, fqdn: &str, request: &GlueRecordRequest) -> Result<(), ClientError>;

    async fn update_glue_record(&self, fqdn: &str, name: &str, ips: &[String]) -> Result<(), ClientError>;

    async fn delete_glue_record(&self, fqdn: &str, name: &str) -> Result<(), ClientError>;
}

/// SimpleHosting API: instances and vhosts.
#[async_trait]
pub trait SimpleHostingApi: Send + Sync {
    /// Returns the new instance id.
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String, ClientError>;

    async fn get_instance(&self, id: &str) -> Result<Instance, ClientError>;

    async fn delete_instance(&self, id: &str) -> Result<(), ClientError>;

    async fn create_vhost(&self, instance_id: &str, request: &CreateVhostRequest) -> Result<(), ClientError>;

    async fn get_vhost(&self, instance_id: &str, fqdn: &str) -> Result<Vhost, ClientError>;

    async fn update_vhost(
        &self,
        instance_id: &str,
        fqdn: &str,
        request: &PatchVhostRequest,
    ) -> Result<(), ClientError>;

    async fn delete_vhost(&self, instance_id: &str, fqdn: &str) -> Result<(), ClientError>;
}

/// Certificate API.
#[async_trait]
pub trait CertificateApi: Send + Sync {
    /// Returns the new certificate id.
    async fn create_certificate(&self, request: &CreateCertificateRequest) -> Result<String, ClientError>;

    async fn delete_certificate(&self, id: &str) -> Result<(), ClientError>;
}
