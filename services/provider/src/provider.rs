//! Entry point tying configuration, clients and resource kinds together.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::client::{CertificateApi, DomainApi, GandiClient, LiveDnsApi, SimpleHostingApi};
use crate::config::Config;
use crate::lifecycle::Lifecycle;
use crate::resources::{
    DnssecKeys, DomainAttachments, Domains, GlueRecords, LiveDnsKeys, LiveDnsRecords, Nameservers,
    SimpleHostingInstances, SimpleHostingVhosts,
};

/// Every resource kind, sharing one lifecycle.
pub struct Provider {
    pub lifecycle: Lifecycle,
    pub records: LiveDnsRecords,
    pub livedns_keys: LiveDnsKeys,
    pub attachments: DomainAttachments,
    pub domains: Domains,
    pub nameservers: Nameservers,
    pub dnssec_keys: DnssecKeys,
    pub glue_records: GlueRecords,
    pub instances: SimpleHostingInstances,
    pub vhosts: SimpleHostingVhosts,
}

impl Provider {
    /// Build a provider talking to the Gandi API.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = GandiClient::new(config).context("failed to build API client")?;
        info!(
            api_url = %config.api_url,
            dry_run = config.dry_run,
            sharing_id = ?config.sharing_id,
            "Provider configured"
        );
        Ok(Self::with_client(Arc::new(client), Lifecycle::from_config(config)))
    }

    /// Build a provider over any client implementing every API family.
    pub fn with_client<C>(client: Arc<C>, lifecycle: Lifecycle) -> Self
    where
        C: LiveDnsApi + DomainApi + SimpleHostingApi + CertificateApi + 'static,
    {
        Self {
            lifecycle,
            records: LiveDnsRecords::new(client.clone()),
            livedns_keys: LiveDnsKeys::new(client.clone()),
            attachments: DomainAttachments::new(client.clone()),
            domains: Domains::new(client.clone()),
            nameservers: Nameservers::new(client.clone()),
            dnssec_keys: DnssecKeys::new(client.clone()),
            glue_records: GlueRecords::new(client.clone()),
            instances: SimpleHostingInstances::new(client.clone()),
            vhosts: SimpleHostingVhosts::new(client.clone(), client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGandi;
    use crate::config::Credentials;
    use crate::resources::AttachmentSpec;

    #[test]
    fn test_from_config() {
        let mut config = Config::new(Credentials::PersonalAccessToken("token".to_string()));
        config.timeout = Some(std::time::Duration::from_secs(5));
        assert!(Provider::from_config(&config).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_share_one_remote() {
        let mock = Arc::new(MockGandi::new());
        let provider = Provider::with_client(mock.clone(), Lifecycle::default());

        let spec = AttachmentSpec {
            domain: "example.com".to_string(),
            zone: "zone-1".to_string(),
        };
        provider
            .lifecycle
            .create(&provider.attachments, &spec)
            .await
            .unwrap();
        assert_eq!(mock.attached_zone("example.com").as_deref(), Some("zone-1"));
    }
}
