//! Attachment of a domain to a LiveDNS zone.
//!
//! A domain served by LiveDNS is always attached to some zone, so deleting
//! the attachment leaves the remote as it is.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::LiveDnsApi;
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub domain: String,
    /// Zone uuid.
    pub zone: String,
}

impl ResourceKey for AttachmentSpec {
    fn resource_key(&self) -> String {
        format!("{}/zone", self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentState {
    pub domain: String,
    pub zone: String,
}

impl ResourceKey for AttachmentState {
    fn resource_key(&self) -> String {
        format!("{}/zone", self.domain)
    }
}

pub struct DomainAttachments {
    client: Arc<dyn LiveDnsApi>,
}

impl DomainAttachments {
    pub fn new(client: Arc<dyn LiveDnsApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for DomainAttachments {
    type Spec = AttachmentSpec;
    type State = AttachmentState;
    const KIND: &'static str = "domain_attachment";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &AttachmentSpec) -> Result<AttachmentState> {
        self.client
            .attach_domain_to_zone(&spec.zone, &spec.domain)
            .await?;
        ctx.accepted();
        Ok(AttachmentState {
            domain: spec.domain.clone(),
            zone: spec.zone.clone(),
        })
    }

    async fn read(&self, state: &AttachmentState) -> Result<AttachmentState> {
        let domain = self.client.get_livedns_domain(&state.domain).await?;
        let zone = domain
            .zone_uuid
            .ok_or_else(|| ProviderError::NotFound(format!("{} is not attached to a zone", state.domain)))?;
        Ok(AttachmentState {
            domain: domain.fqdn,
            zone,
        })
    }

    async fn update(
        &self,
        _ctx: &mut OpContext<'_>,
        prior: &AttachmentState,
        spec: &AttachmentSpec,
    ) -> Result<AttachmentState> {
        if spec.domain != prior.domain {
            return Err(ProviderError::requires_replacement(prior.resource_key(), "domain"));
        }
        if spec.zone != prior.zone {
            return Err(ProviderError::requires_replacement(prior.resource_key(), "zone"));
        }
        self.read(prior).await
    }

    async fn delete(&self, _ctx: &mut OpContext<'_>, _state: &AttachmentState) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Forgotten)
    }
}
