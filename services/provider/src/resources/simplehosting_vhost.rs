//! SimpleHosting virtual hosts.
//!
//! A vhost owns a free certificate issued for its fqdn. The API cannot set
//! an application at creation time, so it is patched in once the vhost runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gandi_id::VhostRef;
use gandi_reconcile::ConvergenceResult;
use tracing::{info, warn};

use super::simplehosting_instance::HOSTING_TIMEOUT;
use super::{gone, ignore_not_found, visible, RUNNING};
use crate::client::{
    CertificateApi, CreateCertificateRequest, CreateVhostRequest, LinkedDnsZone, Named,
    PatchVhostRequest, SimpleHostingApi, Vhost, FREE_CERTIFICATE_PACKAGE,
};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VhostSpec {
    pub instance_id: String,
    pub fqdn: String,
    /// Let the vhost alter its linked DNS zone.
    pub linked_dns_zone_alteration: bool,
    pub application: Option<String>,
}

impl VhostSpec {
    pub fn new(instance_id: impl Into<String>, fqdn: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            fqdn: fqdn.into(),
            linked_dns_zone_alteration: true,
            application: None,
        }
    }

    pub fn id(&self) -> VhostRef {
        VhostRef::new(&self.instance_id, &self.fqdn)
    }
}

impl ResourceKey for VhostSpec {
    fn resource_key(&self) -> String {
        self.id().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VhostState {
    pub id: VhostRef,
    pub linked_dns_zone_alteration: bool,
    pub application: Option<String>,
    pub status: String,
    /// Free certificate issued at creation.
    pub certificate_id: Option<String>,
}

impl VhostState {
    fn observed(id: VhostRef, vhost: Vhost, certificate_id: Option<String>) -> Self {
        Self {
            id,
            linked_dns_zone_alteration: vhost.linked_dns_zone.allow_alteration,
            application: vhost.application.map(|a| a.name),
            status: vhost.status,
            certificate_id,
        }
    }

    /// State for a vhost adopted by id (`{instance_id}/{fqdn}`).
    pub fn imported(id: &str) -> Result<Self> {
        Ok(Self {
            id: VhostRef::parse(id)?,
            linked_dns_zone_alteration: true,
            application: None,
            status: String::new(),
            certificate_id: None,
        })
    }

    fn changed_attribute(&self, spec: &VhostSpec) -> Option<&'static str> {
        if spec.instance_id != self.id.parent {
            Some("instance_id")
        } else if spec.fqdn != self.id.id {
            Some("fqdn")
        } else if spec.linked_dns_zone_alteration != self.linked_dns_zone_alteration {
            Some("linked_dns_zone_alteration")
        } else if spec.application != self.application {
            Some("application")
        } else {
            None
        }
    }
}

impl ResourceKey for VhostState {
    fn resource_key(&self) -> String {
        self.id.to_string()
    }
}

pub struct SimpleHostingVhosts {
    hosting: Arc<dyn SimpleHostingApi>,
    certificates: Arc<dyn CertificateApi>,
}

impl SimpleHostingVhosts {
    pub fn new(hosting: Arc<dyn SimpleHostingApi>, certificates: Arc<dyn CertificateApi>) -> Self {
        Self {
            hosting,
            certificates,
        }
    }

    /// Wait until the vhost runs and, when given, serves `application`.
    async fn converge(&self, ctx: &mut OpContext<'_>, id: &VhostRef, application: Option<&str>) -> Result<Vhost> {
        let hosting = &self.hosting;
        ctx.converge(|| async move {
            let vhost = match visible(hosting.get_vhost(&id.parent, &id.id).await, "vhost") {
                Ok(vhost) => vhost,
                Err(outcome) => return outcome,
            };
            let serving = vhost.application.as_ref().map(|a| a.name.as_str());
            if vhost.status != RUNNING {
                ConvergenceResult::pending(format!("vhost is {}", vhost.status))
            } else if application.is_some() && serving != application {
                ConvergenceResult::pending(format!("vhost serves {}", serving.unwrap_or("no application")))
            } else {
                ConvergenceResult::Converged(vhost)
            }
        })
        .await
    }

    async fn delete_certificate(&self, id: &VhostRef, certificate_id: &str) {
        match ignore_not_found(self.certificates.delete_certificate(certificate_id).await) {
            Ok(()) => info!(vhost = %id, certificate_id, "Certificate deleted"),
            Err(e) => warn!(vhost = %id, certificate_id, error = %e, "Failed to delete certificate"),
        }
    }
}

#[async_trait]
impl Resource for SimpleHostingVhosts {
    type Spec = VhostSpec;
    type State = VhostState;
    const KIND: &'static str = "simplehosting_vhost";

    fn default_timeout(&self) -> Duration {
        HOSTING_TIMEOUT
    }

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &VhostSpec) -> Result<VhostState> {
        let id = spec.id();
        let request = CreateVhostRequest {
            fqdn: spec.fqdn.clone(),
            linked_dns_zone: spec.linked_dns_zone_alteration.then(|| LinkedDnsZone {
                allow_alteration: true,
                allow_alteration_override: true,
            }),
        };
        self.hosting.create_vhost(&spec.instance_id, &request).await?;
        let mut vhost = self.converge(ctx, &id, None).await?;

        let certificate_id = self
            .certificates
            .create_certificate(&CreateCertificateRequest {
                cn: spec.fqdn.clone(),
                package: FREE_CERTIFICATE_PACKAGE.to_string(),
            })
            .await?;
        info!(vhost = %id, certificate_id = %certificate_id, "Free certificate issued");

        if let Some(application) = &spec.application {
            let patch = PatchVhostRequest {
                application: Some(Named {
                    name: application.clone(),
                }),
            };
            self.hosting
                .update_vhost(&spec.instance_id, &spec.fqdn, &patch)
                .await?;
            vhost = self.converge(ctx, &id, Some(application.as_str())).await?;
        }

        Ok(VhostState::observed(id, vhost, Some(certificate_id)))
    }

    async fn read(&self, state: &VhostState) -> Result<VhostState> {
        let vhost = self.hosting.get_vhost(&state.id.parent, &state.id.id).await?;
        Ok(VhostState::observed(
            state.id.clone(),
            vhost,
            state.certificate_id.clone(),
        ))
    }

    async fn update(&self, _ctx: &mut OpContext<'_>, prior: &VhostState, spec: &VhostSpec) -> Result<VhostState> {
        if let Some(attribute) = prior.changed_attribute(spec) {
            return Err(ProviderError::requires_replacement(prior.id.to_string(), attribute));
        }
        self.read(prior).await
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &VhostState) -> Result<DeleteOutcome> {
        let id = &state.id;
        ignore_not_found(self.hosting.delete_vhost(&id.parent, &id.id).await)?;
        ctx.accepted();

        if let Some(certificate_id) = &state.certificate_id {
            self.delete_certificate(id, certificate_id).await;
        }

        let hosting = &self.hosting;
        ctx.converge(|| async move { gone(hosting.get_vhost(&id.parent, &id.id).await, "vhost") })
            .await?;
        Ok(DeleteOutcome::Removed)
    }
}
