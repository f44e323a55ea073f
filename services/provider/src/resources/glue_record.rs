//! Glue records (registry host objects).

use std::sync::Arc;

use async_trait::async_trait;
use gandi_id::GlueRecordRef;
use gandi_reconcile::ConvergenceResult;

use super::{ignore_not_found, visible};
use crate::client::{DomainApi, GlueRecord, GlueRecordRequest};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueRecordSpec {
    /// Domain the host lives under.
    pub zone: String,
    pub name: String,
    pub ips: Vec<String>,
}

impl GlueRecordSpec {
    pub fn id(&self) -> GlueRecordRef {
        GlueRecordRef::new(&self.zone, &self.name)
    }

    /// IPs in the order the registry stores them.
    fn sorted_ips(&self) -> Vec<String> {
        sorted(&self.ips)
    }
}

impl ResourceKey for GlueRecordSpec {
    fn resource_key(&self) -> String {
        self.id().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueRecordState {
    pub id: GlueRecordRef,
    pub ips: Vec<String>,
    pub href: String,
    pub fqdn: String,
    pub fqdn_unicode: String,
}

impl GlueRecordState {
    fn observed(id: GlueRecordRef, glue: GlueRecord) -> Self {
        Self {
            id,
            ips: glue.ips,
            href: glue.href,
            fqdn: glue.fqdn,
            fqdn_unicode: glue.fqdn_unicode,
        }
    }
}

impl ResourceKey for GlueRecordState {
    fn resource_key(&self) -> String {
        self.id.to_string()
    }
}

fn sorted(ips: &[String]) -> Vec<String> {
    let mut ips = ips.to_vec();
    ips.sort();
    ips
}

pub struct GlueRecords {
    client: Arc<dyn DomainApi>,
}

impl GlueRecords {
    pub fn new(client: Arc<dyn DomainApi>) -> Self {
        Self { client }
    }

    /// Wait until the host is listed with `ips`.
    async fn converge(&self, ctx: &mut OpContext<'_>, id: &GlueRecordRef, ips: &[String]) -> Result<GlueRecord> {
        let client = &self.client;
        ctx.converge(|| async move {
            let glue = match visible(client.get_glue_record(&id.parent, &id.id).await, "glue record") {
                Ok(glue) => glue,
                Err(outcome) => return outcome,
            };
            if glue.name.is_empty() {
                ConvergenceResult::pending("glue record not visible yet")
            } else if sorted(&glue.ips) != ips {
                ConvergenceResult::pending("ips not updated yet")
            } else {
                ConvergenceResult::Converged(glue)
            }
        })
        .await
    }
}

#[async_trait]
impl Resource for GlueRecords {
    type Spec = GlueRecordSpec;
    type State = GlueRecordState;
    const KIND: &'static str = "glue_record";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &GlueRecordSpec) -> Result<GlueRecordState> {
        let id = spec.id();
        let ips = spec.sorted_ips();
        let request = GlueRecordRequest {
            name: spec.name.clone(),
            ips: ips.clone(),
        };
        self.client.create_glue_record(&spec.zone, &request).await?;

        let glue = self.converge(ctx, &id, &ips).await?;
        Ok(GlueRecordState::observed(id, glue))
    }

    async fn read(&self, state: &GlueRecordState) -> Result<GlueRecordState> {
        let glue = self
            .client
            .get_glue_record(&state.id.parent, &state.id.id)
            .await?;
        if glue.name.is_empty() {
            return Err(ProviderError::NotFound(format!("glue record {}", state.id)));
        }
        Ok(GlueRecordState::observed(state.id.clone(), glue))
    }

    async fn update(&self, ctx: &mut OpContext<'_>, prior: &GlueRecordState, spec: &GlueRecordSpec) -> Result<GlueRecordState> {
        let id = spec.id();
        if id != prior.id {
            return Err(ProviderError::requires_replacement(prior.id.to_string(), "zone or name"));
        }

        let ips = spec.sorted_ips();
        if sorted(&prior.ips) != ips {
            self.client.update_glue_record(&id.parent, &id.id, &ips).await?;
        }

        let glue = self.converge(ctx, &id, &ips).await?;
        Ok(GlueRecordState::observed(id, glue))
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &GlueRecordState) -> Result<DeleteOutcome> {
        ignore_not_found(
            self.client
                .delete_glue_record(&state.id.parent, &state.id.id)
                .await,
        )?;
        ctx.accepted();
        Ok(DeleteOutcome::Removed)
    }
}
