//! Domain nameservers.
//!
//! Deleting the resource points the domain back at LiveDNS, which is how a
//! domain starts out.

use std::sync::Arc;

use async_trait::async_trait;
use gandi_reconcile::ConvergenceResult;

use super::visible;
use crate::client::DomainApi;
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameserversSpec {
    pub domain: String,
    pub nameservers: Vec<String>,
}

impl ResourceKey for NameserversSpec {
    fn resource_key(&self) -> String {
        format!("{}/nameservers", self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameserversState {
    pub domain: String,
    pub nameservers: Vec<String>,
}

impl ResourceKey for NameserversState {
    fn resource_key(&self) -> String {
        format!("{}/nameservers", self.domain)
    }
}

pub struct Nameservers {
    client: Arc<dyn DomainApi>,
}

impl Nameservers {
    pub fn new(client: Arc<dyn DomainApi>) -> Self {
        Self { client }
    }

    /// Write the nameservers and wait until reads return them, in order.
    async fn apply(&self, ctx: &mut OpContext<'_>, spec: &NameserversSpec) -> Result<NameserversState> {
        self.client
            .update_nameservers(&spec.domain, &spec.nameservers)
            .await?;

        let client = &self.client;
        let nameservers = ctx
            .converge(|| async move {
                let current = match visible(client.get_nameservers(&spec.domain).await, "domain") {
                    Ok(current) => current,
                    Err(outcome) => return outcome,
                };
                if current == spec.nameservers {
                    ConvergenceResult::Converged(current)
                } else {
                    ConvergenceResult::pending("nameservers not applied yet")
                }
            })
            .await?;

        Ok(NameserversState {
            domain: spec.domain.clone(),
            nameservers,
        })
    }
}

#[async_trait]
impl Resource for Nameservers {
    type Spec = NameserversSpec;
    type State = NameserversState;
    const KIND: &'static str = "nameservers";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &NameserversSpec) -> Result<NameserversState> {
        self.apply(ctx, spec).await
    }

    async fn read(&self, state: &NameserversState) -> Result<NameserversState> {
        let nameservers = self.client.get_nameservers(&state.domain).await?;
        Ok(NameserversState {
            domain: state.domain.clone(),
            nameservers,
        })
    }

    async fn update(
        &self,
        ctx: &mut OpContext<'_>,
        prior: &NameserversState,
        spec: &NameserversSpec,
    ) -> Result<NameserversState> {
        if spec.domain != prior.domain {
            return Err(ProviderError::requires_replacement(prior.resource_key(), "domain"));
        }
        self.apply(ctx, spec).await
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &NameserversState) -> Result<DeleteOutcome> {
        self.client.enable_livedns(&state.domain).await?;
        ctx.accepted();
        Ok(DeleteOutcome::Reverted)
    }
}
