//! SimpleHosting instances.
//!
//! Instances take minutes to provision, and to tear down. Creation waits for
//! the `running` status; deletion waits until the instance is gone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gandi_reconcile::ConvergenceResult;

use super::{gone, visible, RUNNING};
use crate::client::{CreateInstanceRequest, Instance, InstanceType, Named, SimpleHostingApi};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

/// Default timeout for SimpleHosting operations.
pub const HOSTING_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub name: String,
    pub size: String,
    pub location: String,
    pub database: String,
    pub language: String,
}

impl ResourceKey for InstanceSpec {
    fn resource_key(&self) -> String {
        format!("simplehosting/instances/name={}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    pub id: String,
    pub name: String,
    pub size: String,
    pub location: String,
    pub database: String,
    pub language: String,
    pub status: String,
}

impl InstanceState {
    fn observed(instance: Instance) -> Self {
        Self {
            id: instance.id,
            name: instance.name,
            size: instance.size,
            location: instance.datacenter.region,
            database: instance.database.name,
            language: instance.language.name,
            status: instance.status,
        }
    }

    /// First declared attribute that differs from `spec`.
    fn changed_attribute(&self, spec: &InstanceSpec) -> Option<&'static str> {
        [
            ("name", self.name == spec.name),
            ("size", self.size == spec.size),
            ("location", self.location == spec.location),
            ("database", self.database == spec.database),
            ("language", self.language == spec.language),
        ]
        .into_iter()
        .find(|(_, same)| !same)
        .map(|(attribute, _)| attribute)
    }
}

impl ResourceKey for InstanceState {
    fn resource_key(&self) -> String {
        format!("simplehosting/instances/{}", self.id)
    }
}

pub struct SimpleHostingInstances {
    client: Arc<dyn SimpleHostingApi>,
}

impl SimpleHostingInstances {
    pub fn new(client: Arc<dyn SimpleHostingApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for SimpleHostingInstances {
    type Spec = InstanceSpec;
    type State = InstanceState;
    const KIND: &'static str = "simplehosting_instance";

    fn default_timeout(&self) -> Duration {
        HOSTING_TIMEOUT
    }

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &InstanceSpec) -> Result<InstanceState> {
        let request = CreateInstanceRequest {
            name: spec.name.clone(),
            location: spec.location.clone(),
            size: spec.size.clone(),
            instance_type: InstanceType {
                database: Named {
                    name: spec.database.clone(),
                },
                language: Named {
                    name: spec.language.clone(),
                },
            },
        };
        let id = self.client.create_instance(&request).await?;
        ctx.accepted();
        tracing::info!(instance_id = %id, name = %spec.name, "Instance accepted");

        let client = &self.client;
        let id = id.as_str();
        let instance = ctx
            .converge(|| async move {
                let instance = match visible(client.get_instance(id).await, "instance") {
                    Ok(instance) => instance,
                    Err(outcome) => return outcome,
                };
                if instance.status == RUNNING {
                    ConvergenceResult::Converged(instance)
                } else {
                    ConvergenceResult::pending(format!("instance is {}", instance.status))
                }
            })
            .await?;

        Ok(InstanceState::observed(instance))
    }

    async fn read(&self, state: &InstanceState) -> Result<InstanceState> {
        let instance = self.client.get_instance(&state.id).await?;
        Ok(InstanceState::observed(instance))
    }

    async fn update(&self, _ctx: &mut OpContext<'_>, prior: &InstanceState, spec: &InstanceSpec) -> Result<InstanceState> {
        if let Some(attribute) = prior.changed_attribute(spec) {
            return Err(ProviderError::requires_replacement(prior.resource_key(), attribute));
        }
        self.read(prior).await
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &InstanceState) -> Result<DeleteOutcome> {
        match self.client.delete_instance(&state.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(DeleteOutcome::Removed),
            Err(e) => return Err(e.into()),
        }
        ctx.accepted();

        let client = &self.client;
        let id = state.id.as_str();
        ctx.converge(|| async move { gone(client.get_instance(id).await, "instance") })
            .await?;
        Ok(DeleteOutcome::Removed)
    }
}
