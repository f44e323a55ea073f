//! DNSSEC keys published at the registry.
//!
//! The API does not return the id of a created key, so creation waits for a
//! key with the same public key to appear in the domain's list.

use std::sync::Arc;

use async_trait::async_trait;
use gandi_id::DnssecKeyRef;
use gandi_reconcile::ConvergenceResult;

use super::{check_failed, ignore_not_found};
use crate::client::{DnssecKey, DnssecKeyRequest, DomainApi};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnssecKeySpec {
    pub domain: String,
    pub algorithm: i32,
    pub key_type: String,
    pub public_key: String,
}

impl ResourceKey for DnssecKeySpec {
    fn resource_key(&self) -> String {
        format!("{}/dnskeys", self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnssecKeyState {
    pub id: DnssecKeyRef,
    pub algorithm: i32,
    pub key_type: String,
    pub public_key: String,
}

impl DnssecKeyState {
    fn observed(domain: &str, key: DnssecKey) -> Self {
        Self {
            id: DnssecKeyRef::new(domain, key.id.to_string()),
            algorithm: key.algorithm,
            key_type: key.key_type,
            public_key: key.public_key,
        }
    }

    /// State for a key adopted by id (`{domain}/{id}`, or a bare id under `domain`).
    pub fn imported(id: &str, domain: Option<&str>) -> Result<Self> {
        Ok(Self {
            id: DnssecKeyRef::parse_scoped(id, domain)?,
            algorithm: 0,
            key_type: String::new(),
            public_key: String::new(),
        })
    }
}

impl ResourceKey for DnssecKeyState {
    fn resource_key(&self) -> String {
        self.id.to_string()
    }
}

pub struct DnssecKeys {
    client: Arc<dyn DomainApi>,
}

impl DnssecKeys {
    pub fn new(client: Arc<dyn DomainApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for DnssecKeys {
    type Spec = DnssecKeySpec;
    type State = DnssecKeyState;
    const KIND: &'static str = "dnssec_key";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &DnssecKeySpec) -> Result<DnssecKeyState> {
        let request = DnssecKeyRequest {
            algorithm: spec.algorithm,
            key_type: spec.key_type.clone(),
            public_key: spec.public_key.clone(),
        };
        self.client.create_dnssec_key(&spec.domain, &request).await?;

        let client = &self.client;
        let key = ctx
            .converge(|| async move {
                match client.list_dnssec_keys(&spec.domain).await {
                    Ok(keys) => match keys.into_iter().find(|k| k.public_key == spec.public_key) {
                        Some(key) => ConvergenceResult::Converged(key),
                        None => ConvergenceResult::pending("key not listed yet"),
                    },
                    Err(e) => check_failed(e, "DNSSEC keys"),
                }
            })
            .await?;

        Ok(DnssecKeyState::observed(&spec.domain, key))
    }

    async fn read(&self, state: &DnssecKeyState) -> Result<DnssecKeyState> {
        let domain = &state.id.parent;
        let key = self
            .client
            .list_dnssec_keys(domain)
            .await?
            .into_iter()
            .find(|k| k.id.to_string() == state.id.id)
            .ok_or_else(|| ProviderError::NotFound(format!("DNSSEC key {}", state.id)))?;
        Ok(DnssecKeyState::observed(domain, key))
    }

    async fn update(&self, _ctx: &mut OpContext<'_>, prior: &DnssecKeyState, spec: &DnssecKeySpec) -> Result<DnssecKeyState> {
        let unchanged = spec.domain == prior.id.parent
            && spec.algorithm == prior.algorithm
            && spec.key_type == prior.key_type
            && spec.public_key == prior.public_key;
        if !unchanged {
            return Err(ProviderError::requires_replacement(prior.id.to_string(), "key material"));
        }
        self.read(prior).await
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &DnssecKeyState) -> Result<DeleteOutcome> {
        ignore_not_found(
            self.client
                .delete_dnssec_key(&state.id.parent, &state.id.id)
                .await,
        )?;
        ctx.accepted();
        Ok(DeleteOutcome::Removed)
    }
}
