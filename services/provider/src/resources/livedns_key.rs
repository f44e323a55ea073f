//! LiveDNS DNSSEC signing keys.
//!
//! Signing a domain does not return the new key's uuid. Creation snapshots
//! the last listed key first and waits for a different one to take its
//! place at the end of the list. Creations on one domain share a lock so
//! the snapshot cannot be confused by a concurrent sign.

use std::sync::Arc;

use async_trait::async_trait;
use gandi_id::LiveDnsKeyRef;
use gandi_reconcile::ConvergenceResult;
use tracing::debug;

use super::{check_failed, ignore_not_found};
use crate::client::{LiveDnsApi, SigningKey};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDnsKeySpec {
    pub domain: String,
}

impl ResourceKey for LiveDnsKeySpec {
    fn resource_key(&self) -> String {
        format!("{}/keys", self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDnsKeyState {
    pub id: LiveDnsKeyRef,
    pub flags: i32,
    pub algorithm: i32,
    pub algorithm_name: String,
    pub deleted: bool,
    pub ds: String,
    pub status: String,
    pub public_key: String,
    pub tag: i32,
}

impl LiveDnsKeyState {
    fn observed(domain: &str, key: SigningKey) -> Self {
        Self {
            id: LiveDnsKeyRef::new(domain, key.uuid),
            flags: key.flags,
            algorithm: key.algorithm,
            algorithm_name: key.algorithm_name,
            deleted: key.deleted,
            ds: key.ds,
            status: key.status,
            public_key: key.public_key,
            tag: key.tag,
        }
    }

    /// State for a key adopted by id (`{domain}/{uuid}`, or a bare uuid under `domain`).
    pub fn imported(id: &str, domain: Option<&str>) -> Result<Self> {
        let id = LiveDnsKeyRef::parse_scoped(id, domain)?;
        Ok(Self::observed(&id.parent, SigningKey {
            uuid: id.id.clone(),
            ..Default::default()
        }))
    }
}

impl ResourceKey for LiveDnsKeyState {
    fn resource_key(&self) -> String {
        self.id.to_string()
    }
}

pub struct LiveDnsKeys {
    client: Arc<dyn LiveDnsApi>,
}

impl LiveDnsKeys {
    pub fn new(client: Arc<dyn LiveDnsApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for LiveDnsKeys {
    type Spec = LiveDnsKeySpec;
    type State = LiveDnsKeyState;
    const KIND: &'static str = "livedns_key";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &LiveDnsKeySpec) -> Result<LiveDnsKeyState> {
        let domain = spec.domain.as_str();
        let last = self
            .client
            .list_keys(domain)
            .await?
            .pop()
            .map(|k| k.uuid);
        debug!(domain, last = ?last, "Snapshot of signing keys");

        self.client.sign_domain(domain).await?;

        let client = &self.client;
        let last = last.as_deref();
        let uuid = ctx
            .converge(|| async move {
                match client.list_keys(domain).await {
                    Ok(keys) => match keys.last() {
                        Some(key) if Some(key.uuid.as_str()) != last => {
                            ConvergenceResult::Converged(key.uuid.clone())
                        }
                        _ => ConvergenceResult::pending("new key not listed yet"),
                    },
                    Err(e) => check_failed(e, "signing keys"),
                }
            })
            .await?;

        let key = self.client.get_key(domain, &uuid).await?;
        Ok(LiveDnsKeyState::observed(domain, key))
    }

    async fn read(&self, state: &LiveDnsKeyState) -> Result<LiveDnsKeyState> {
        let key = self.client.get_key(&state.id.parent, &state.id.id).await?;
        if key.deleted {
            return Err(ProviderError::NotFound(format!("signing key {} is deleted", state.id)));
        }
        Ok(LiveDnsKeyState::observed(&state.id.parent, key))
    }

    async fn update(&self, _ctx: &mut OpContext<'_>, prior: &LiveDnsKeyState, spec: &LiveDnsKeySpec) -> Result<LiveDnsKeyState> {
        if spec.domain != prior.id.parent {
            return Err(ProviderError::requires_replacement(prior.id.to_string(), "domain"));
        }
        self.read(prior).await
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &LiveDnsKeyState) -> Result<DeleteOutcome> {
        ignore_not_found(self.client.delete_key(&state.id.parent, &state.id.id).await)?;
        ctx.accepted();
        Ok(DeleteOutcome::Removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::MockGandi;
    use crate::lifecycle::Lifecycle;

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_new_last_key() {
        let mock = Arc::new(MockGandi::with_visibility_lag(1));
        let existing = mock.external_add_signing_key("example.com");
        let keys = LiveDnsKeys::new(mock.clone());
        let lc = Lifecycle::new(Duration::from_secs(2));

        let spec = LiveDnsKeySpec {
            domain: "example.com".to_string(),
        };
        let state = lc.create(&keys, &spec).await.unwrap();
        assert_ne!(state.id.id, existing);
        assert_eq!(state.id.parent, "example.com");
        assert_eq!(state.flags, 257);
        assert_eq!(mock.signing_key_count("example.com"), 2);

        // Two keys on the same domain.
        let second = lc.create(&keys, &spec).await.unwrap();
        assert_ne!(second.id, state.id);

        assert_eq!(lc.delete(&keys, &state).await.unwrap(), DeleteOutcome::Removed);
        assert_eq!(mock.signing_key_count("example.com"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_bare_uuid() {
        let state = LiveDnsKeyState::imported("0b7c", Some("example.com")).unwrap();
        assert_eq!(state.id.to_string(), "example.com/0b7c");
        assert!(LiveDnsKeyState::imported("example.com/", None).is_err());
    }
}
