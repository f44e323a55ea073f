//! LiveDNS records.
//!
//! A record is the whole rrset for one `(zone, name, type)`. When declared
//! `mutable`, a TXT rrset is shared: other actors may add values to it, and
//! the provider only ever adds, updates and removes the values it declared.

use std::sync::Arc;

use async_trait::async_trait;
use gandi_id::RecordId;
use gandi_reconcile::{
    canonical_eq, intersect_declared_with_remote, reconcile, remove_owned, sets_equal_unordered,
    ConvergenceResult,
};
use tracing::{debug, info};

use super::{ignore_not_found, visible};
use crate::client::{DomainRecord, LiveDnsApi, NewRecord};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

/// Declared record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub zone: String,
    pub name: String,
    pub rtype: String,
    pub ttl: u32,
    pub values: Vec<String>,

    /// Share the rrset with other actors (TXT only).
    pub mutable: bool,
}

impl RecordSpec {
    pub fn id(&self) -> RecordId {
        RecordId::new(&self.zone, &self.name, &self.rtype)
    }

    fn is_shared(&self) -> bool {
        self.mutable && self.id().is_txt()
    }
}

impl ResourceKey for RecordSpec {
    fn resource_key(&self) -> String {
        self.id().to_string()
    }
}

/// Recorded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordState {
    pub id: RecordId,
    pub ttl: u32,
    pub href: String,

    /// For a shared rrset, only the declared values still present remotely.
    pub values: Vec<String>,
    pub mutable: bool,
}

impl RecordState {
    /// State for a record adopted by id, before its first read.
    pub fn imported(id: RecordId, mutable: bool) -> Self {
        Self {
            id,
            ttl: 0,
            href: String::new(),
            values: Vec::new(),
            mutable,
        }
    }

    fn is_shared(&self) -> bool {
        self.mutable && self.id.is_txt()
    }

    /// Build state from a remote rrset. `declared` filters shared values.
    fn observed(id: RecordId, mutable: bool, declared: &[String], record: DomainRecord) -> Self {
        let mut state = Self {
            id,
            ttl: record.rrset_ttl,
            href: record.rrset_href,
            values: record.rrset_values,
            mutable,
        };
        if state.is_shared() {
            state.values = intersect_declared_with_remote(declared, &state.values);
        }
        state
    }
}

impl ResourceKey for RecordState {
    fn resource_key(&self) -> String {
        self.id.to_string()
    }
}

/// LiveDNS record kind.
pub struct LiveDnsRecords {
    client: Arc<dyn LiveDnsApi>,
}

impl LiveDnsRecords {
    pub fn new(client: Arc<dyn LiveDnsApi>) -> Self {
        Self { client }
    }

    /// Wait until the rrset holds every declared value.
    async fn converge_contains(&self, ctx: &mut OpContext<'_>, id: &RecordId, declared: &[String]) -> Result<DomainRecord> {
        let client = &self.client;
        ctx.converge(|| async move {
            let record = match visible(client.get_record(&id.zone, &id.name, &id.rtype).await, "record") {
                Ok(record) => record,
                Err(outcome) => return outcome,
            };
            let missing = declared
                .iter()
                .filter(|d| !record.rrset_values.iter().any(|v| canonical_eq(v, d)))
                .count();
            if missing == 0 {
                ConvergenceResult::Converged(record)
            } else {
                ConvergenceResult::pending(format!("{missing} declared values not listed yet"))
            }
        })
        .await
    }

    /// Wait until the rrset holds exactly `expected`.
    async fn converge_equals(
        &self,
        ctx: &mut OpContext<'_>,
        id: &RecordId,
        ttl: u32,
        expected: &[String],
    ) -> Result<DomainRecord> {
        let client = &self.client;
        ctx.converge(|| async move {
            let record = match visible(client.get_record(&id.zone, &id.name, &id.rtype).await, "record") {
                Ok(record) => record,
                Err(outcome) => return outcome,
            };
            if !sets_equal_unordered(&record.rrset_values, expected) {
                ConvergenceResult::pending("values not updated yet")
            } else if record.rrset_ttl != ttl {
                ConvergenceResult::pending("ttl not updated yet")
            } else {
                ConvergenceResult::Converged(record)
            }
        })
        .await
    }
}

#[async_trait]
impl Resource for LiveDnsRecords {
    type Spec = RecordSpec;
    type State = RecordState;
    const KIND: &'static str = "livedns_record";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &RecordSpec) -> Result<RecordState> {
        let id = spec.id();

        let existing = if spec.is_shared() {
            match self.client.get_record(&id.zone, &id.name, &id.rtype).await {
                Ok(record) => Some(record),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        match existing {
            Some(existing) => {
                // First apply: nothing was ours before, every remote value stays.
                let next = reconcile::<String, _, _>(&[], &existing.rrset_values, &spec.values);
                info!(
                    record = %id,
                    external = existing.rrset_values.len(),
                    declared = spec.values.len(),
                    "Merging into existing shared rrset"
                );
                self.client
                    .update_record(&id.zone, &id.name, &id.rtype, spec.ttl, &next)
                    .await?;
            }
            None => {
                let record = NewRecord {
                    rrset_name: spec.name.clone(),
                    rrset_type: spec.rtype.clone(),
                    rrset_ttl: spec.ttl,
                    rrset_values: spec.values.clone(),
                };
                self.client.create_record(&id.zone, &record).await?;
            }
        }
        ctx.accepted();

        let record = self.converge_contains(ctx, &id, &spec.values).await?;
        Ok(RecordState::observed(id, spec.mutable, &spec.values, record))
    }

    async fn read(&self, state: &RecordState) -> Result<RecordState> {
        let id = &state.id;
        let record = self.client.get_record(&id.zone, &id.name, &id.rtype).await?;
        Ok(RecordState::observed(id.clone(), state.mutable, &state.values, record))
    }

    async fn update(&self, ctx: &mut OpContext<'_>, prior: &RecordState, spec: &RecordSpec) -> Result<RecordState> {
        let id = spec.id();
        if id != prior.id {
            return Err(ProviderError::requires_replacement(prior.id.to_string(), "zone, name or type"));
        }

        let next = if spec.is_shared() {
            let remote = self.client.get_record(&id.zone, &id.name, &id.rtype).await?;
            let next = reconcile(&prior.values, &remote.rrset_values, &spec.values);
            debug!(record = %id, remote = ?remote.rrset_values, next = ?next, "Reconciled shared rrset");
            next
        } else {
            spec.values.clone()
        };

        self.client
            .update_record(&id.zone, &id.name, &id.rtype, spec.ttl, &next)
            .await?;
        ctx.accepted();

        let record = self.converge_equals(ctx, &id, spec.ttl, &next).await?;
        Ok(RecordState::observed(id, spec.mutable, &spec.values, record))
    }

    async fn delete(&self, ctx: &mut OpContext<'_>, state: &RecordState) -> Result<DeleteOutcome> {
        let id = &state.id;

        if state.is_shared() {
            let remote = match self.client.get_record(&id.zone, &id.name, &id.rtype).await {
                Ok(record) => record,
                Err(e) if e.is_not_found() => return Ok(DeleteOutcome::Removed),
                Err(e) => return Err(e.into()),
            };

            // Deleted whole once nothing external is left, even if some owned
            // values were already removed by someone else.
            let remaining = remove_owned(&remote.rrset_values, &state.values);
            if !remaining.is_empty() {
                info!(record = %id, kept = remaining.len(), "Releasing owned values from shared rrset");
                self.client
                    .update_record(&id.zone, &id.name, &id.rtype, remote.rrset_ttl, &remaining)
                    .await?;
                ctx.accepted();
                return Ok(DeleteOutcome::PartiallyReleased);
            }
        }

        ignore_not_found(self.client.delete_record(&id.zone, &id.name, &id.rtype).await)?;
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

    const ZONE: &str = "example.com";

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(Duration::from_secs(2)).with_timeout(Duration::from_secs(60))
    }

    fn txt(values: &[&str]) -> RecordSpec {
        RecordSpec {
            zone: ZONE.to_string(),
            name: "@".to_string(),
            rtype: "TXT".to_string(),
            ttl: 300,
            values: values.iter().map(|v| v.to_string()).collect(),
            mutable: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_filters_shared_values() {
        let mock = Arc::new(MockGandi::new());
        mock.external_set_record_values(ZONE, "@", "TXT", &["\"a\"", "\"manual\""]);
        let records = LiveDnsRecords::new(mock.clone());

        let mut state = RecordState::imported(RecordId::new(ZONE, "@", "TXT"), true);
        state.values = vec!["a".to_string(), "gone".to_string()];

        let read = lifecycle().read(&records, &state).await.unwrap().unwrap();
        assert_eq!(read.values, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_drops_values_removed_from_declaration() {
        let mock = Arc::new(MockGandi::new());
        let records = LiveDnsRecords::new(mock.clone());
        let lc = lifecycle();

        let state = lc.create(&records, &txt(&["a", "b"])).await.unwrap();
        mock.external_set_record_values(ZONE, "@", "TXT", &["\"a\"", "\"b\"", "\"manual\""]);

        let state = lc.update(&records, &state, &txt(&["a"])).await.unwrap();
        assert_eq!(state.values, vec!["a"]);
        assert_eq!(
            mock.record_values(ZONE, "@", "TXT").unwrap(),
            vec!["\"a\"", "\"manual\""]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_shared_keeps_external_values() {
        let mock = Arc::new(MockGandi::new());
        let records = LiveDnsRecords::new(mock.clone());
        let lc = lifecycle();

        let state = lc.create(&records, &txt(&["a"])).await.unwrap();
        mock.external_set_record_values(ZONE, "@", "TXT", &["\"a\"", "\"manual\""]);

        let outcome = lc.delete(&records, &state).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::PartiallyReleased);
        assert_eq!(mock.record_values(ZONE, "@", "TXT").unwrap(), vec!["\"manual\""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_shared_removes_rrset_when_all_values_owned() {
        let mock = Arc::new(MockGandi::new());
        let records = LiveDnsRecords::new(mock.clone());
        let lc = lifecycle();

        let state = lc.create(&records, &txt(&["a", "b"])).await.unwrap();
        let outcome = lc.delete(&records, &state).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed);
        assert_eq!(mock.record_values(ZONE, "@", "TXT"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_shared_after_owned_value_vanished() {
        let mock = Arc::new(MockGandi::new());
        let records = LiveDnsRecords::new(mock.clone());
        let lc = lifecycle();

        let state = lc.create(&records, &txt(&["a", "b"])).await.unwrap();
        mock.external_set_record_values(ZONE, "@", "TXT", &["\"a\""]);

        let outcome = lc.delete(&records, &state).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed);
        assert_eq!(mock.record_values(ZONE, "@", "TXT"), None);
        assert_eq!(mock.calls("update_record"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_txt_mutable_is_plain() {
        let mock = Arc::new(MockGandi::new());
        let records = LiveDnsRecords::new(mock.clone());
        mock.external_set_record_values(ZONE, "www", "A", &["10.0.0.1"]);

        let spec = RecordSpec {
            zone: ZONE.to_string(),
            name: "www".to_string(),
            rtype: "A".to_string(),
            ttl: 300,
            values: vec!["10.0.0.2".to_string()],
            mutable: true,
        };
        let err = lifecycle().create(&records, &spec).await.unwrap_err();
        assert!(matches!(err, ProviderError::Remote(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_change_requires_replacement() {
        let mock = Arc::new(MockGandi::new());
        let records = LiveDnsRecords::new(mock.clone());
        let lc = lifecycle();

        let state = lc.create(&records, &txt(&["a"])).await.unwrap();
        let mut spec = txt(&["a"]);
        spec.name = "other".to_string();
        let err = lc.update(&records, &state, &spec).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequiresReplacement { .. }));
    }
}
