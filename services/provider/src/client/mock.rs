//! In-memory Gandi remote for tests and local development.
//!
//! Writes are accepted immediately but only become visible to reads after a
//! configurable number of subsequent reads (the visibility lag), which is
//! how the real API behaves for most objects. Tests can also inject read
//! and write failures and mutate state behind the provider's back.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::types::*;
use super::{CertificateApi, ClientError, DomainApi, LiveDnsApi, SimpleHostingApi};

/// Nameservers a domain points at when served by LiveDNS.
pub const LIVEDNS_NAMESERVERS: [&str; 3] = ["ns1.gandi.net", "ns2.gandi.net", "ns3.gandi.net"];

/// TTL given to records created by external helpers.
const DEFAULT_TTL: u32 = 10800;

type RecordKey = (String, String, String);

/// Remote objects, as one view sees them.
#[derive(Debug, Clone, Default)]
struct Store {
    records: BTreeMap<RecordKey, DomainRecord>,
    signing_keys: HashMap<String, Vec<SigningKey>>,
    livedns_domains: HashMap<String, LiveDnsDomain>,
    domains: HashMap<String, DomainDetails>,
    dnssec_keys: HashMap<String, Vec<DnssecKey>>,
    glue_records: HashMap<(String, String), GlueRecord>,
    instances: HashMap<String, Instance>,
    vhosts: HashMap<(String, String), Vhost>,
}

/// One accepted write.
#[derive(Debug, Clone)]
enum Mutation {
    PutRecord(String, DomainRecord),
    DeleteRecord(RecordKey),
    AddSigningKey(String, SigningKey),
    DeleteSigningKey(String, String),
    AttachZone(String, String),
    PutDomain(DomainDetails),
    AddDnssecKey(String, DnssecKey),
    DeleteDnssecKey(String, u64),
    PutGlueRecord(String, GlueRecord),
    DeleteGlueRecord(String, String),
    PutInstance(Instance),
    DeleteInstance(String),
    PutVhost(String, Vhost),
    DeleteVhost(String, String),
}

impl Store {
    fn apply(&mut self, mutation: &Mutation) {
        match mutation.clone() {
            Mutation::PutRecord(zone, record) => {
                let key = (zone, record.rrset_name.clone(), record.rrset_type.clone());
                self.records.insert(key, record);
            }
            Mutation::DeleteRecord(key) => {
                self.records.remove(&key);
            }
            Mutation::AddSigningKey(fqdn, key) => {
                self.signing_keys.entry(fqdn).or_default().push(key);
            }
            Mutation::DeleteSigningKey(fqdn, uuid) => {
                if let Some(keys) = self.signing_keys.get_mut(&fqdn) {
                    keys.retain(|k| k.uuid != uuid);
                }
            }
            Mutation::AttachZone(zone, fqdn) => {
                self.livedns_domains.insert(
                    fqdn.clone(),
                    LiveDnsDomain {
                        fqdn,
                        zone_uuid: Some(zone),
                    },
                );
            }
            Mutation::PutDomain(domain) => {
                self.livedns_domains
                    .entry(domain.fqdn.clone())
                    .or_insert_with(|| LiveDnsDomain {
                        fqdn: domain.fqdn.clone(),
                        zone_uuid: None,
                    });
                self.domains.insert(domain.fqdn.clone(), domain);
            }
            Mutation::AddDnssecKey(fqdn, key) => {
                self.dnssec_keys.entry(fqdn).or_default().push(key);
            }
            Mutation::DeleteDnssecKey(fqdn, id) => {
                if let Some(keys) = self.dnssec_keys.get_mut(&fqdn) {
                    keys.retain(|k| k.id != id);
                }
            }
            Mutation::PutGlueRecord(fqdn, glue) => {
                self.glue_records.insert((fqdn, glue.name.clone()), glue);
            }
            Mutation::DeleteGlueRecord(fqdn, name) => {
                self.glue_records.remove(&(fqdn, name));
            }
            Mutation::PutInstance(instance) => {
                self.instances.insert(instance.id.clone(), instance);
            }
            Mutation::DeleteInstance(id) => {
                self.instances.remove(&id);
                self.vhosts.retain(|(instance_id, _), _| *instance_id != id);
            }
            Mutation::PutVhost(instance_id, vhost) => {
                self.vhosts.insert((instance_id, vhost.fqdn.clone()), vhost);
            }
            Mutation::DeleteVhost(instance_id, fqdn) => {
                self.vhosts.remove(&(instance_id, fqdn));
            }
        }
    }
}

#[derive(Debug)]
struct Pending {
    reads_left: u32,
    mutation: Mutation,
}

#[derive(Debug, Default)]
struct MockState {
    /// Every accepted write applied. Writes validate against this view.
    committed: Store,

    /// What reads see.
    visible: Store,

    /// Accepted writes not yet visible, oldest first.
    pending: Vec<Pending>,

    visibility_lag: u32,
    read_failures: Vec<u16>,
    write_failures: Vec<u16>,
    calls: HashMap<&'static str, u32>,
    reads: u32,
    writes: u32,
    certificates: HashSet<String>,
    next_dnssec_id: u64,
}

impl MockState {
    /// Record an accepted write.
    fn commit(&mut self, mutation: Mutation) {
        self.committed.apply(&mutation);
        if self.visibility_lag == 0 {
            self.visible.apply(&mutation);
        } else {
            self.pending.push(Pending {
                reads_left: self.visibility_lag,
                mutation,
            });
        }
    }

    /// Apply an external actor's change to both views at once.
    fn external(&mut self, mutation: Mutation) {
        self.committed.apply(&mutation);
        self.visible.apply(&mutation);
    }

    /// Age pending writes by one read, publishing those that are due.
    fn age(&mut self) {
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut entry in std::mem::take(&mut self.pending) {
            if entry.reads_left == 0 {
                self.visible.apply(&entry.mutation);
            } else {
                entry.reads_left -= 1;
                still_pending.push(entry);
            }
        }
        self.pending = still_pending;
    }
}

/// In-memory implementation of every client trait.
#[derive(Debug, Default)]
pub struct MockGandi {
    state: Mutex<MockState>,
}

fn not_found(what: impl std::fmt::Display) -> ClientError {
    ClientError::NotFound(format!("{what} does not exist"))
}

fn conflict(what: impl std::fmt::Display) -> ClientError {
    ClientError::api(409, "409", format!("{what} already exists"))
}

fn injected(status: u16) -> ClientError {
    ClientError::api(status, status.to_string(), "injected failure")
}

impl MockGandi {
    /// Create a mock whose writes are visible immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose writes are missed by the next `reads` reads.
    pub fn with_visibility_lag(reads: u32) -> Self {
        let mock = Self::new();
        mock.set_visibility_lag(reads);
        mock
    }

    /// Change the lag for subsequent writes.
    pub fn set_visibility_lag(&self, reads: u32) {
        self.state().visibility_lag = reads;
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_read(&self, method: &'static str) -> Result<MutexGuard<'_, MockState>, ClientError> {
        let mut state = self.state();
        state.reads += 1;
        *state.calls.entry(method).or_default() += 1;
        if !state.read_failures.is_empty() {
            let status = state.read_failures.remove(0);
            debug!(method, status, "[MOCK] Injected read failure");
            return Err(injected(status));
        }
        state.age();
        Ok(state)
    }

    fn begin_write(&self, method: &'static str) -> Result<MutexGuard<'_, MockState>, ClientError> {
        let mut state = self.state();
        state.writes += 1;
        *state.calls.entry(method).or_default() += 1;
        if !state.write_failures.is_empty() {
            let status = state.write_failures.remove(0);
            debug!(method, status, "[MOCK] Injected write failure");
            return Err(injected(status));
        }
        debug!(method, "[MOCK] Write accepted");
        Ok(state)
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Fail the next `count` reads with `status`.
    pub fn inject_read_failures(&self, count: usize, status: u16) {
        self.state().read_failures.extend(std::iter::repeat(status).take(count));
    }

    /// Fail the next `count` writes with `status`.
    pub fn inject_write_failures(&self, count: usize, status: u16) {
        self.state().write_failures.extend(std::iter::repeat(status).take(count));
    }

    // =========================================================================
    // External actors
    // =========================================================================

    /// Register a domain, served by LiveDNS.
    pub fn seed_domain(&self, fqdn: &str) {
        self.state().external(Mutation::PutDomain(DomainDetails {
            fqdn: fqdn.to_string(),
            nameservers: LIVEDNS_NAMESERVERS.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }));
    }

    /// Overwrite (or create) a record's values, as another tool would.
    pub fn external_set_record_values(&self, zone: &str, name: &str, rtype: &str, values: &[&str]) {
        let mut state = self.state();
        let key = (zone.to_string(), name.to_string(), rtype.to_string());
        let ttl = state
            .committed
            .records
            .get(&key)
            .map(|r| r.rrset_ttl)
            .unwrap_or(DEFAULT_TTL);
        state.external(Mutation::PutRecord(
            zone.to_string(),
            DomainRecord {
                rrset_name: name.to_string(),
                rrset_type: rtype.to_string(),
                rrset_ttl: ttl,
                rrset_values: values.iter().map(|v| v.to_string()).collect(),
                rrset_href: String::new(),
            },
        ));
    }

    /// Delete a record behind the provider's back.
    pub fn external_delete_record(&self, zone: &str, name: &str, rtype: &str) {
        self.state().external(Mutation::DeleteRecord((
            zone.to_string(),
            name.to_string(),
            rtype.to_string(),
        )));
    }

    /// Add a signing key generated elsewhere.
    pub fn external_add_signing_key(&self, fqdn: &str) -> String {
        let key = new_signing_key();
        let uuid = key.uuid.clone();
        self.state().external(Mutation::AddSigningKey(fqdn.to_string(), key));
        uuid
    }

    /// Change an instance's status.
    pub fn set_instance_status(&self, id: &str, status: &str) {
        let mut state = self.state();
        if let Some(mut instance) = state.committed.instances.get(id).cloned() {
            instance.status = status.to_string();
            state.external(Mutation::PutInstance(instance));
        }
    }

    /// Change a vhost's status.
    pub fn set_vhost_status(&self, instance_id: &str, fqdn: &str, status: &str) {
        let mut state = self.state();
        let key = (instance_id.to_string(), fqdn.to_string());
        if let Some(mut vhost) = state.committed.vhosts.get(&key).cloned() {
            vhost.status = status.to_string();
            state.external(Mutation::PutVhost(instance_id.to_string(), vhost));
        }
    }

    // =========================================================================
    // Inspection (committed view, does not count as a read)
    // =========================================================================

    /// Record values as last written.
    pub fn record_values(&self, zone: &str, name: &str, rtype: &str) -> Option<Vec<String>> {
        let key = (zone.to_string(), name.to_string(), rtype.to_string());
        self.state()
            .committed
            .records
            .get(&key)
            .map(|r| r.rrset_values.clone())
    }

    /// A domain's nameservers as last written.
    pub fn nameservers(&self, fqdn: &str) -> Option<Vec<String>> {
        self.state()
            .committed
            .domains
            .get(fqdn)
            .map(|d| d.nameservers.clone())
    }

    /// Zone a domain is attached to.
    pub fn attached_zone(&self, fqdn: &str) -> Option<String> {
        self.state()
            .committed
            .livedns_domains
            .get(fqdn)
            .and_then(|d| d.zone_uuid.clone())
    }

    /// Number of signing keys on a domain.
    pub fn signing_key_count(&self, fqdn: &str) -> usize {
        self.state()
            .committed
            .signing_keys
            .get(fqdn)
            .map_or(0, Vec::len)
    }

    /// Whether an instance exists.
    pub fn has_instance(&self, id: &str) -> bool {
        self.state().committed.instances.contains_key(id)
    }

    /// Ids of issued certificates.
    pub fn certificates(&self) -> Vec<String> {
        self.state().certificates.iter().cloned().collect()
    }

    /// Calls made to one trait method.
    pub fn calls(&self, method: &str) -> u32 {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    /// Total reads.
    pub fn reads(&self) -> u32 {
        self.state().reads
    }

    /// Total writes.
    pub fn writes(&self) -> u32 {
        self.state().writes
    }
}

fn new_signing_key() -> SigningKey {
    SigningKey {
        uuid: Uuid::new_v4().to_string(),
        flags: 257,
        algorithm: 13,
        algorithm_name: "ECDSAP256SHA256".to_string(),
        status: "active".to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl LiveDnsApi for MockGandi {
    async fn get_record(&self, zone: &str, name: &str, rtype: &str) -> Result<DomainRecord, ClientError> {
        let state = self.begin_read("get_record")?;
        let key = (zone.to_string(), name.to_string(), rtype.to_string());
        state
            .visible
            .records
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(format!("record {zone}/{name}/{rtype}")))
    }

    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<(), ClientError> {
        let mut state = self.begin_write("create_record")?;
        let key = (
            zone.to_string(),
            record.rrset_name.clone(),
            record.rrset_type.clone(),
        );
        if state.committed.records.contains_key(&key) {
            return Err(conflict(format!("record {zone}/{}/{}", key.1, key.2)));
        }
        state.commit(Mutation::PutRecord(
            zone.to_string(),
            DomainRecord {
                rrset_name: record.rrset_name.clone(),
                rrset_type: record.rrset_type.clone(),
                rrset_ttl: record.rrset_ttl,
                rrset_values: record.rrset_values.clone(),
                rrset_href: format!(
                    "/v5/livedns/domains/{zone}/records/{}/{}",
                    record.rrset_name, record.rrset_type
                ),
            },
        ));
        Ok(())
    }

    async fn update_record(
        &self,
        zone: &str,
        name: &str,
        rtype: &str,
        ttl: u32,
        values: &[String],
    ) -> Result<(), ClientError> {
        let mut state = self.begin_write("update_record")?;
        state.commit(Mutation::PutRecord(
            zone.to_string(),
            DomainRecord {
                rrset_name: name.to_string(),
                rrset_type: rtype.to_string(),
                rrset_ttl: ttl,
                rrset_values: values.to_vec(),
                rrset_href: format!("/v5/livedns/domains/{zone}/records/{name}/{rtype}"),
            },
        ));
        Ok(())
    }

    async fn delete_record(&self, zone: &str, name: &str, rtype: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_record")?;
        let key = (zone.to_string(), name.to_string(), rtype.to_string());
        if !state.committed.records.contains_key(&key) {
            return Err(not_found(format!("record {zone}/{name}/{rtype}")));
        }
        state.commit(Mutation::DeleteRecord(key));
        Ok(())
    }

    async fn list_keys(&self, fqdn: &str) -> Result<Vec<SigningKey>, ClientError> {
        let state = self.begin_read("list_keys")?;
        Ok(state.visible.signing_keys.get(fqdn).cloned().unwrap_or_default())
    }

    async fn get_key(&self, fqdn: &str, uuid: &str) -> Result<SigningKey, ClientError> {
        let state = self.begin_read("get_key")?;
        state
            .visible
            .signing_keys
            .get(fqdn)
            .and_then(|keys| keys.iter().find(|k| k.uuid == uuid))
            .cloned()
            .ok_or_else(|| not_found(format!("key {fqdn}/{uuid}")))
    }

    async fn sign_domain(&self, fqdn: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("sign_domain")?;
        state.commit(Mutation::AddSigningKey(fqdn.to_string(), new_signing_key()));
        Ok(())
    }

    async fn delete_key(&self, fqdn: &str, uuid: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_key")?;
        let exists = state
            .committed
            .signing_keys
            .get(fqdn)
            .is_some_and(|keys| keys.iter().any(|k| k.uuid == uuid));
        if !exists {
            return Err(not_found(format!("key {fqdn}/{uuid}")));
        }
        state.commit(Mutation::DeleteSigningKey(fqdn.to_string(), uuid.to_string()));
        Ok(())
    }

    async fn get_livedns_domain(&self, fqdn: &str) -> Result<LiveDnsDomain, ClientError> {
        let state = self.begin_read("get_livedns_domain")?;
        state
            .visible
            .livedns_domains
            .get(fqdn)
            .cloned()
            .ok_or_else(|| not_found(format!("domain {fqdn}")))
    }

    async fn attach_domain_to_zone(&self, zone: &str, fqdn: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("attach_domain_to_zone")?;
        state.commit(Mutation::AttachZone(zone.to_string(), fqdn.to_string()));
        Ok(())
    }
}

impl MockState {
    fn domain(&self, fqdn: &str) -> Result<DomainDetails, ClientError> {
        self.committed
            .domains
            .get(fqdn)
            .cloned()
            .ok_or_else(|| not_found(format!("domain {fqdn}")))
    }
}

#[async_trait]
impl DomainApi for MockGandi {
    async fn create_domain(&self, request: &CreateDomainRequest) -> Result<(), ClientError> {
        let mut state = self.begin_write("create_domain")?;
        if state.committed.domains.contains_key(&request.fqdn) {
            return Err(conflict(format!("domain {}", request.fqdn)));
        }
        let nameservers = request
            .nameservers
            .clone()
            .unwrap_or_else(|| LIVEDNS_NAMESERVERS.iter().map(|s| s.to_string()).collect());
        state.commit(Mutation::PutDomain(DomainDetails {
            fqdn: request.fqdn.clone(),
            nameservers,
            autorenew: AutoRenew::default(),
            contacts: Some(Contacts {
                owner: request.owner.clone(),
                admin: request.admin.clone(),
                billing: request.billing.clone(),
                tech: request.tech.clone(),
            }),
        }));
        Ok(())
    }

    async fn get_domain(&self, fqdn: &str) -> Result<DomainDetails, ClientError> {
        let state = self.begin_read("get_domain")?;
        state
            .visible
            .domains
            .get(fqdn)
            .cloned()
            .ok_or_else(|| not_found(format!("domain {fqdn}")))
    }

    async fn set_autorenew(&self, fqdn: &str, enabled: bool) -> Result<(), ClientError> {
        let mut state = self.begin_write("set_autorenew")?;
        let mut domain = state.domain(fqdn)?;
        domain.autorenew.enabled = enabled;
        state.commit(Mutation::PutDomain(domain));
        Ok(())
    }

    async fn set_contacts(&self, fqdn: &str, contacts: &Contacts) -> Result<(), ClientError> {
        let mut state = self.begin_write("set_contacts")?;
        let mut domain = state.domain(fqdn)?;
        let mut merged = domain.contacts.unwrap_or_default();
        if contacts.owner.is_some() {
            merged.owner = contacts.owner.clone();
        }
        if contacts.admin.is_some() {
            merged.admin = contacts.admin.clone();
        }
        if contacts.billing.is_some() {
            merged.billing = contacts.billing.clone();
        }
        if contacts.tech.is_some() {
            merged.tech = contacts.tech.clone();
        }
        domain.contacts = Some(merged);
        state.commit(Mutation::PutDomain(domain));
        Ok(())
    }

    async fn get_nameservers(&self, fqdn: &str) -> Result<Vec<String>, ClientError> {
        let state = self.begin_read("get_nameservers")?;
        state
            .visible
            .domains
            .get(fqdn)
            .map(|d| d.nameservers.clone())
            .ok_or_else(|| not_found(format!("domain {fqdn}")))
    }

    async fn update_nameservers(&self, fqdn: &str, nameservers: &[String]) -> Result<(), ClientError> {
        let mut state = self.begin_write("update_nameservers")?;
        let mut domain = state.domain(fqdn)?;
        domain.nameservers = nameservers.to_vec();
        state.commit(Mutation::PutDomain(domain));
        Ok(())
    }

    async fn enable_livedns(&self, fqdn: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("enable_livedns")?;
        let mut domain = state.domain(fqdn)?;
        domain.nameservers = LIVEDNS_NAMESERVERS.iter().map(|s| s.to_string()).collect();
        state.commit(Mutation::PutDomain(domain));
        Ok(())
    }

    async fn list_dnssec_keys(&self, fqdn: &str) -> Result<Vec<DnssecKey>, ClientError> {
        let state = self.begin_read("list_dnssec_keys")?;
        if !state.visible.domains.contains_key(fqdn) {
            return Err(not_found(format!("domain {fqdn}")));
        }
        Ok(state.visible.dnssec_keys.get(fqdn).cloned().unwrap_or_default())
    }

    async fn create_dnssec_key(&self, fqdn: &str, request: &DnssecKeyRequest) -> Result<(), ClientError> {
        let mut state = self.begin_write("create_dnssec_key")?;
        state.domain(fqdn)?;
        state.next_dnssec_id += 1;
        let key = DnssecKey {
            id: state.next_dnssec_id,
            algorithm: request.algorithm,
            key_type: request.key_type.clone(),
            public_key: request.public_key.clone(),
        };
        state.commit(Mutation::AddDnssecKey(fqdn.to_string(), key));
        Ok(())
    }

    async fn delete_dnssec_key(&self, fqdn: &str, id: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_dnssec_key")?;
        let id: u64 = id
            .parse()
            .map_err(|_| ClientError::api(400, "400", format!("invalid key id '{id}'")))?;
        let exists = state
            .committed
            .dnssec_keys
            .get(fqdn)
            .is_some_and(|keys| keys.iter().any(|k| k.id == id));
        if !exists {
            return Err(not_found(format!("dnssec key {fqdn}/{id}")));
        }
        state.commit(Mutation::DeleteDnssecKey(fqdn.to_string(), id));
        Ok(())
    }

    async fn get_glue_record(&self, fqdn: &str, name: &str) -> Result<GlueRecord, ClientError> {
        let state = self.begin_read("get_glue_record")?;
        state
            .visible
            .glue_records
            .get(&(fqdn.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("glue record {fqdn}/{name}")))
    }

    async fn create_glue_record(&self, fqdn: &str, request: &GlueRecordRequest) -> Result<(), ClientError> {
        let mut state = self.begin_write("create_glue_record")?;
        state.domain(fqdn)?;
        let key = (fqdn.to_string(), request.name.clone());
        if state.committed.glue_records.contains_key(&key) {
            return Err(conflict(format!("glue record {fqdn}/{}", request.name)));
        }
        state.commit(Mutation::PutGlueRecord(
            fqdn.to_string(),
            GlueRecord {
                name: request.name.clone(),
                ips: request.ips.clone(),
                href: format!("/v5/domain/domains/{fqdn}/hosts/{}", request.name),
                fqdn: format!("{}.{fqdn}", request.name),
                fqdn_unicode: format!("{}.{fqdn}", request.name),
            },
        ));
        Ok(())
    }

    async fn update_glue_record(&self, fqdn: &str, name: &str, ips: &[String]) -> Result<(), ClientError> {
        let mut state = self.begin_write("update_glue_record")?;
        let key = (fqdn.to_string(), name.to_string());
        let mut glue = state
            .committed
            .glue_records
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(format!("glue record {fqdn}/{name}")))?;
        glue.ips = ips.to_vec();
        state.commit(Mutation::PutGlueRecord(fqdn.to_string(), glue));
        Ok(())
    }

    async fn delete_glue_record(&self, fqdn: &str, name: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_glue_record")?;
        if !state
            .committed
            .glue_records
            .contains_key(&(fqdn.to_string(), name.to_string()))
        {
            return Err(not_found(format!("glue record {fqdn}/{name}")));
        }
        state.commit(Mutation::DeleteGlueRecord(fqdn.to_string(), name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl SimpleHostingApi for MockGandi {
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String, ClientError> {
        let mut state = self.begin_write("create_instance")?;
        let id = Uuid::new_v4().to_string();
        state.commit(Mutation::PutInstance(Instance {
            id: id.clone(),
            name: request.name.clone(),
            size: request.size.clone(),
            status: "running".to_string(),
            datacenter: Datacenter {
                region: request.location.clone(),
            },
            database: request.instance_type.database.clone(),
            language: request.instance_type.language.clone(),
        }));
        Ok(id)
    }

    async fn get_instance(&self, id: &str) -> Result<Instance, ClientError> {
        let state = self.begin_read("get_instance")?;
        state
            .visible
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(format!("instance {id}")))
    }

    async fn delete_instance(&self, id: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_instance")?;
        if !state.committed.instances.contains_key(id) {
            return Err(not_found(format!("instance {id}")));
        }
        state.commit(Mutation::DeleteInstance(id.to_string()));
        Ok(())
    }

    async fn create_vhost(&self, instance_id: &str, request: &CreateVhostRequest) -> Result<(), ClientError> {
        let mut state = self.begin_write("create_vhost")?;
        if !state.committed.instances.contains_key(instance_id) {
            return Err(not_found(format!("instance {instance_id}")));
        }
        let key = (instance_id.to_string(), request.fqdn.clone());
        if state.committed.vhosts.contains_key(&key) {
            return Err(conflict(format!("vhost {}", request.fqdn)));
        }
        state.commit(Mutation::PutVhost(
            instance_id.to_string(),
            Vhost {
                fqdn: request.fqdn.clone(),
                status: "running".to_string(),
                linked_dns_zone: request.linked_dns_zone.clone().unwrap_or_default(),
                application: None,
            },
        ));
        Ok(())
    }

    async fn get_vhost(&self, instance_id: &str, fqdn: &str) -> Result<Vhost, ClientError> {
        let state = self.begin_read("get_vhost")?;
        state
            .visible
            .vhosts
            .get(&(instance_id.to_string(), fqdn.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("vhost {instance_id}/{fqdn}")))
    }

    async fn update_vhost(
        &self,
        instance_id: &str,
        fqdn: &str,
        request: &PatchVhostRequest,
    ) -> Result<(), ClientError> {
        let mut state = self.begin_write("update_vhost")?;
        let key = (instance_id.to_string(), fqdn.to_string());
        let mut vhost = state
            .committed
            .vhosts
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(format!("vhost {instance_id}/{fqdn}")))?;
        if request.application.is_some() {
            vhost.application = request.application.clone();
        }
        state.commit(Mutation::PutVhost(instance_id.to_string(), vhost));
        Ok(())
    }

    async fn delete_vhost(&self, instance_id: &str, fqdn: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_vhost")?;
        if !state
            .committed
            .vhosts
            .contains_key(&(instance_id.to_string(), fqdn.to_string()))
        {
            return Err(not_found(format!("vhost {instance_id}/{fqdn}")));
        }
        state.commit(Mutation::DeleteVhost(instance_id.to_string(), fqdn.to_string()));
        Ok(())
    }
}

#[async_trait]
impl CertificateApi for MockGandi {
    async fn create_certificate(&self, _request: &CreateCertificateRequest) -> Result<String, ClientError> {
        let mut state = self.begin_write("create_certificate")?;
        let id = Uuid::new_v4().to_string();
        state.certificates.insert(id.clone());
        Ok(id)
    }

    async fn delete_certificate(&self, id: &str) -> Result<(), ClientError> {
        let mut state = self.begin_write("delete_certificate")?;
        if !state.certificates.remove(id) {
            return Err(not_found(format!("certificate {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_record(values: &[&str]) -> NewRecord {
        NewRecord {
            rrset_name: "www".to_string(),
            rrset_type: "A".to_string(),
            rrset_ttl: 300,
            rrset_values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_writes_visible_immediately_without_lag() {
        let mock = MockGandi::new();
        mock.create_record("example.com", &a_record(&["192.168.0.1"]))
            .await
            .unwrap();

        let record = mock.get_record("example.com", "www", "A").await.unwrap();
        assert_eq!(record.rrset_values, vec!["192.168.0.1"]);
        assert_eq!(mock.writes(), 1);
        assert_eq!(mock.reads(), 1);
    }

    #[tokio::test]
    async fn test_visibility_lag_counts_reads() {
        let mock = MockGandi::with_visibility_lag(2);
        mock.create_record("example.com", &a_record(&["192.168.0.1"]))
            .await
            .unwrap();

        assert!(mock.get_record("example.com", "www", "A").await.unwrap_err().is_not_found());
        assert!(mock.get_record("example.com", "www", "A").await.unwrap_err().is_not_found());
        assert!(mock.get_record("example.com", "www", "A").await.is_ok());
        assert_eq!(mock.calls("get_record"), 3);
    }

    #[tokio::test]
    async fn test_writes_validate_against_accepted_state() {
        let mock = MockGandi::with_visibility_lag(5);
        mock.create_record("example.com", &a_record(&["1.1.1.1"]))
            .await
            .unwrap();

        // Not visible yet, but already accepted.
        let err = mock
            .create_record("example.com", &a_record(&["1.1.1.1"]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        mock.delete_record("example.com", "www", "A").await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let mock = MockGandi::new();
        mock.inject_read_failures(1, 503);
        mock.inject_write_failures(1, 500);

        assert_eq!(mock.list_keys("example.com").await.unwrap_err().status(), Some(503));
        assert!(mock.list_keys("example.com").await.is_ok());
        assert_eq!(mock.sign_domain("example.com").await.unwrap_err().status(), Some(500));
        assert!(mock.sign_domain("example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_external_changes_skip_the_lag() {
        let mock = MockGandi::with_visibility_lag(3);
        mock.external_set_record_values("example.com", "@", "TXT", &["\"manual-1\""]);

        let record = mock.get_record("example.com", "@", "TXT").await.unwrap();
        assert_eq!(record.rrset_values, vec!["\"manual-1\""]);
    }

    #[tokio::test]
    async fn test_domain_subresources_require_domain() {
        let mock = MockGandi::new();
        assert!(mock.get_nameservers("example.com").await.unwrap_err().is_not_found());

        mock.seed_domain("example.com");
        let ns = mock.get_nameservers("example.com").await.unwrap();
        assert_eq!(ns, LIVEDNS_NAMESERVERS);
    }

    #[tokio::test]
    async fn test_instance_delete_drops_vhosts() {
        let mock = MockGandi::new();
        let id = mock
            .create_instance(&CreateInstanceRequest {
                name: "site".to_string(),
                location: "FR".to_string(),
                size: "s+".to_string(),
                instance_type: InstanceType {
                    database: Named {
                        name: "mysql".to_string(),
                    },
                    language: Named {
                        name: "php".to_string(),
                    },
                },
            })
            .await
            .unwrap();
        mock.create_vhost(
            &id,
            &CreateVhostRequest {
                fqdn: "www.example.com".to_string(),
                linked_dns_zone: None,
            },
        )
        .await
        .unwrap();

        mock.delete_instance(&id).await.unwrap();
        assert!(!mock.has_instance(&id));
        assert!(mock.get_vhost(&id, "www.example.com").await.unwrap_err().is_not_found());
    }
}
