//! Registered domains.
//!
//! Registration is synchronous: the API answers once the domain exists, so
//! nothing is polled. Domains cannot be deleted through the API; deleting
//! the resource only stops managing it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{Contact, ContactType, Contacts, CreateDomainRequest, DomainApi, DomainDetails};
use crate::error::{ProviderError, Result};
use crate::lifecycle::{DeleteOutcome, OpContext, Resource, ResourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSpec {
    pub fqdn: String,
    /// Nameservers to register with; `None` keeps the registry default.
    pub nameservers: Option<Vec<String>>,
    pub autorenew: bool,
    pub contacts: Contacts,
}

impl DomainSpec {
    fn validate(&self) -> Result<()> {
        if self.contacts.owner.is_none() {
            return Err(ProviderError::invalid_spec("owner", "an owner contact is required"));
        }
        let contacts = [
            ("owner", &self.contacts.owner),
            ("admin", &self.contacts.admin),
            ("billing", &self.contacts.billing),
            ("tech", &self.contacts.tech),
        ];
        for (role, contact) in contacts {
            if let Some(contact) = contact {
                validate_contact(role, contact)?;
            }
        }
        Ok(())
    }
}

fn validate_contact(role: &'static str, contact: &Contact) -> Result<()> {
    let country = &contact.country;
    if country.chars().count() != 2 {
        return Err(ProviderError::invalid_spec(
            role,
            format!("country must be a two letter country code, got '{country}'"),
        ));
    }
    let has_organisation = contact.organisation.as_deref().is_some_and(|o| !o.is_empty());
    if contact.contact_type != ContactType::Person && !has_organisation {
        return Err(ProviderError::invalid_spec(
            role,
            format!("an organisation is required for a {} contact", contact.contact_type),
        ));
    }
    Ok(())
}

impl ResourceKey for DomainSpec {
    fn resource_key(&self) -> String {
        self.fqdn.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainState {
    pub fqdn: String,
    /// Last known nameservers, `None` until read back.
    pub nameservers: Option<Vec<String>>,
    pub autorenew: bool,
    pub contacts: Contacts,
}

impl DomainState {
    fn declared(spec: &DomainSpec) -> Self {
        Self {
            fqdn: spec.fqdn.clone(),
            nameservers: spec.nameservers.clone(),
            autorenew: spec.autorenew,
            contacts: spec.contacts.clone(),
        }
    }

    fn observed(domain: DomainDetails) -> Self {
        Self {
            fqdn: domain.fqdn,
            nameservers: Some(domain.nameservers),
            autorenew: domain.autorenew.enabled,
            contacts: domain.contacts.unwrap_or_default(),
        }
    }

    /// State for a domain adopted by name.
    pub fn imported(fqdn: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            nameservers: None,
            autorenew: false,
            contacts: Contacts::default(),
        }
    }
}

impl ResourceKey for DomainState {
    fn resource_key(&self) -> String {
        self.fqdn.clone()
    }
}

pub struct Domains {
    client: Arc<dyn DomainApi>,
}

impl Domains {
    pub fn new(client: Arc<dyn DomainApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for Domains {
    type Spec = DomainSpec;
    type State = DomainState;
    const KIND: &'static str = "domain";

    async fn create(&self, ctx: &mut OpContext<'_>, spec: &DomainSpec) -> Result<DomainState> {
        spec.validate()?;
        let contacts = &spec.contacts;
        let request = CreateDomainRequest {
            fqdn: spec.fqdn.clone(),
            owner: contacts.owner.clone(),
            admin: contacts.admin.clone(),
            billing: contacts.billing.clone(),
            tech: contacts.tech.clone(),
            nameservers: spec.nameservers.clone(),
        };
        self.client.create_domain(&request).await?;
        ctx.accepted();

        if spec.autorenew {
            self.client.set_autorenew(&spec.fqdn, true).await?;
        }
        Ok(DomainState::declared(spec))
    }

    async fn read(&self, state: &DomainState) -> Result<DomainState> {
        let domain = self.client.get_domain(&state.fqdn).await?;
        Ok(DomainState::observed(domain))
    }

    async fn update(&self, ctx: &mut OpContext<'_>, prior: &DomainState, spec: &DomainSpec) -> Result<DomainState> {
        if spec.fqdn != prior.fqdn {
            return Err(ProviderError::requires_replacement(prior.fqdn.clone(), "fqdn"));
        }
        spec.validate()?;

        if spec.contacts != prior.contacts {
            self.client.set_contacts(&spec.fqdn, &spec.contacts).await?;
            ctx.accepted();
        }
        if spec.autorenew != prior.autorenew {
            self.client.set_autorenew(&spec.fqdn, spec.autorenew).await?;
            ctx.accepted();
        }
        match &spec.nameservers {
            Some(nameservers) if prior.nameservers.as_ref() != Some(nameservers) => {
                self.client.update_nameservers(&spec.fqdn, nameservers).await?;
                ctx.accepted();
            }
            _ => {}
        }
        if !ctx.write_accepted() {
            debug!(domain = %spec.fqdn, "Domain unchanged");
        }

        let mut state = DomainState::declared(spec);
        if state.nameservers.is_none() {
            state.nameservers = prior.nameservers.clone();
        }
        Ok(state)
    }

    async fn delete(&self, _ctx: &mut OpContext<'_>, _state: &DomainState) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Forgotten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::LIVEDNS_NAMESERVERS;
    use crate::client::MockGandi;
    use crate::lifecycle::Lifecycle;

    fn contact(contact_type: ContactType) -> Contact {
        Contact {
            country: "FR".to_string(),
            email: "hostmaster@example.com".to_string(),
            family_name: "Doe".to_string(),
            given_name: "Jane".to_string(),
            street_addr: "1 rue de la Paix".to_string(),
            contact_type,
            phone: "+33.123456789".to_string(),
            city: "Paris".to_string(),
            zip: "75002".to_string(),
            organisation: None,
            state: None,
        }
    }

    fn spec() -> DomainSpec {
        DomainSpec {
            fqdn: "example.com".to_string(),
            nameservers: None,
            autorenew: true,
            contacts: Contacts {
                owner: Some(contact(ContactType::Person)),
                ..Default::default()
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_and_read() {
        let mock = Arc::new(MockGandi::new());
        let domains = Domains::new(mock.clone());
        let lc = Lifecycle::default();

        let state = lc.create(&domains, &spec()).await.unwrap();
        assert!(state.autorenew);
        assert_eq!(mock.calls("set_autorenew"), 1);

        let read = lc.read(&domains, &state).await.unwrap().unwrap();
        assert!(read.autorenew);
        assert_eq!(read.nameservers.unwrap(), LIVEDNS_NAMESERVERS);
        assert_eq!(read.contacts.owner.unwrap().family_name, "Doe");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_writes_only_what_changed() {
        let mock = Arc::new(MockGandi::new());
        let domains = Domains::new(mock.clone());
        let lc = Lifecycle::default();
        let state = lc.create(&domains, &spec()).await.unwrap();

        let mut changed = spec();
        changed.nameservers = Some(vec!["a.ns.example.net".to_string()]);
        let state = lc.update(&domains, &state, &changed).await.unwrap();
        assert_eq!(mock.calls("update_nameservers"), 1);
        assert_eq!(mock.calls("set_contacts"), 0);
        assert_eq!(mock.calls("set_autorenew"), 1);
        assert_eq!(mock.nameservers("example.com").unwrap(), vec!["a.ns.example.net"]);

        lc.update(&domains, &state, &changed).await.unwrap();
        assert_eq!(mock.calls("update_nameservers"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_leaves_registration() {
        let mock = Arc::new(MockGandi::new());
        let domains = Domains::new(mock.clone());
        let lc = Lifecycle::default();
        let state = lc.create(&domains, &spec()).await.unwrap();

        assert_eq!(lc.delete(&domains, &state).await.unwrap(), DeleteOutcome::Forgotten);
        assert!(mock.nameservers("example.com").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_contacts_are_rejected_before_writing() {
        let mock = Arc::new(MockGandi::new());
        let domains = Domains::new(mock.clone());
        let lc = Lifecycle::default();

        let mut bad_country = spec();
        if let Some(owner) = bad_country.contacts.owner.as_mut() {
            owner.country = "France".to_string();
        }
        let err = lc.create(&domains, &bad_country).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSpec { attribute: "owner", .. }));

        let mut company = spec();
        company.contacts.admin = Some(contact(ContactType::Company));
        assert!(lc.create(&domains, &company).await.is_err());

        let mut orphan = spec();
        orphan.contacts.owner = None;
        assert!(lc.create(&domains, &orphan).await.is_err());

        assert_eq!(mock.writes(), 0);
    }
}
