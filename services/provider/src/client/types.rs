//! Wire types for the Gandi v5 API.
//!
//! Only the fields the reconciliation core reads or writes are modelled;
//! unknown fields are ignored on decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// LiveDNS
// =============================================================================

/// A LiveDNS rrset as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub rrset_name: String,
    pub rrset_type: String,
    pub rrset_ttl: u32,
    #[serde(default)]
    pub rrset_values: Vec<String>,
    #[serde(default)]
    pub rrset_href: String,
}

/// Body of a record creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub rrset_name: String,
    pub rrset_type: String,
    pub rrset_ttl: u32,
    pub rrset_values: Vec<String>,
}

/// A LiveDNS DNSSEC signing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    pub uuid: String,
    #[serde(default)]
    pub flags: i32,
    #[serde(default)]
    pub algorithm: i32,
    #[serde(default)]
    pub algorithm_name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub ds: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub tag: i32,
}

/// A domain as seen by LiveDNS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveDnsDomain {
    pub fqdn: String,
    #[serde(default)]
    pub zone_uuid: Option<String>,
}

// =============================================================================
// Domain
// =============================================================================

/// Legal type of a domain contact. Encoded as an integer on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContactType {
    #[default]
    Person,
    Company,
    Association,
    PublicBody,
    Reseller,
}

impl ContactType {
    const NAMES: [&'static str; 5] = ["person", "company", "association", "public body", "reseller"];

    pub fn as_str(&self) -> &'static str {
        Self::NAMES[u8::from(*self) as usize]
    }
}

impl From<ContactType> for u8 {
    fn from(t: ContactType) -> Self {
        match t {
            ContactType::Person => 0,
            ContactType::Company => 1,
            ContactType::Association => 2,
            ContactType::PublicBody => 3,
            ContactType::Reseller => 4,
        }
    }
}

impl TryFrom<u8> for ContactType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Person),
            1 => Ok(Self::Company),
            2 => Ok(Self::Association),
            3 => Ok(Self::PublicBody),
            4 => Ok(Self::Reseller),
            other => Err(format!("unknown contact type {other}")),
        }
    }
}

impl FromStr for ContactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .position(|n| *n == s)
            .and_then(|i| Self::try_from(i as u8).ok())
            .ok_or_else(|| format!("must be one of {}, got '{s}'", Self::NAMES.join(", ")))
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub country: String,
    pub email: String,
    #[serde(rename = "family")]
    pub family_name: String,
    #[serde(rename = "given")]
    pub given_name: String,
    #[serde(rename = "streetaddr")]
    pub street_addr: String,
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    pub phone: String,
    pub city: String,
    pub zip: String,
    #[serde(rename = "orgname", default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// The four contacts of a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<Contact>,
}

/// Body of a domain registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDomainRequest {
    pub fqdn: String,
    pub owner: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRenew {
    #[serde(default)]
    pub enabled: bool,
}

/// A registered domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDetails {
    pub fqdn: String,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub autorenew: AutoRenew,
    #[serde(default)]
    pub contacts: Option<Contacts>,
}

/// A DNSSEC key published at the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnssecKey {
    pub id: u64,
    pub algorithm: i32,
    #[serde(rename = "type")]
    pub key_type: String,
    pub public_key: String,
}

/// Body of a DNSSEC key creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnssecKeyRequest {
    pub algorithm: i32,
    #[serde(rename = "type")]
    pub key_type: String,
    pub public_key: String,
}

/// A glue record (registry host object).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlueRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub fqdn_unicode: String,
}

/// Body of a glue record creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlueRecordRequest {
    pub name: String,
    pub ips: Vec<String>,
}

// =============================================================================
// SimpleHosting
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    #[serde(default)]
    pub region: String,
}

/// A SimpleHosting instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub datacenter: Datacenter,
    #[serde(default)]
    pub database: Named,
    #[serde(default)]
    pub language: Named,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub database: Named,
    pub language: Named,
}

/// Body of an instance creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub location: String,
    pub size: String,
    #[serde(rename = "type")]
    pub instance_type: InstanceType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedDnsZone {
    #[serde(default)]
    pub allow_alteration: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_alteration_override: bool,
}

/// A SimpleHosting virtual host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vhost {
    pub fqdn: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub linked_dns_zone: LinkedDnsZone,
    #[serde(default)]
    pub application: Option<Named>,
}

/// Body of a vhost creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVhostRequest {
    pub fqdn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_dns_zone: Option<LinkedDnsZone>,
}

/// Body of a vhost patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchVhostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<Named>,
}

// =============================================================================
// Certificate
// =============================================================================

/// Package name of the free single-domain certificate.
pub const FREE_CERTIFICATE_PACKAGE: &str = "cert_free_1_0_0";

/// Body of a certificate order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCertificateRequest {
    pub cn: String,
    pub package: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_type_names_roundtrip() {
        for name in ["person", "company", "association", "public body", "reseller"] {
            let t: ContactType = name.parse().unwrap();
            assert_eq!(t.to_string(), name);
        }
        assert!("superhero".parse::<ContactType>().is_err());
    }

    #[test]
    fn test_contact_type_is_numeric_on_the_wire() {
        let json = serde_json::to_string(&ContactType::PublicBody).unwrap();
        assert_eq!(json, "3");
        let parsed: ContactType = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, ContactType::Reseller);
        assert!(serde_json::from_str::<ContactType>("9").is_err());
    }

    #[test]
    fn test_record_decodes_without_optional_fields() {
        let record: DomainRecord = serde_json::from_value(serde_json::json!({
            "rrset_name": "www",
            "rrset_type": "A",
            "rrset_ttl": 300
        }))
        .unwrap();
        assert!(record.rrset_values.is_empty());
        assert!(record.rrset_href.is_empty());
    }

    #[test]
    fn test_instance_request_uses_type_key() {
        let req = CreateInstanceRequest {
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
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"]["database"]["name"], "mysql");
    }
}
