//! Typed identity definitions for all managed Gandi resources.
//!
//! Sub-objects are identified relative to their parent. DNS records are the
//! exception: an rrset is addressed by zone, name and type together.

use crate::define_scoped_id;
use crate::IdError;

// =============================================================================
// Domain API
// =============================================================================

define_scoped_id!(DnssecKeyRef, "domain", "key_id");
define_scoped_id!(GlueRecordRef, "zone", "name");

// =============================================================================
// LiveDNS API
// =============================================================================

define_scoped_id!(LiveDnsKeyRef, "domain", "uuid");

// =============================================================================
// SimpleHosting API
// =============================================================================

define_scoped_id!(VhostRef, "instance_id", "fqdn");

// =============================================================================
// LiveDNS records
// =============================================================================

/// Record type that supports shared (externally mutable) value sets.
pub const TXT: &str = "TXT";

/// Identity of a LiveDNS rrset: `{zone}/{name}/{type}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub zone: String,
    pub name: String,
    pub rtype: String,
}

impl RecordId {
    /// Expected layout, used in error messages.
    pub const FORMAT: &'static str = "{zone_id}/{record_name}/{record_type}";

    /// Creates a record identity from its parts.
    #[must_use]
    pub fn new(zone: impl Into<String>, name: impl Into<String>, rtype: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
            rtype: rtype.into(),
        }
    }

    /// Parses `{zone}/{name}/{type}`.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let parts: Vec<&str> = s.split('/').collect();
        let [zone, name, rtype] = parts.as_slice() else {
            return Err(IdError::WrongSegmentCount {
                expected: Self::FORMAT,
                actual: s.to_string(),
            });
        };

        for (segment, value) in [("zone", zone), ("name", name), ("type", rtype)] {
            if value.is_empty() {
                return Err(IdError::EmptySegment {
                    segment,
                    actual: s.to_string(),
                });
            }
        }

        Ok(Self::new(*zone, *name, *rtype))
    }

    /// Returns true for TXT rrsets.
    pub fn is_txt(&self) -> bool {
        self.rtype.eq_ignore_ascii_case(TXT)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zone, self.name, self.rtype)
    }
}

impl std::str::FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_roundtrip() {
        let id = RecordId::new("example.com", "www", "A");
        let s = id.to_string();
        assert_eq!(s, "example.com/www/A");
        let parsed: RecordId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_id_wrong_segment_count() {
        let result: Result<RecordId, _> = "example.com/www".parse();
        assert!(matches!(
            result.unwrap_err(),
            IdError::WrongSegmentCount { .. }
        ));

        let result: Result<RecordId, _> = "example.com/www/A/extra".parse();
        assert!(result.unwrap_err().is_format_error());
    }

    #[test]
    fn test_record_id_empty_segment() {
        let result: Result<RecordId, _> = "example.com//TXT".parse();
        assert!(matches!(
            result.unwrap_err(),
            IdError::EmptySegment { segment: "name", .. }
        ));
    }

    #[test]
    fn test_record_id_empty() {
        let result: Result<RecordId, _> = "".parse();
        assert!(result.unwrap_err().is_empty());
    }

    #[test]
    fn test_record_id_txt_detection() {
        assert!(RecordId::new("z", "n", "TXT").is_txt());
        assert!(RecordId::new("z", "n", "txt").is_txt());
        assert!(!RecordId::new("z", "n", "CNAME").is_txt());
    }

    #[test]
    fn test_scoped_id_import_form() {
        let key: DnssecKeyRef = "example.com/42".parse().unwrap();
        assert_eq!(key.parent, "example.com");
        assert_eq!(key.id, "42");
        assert_eq!(key.to_string(), "example.com/42");
    }

    #[test]
    fn test_scoped_id_bare_form_uses_known_parent() {
        let key = LiveDnsKeyRef::parse_scoped("5f2c", Some("example.com")).unwrap();
        assert_eq!(key, LiveDnsKeyRef::new("example.com", "5f2c"));

        // An explicit parent in the string wins over configuration.
        let key = LiveDnsKeyRef::parse_scoped("other.org/5f2c", Some("example.com")).unwrap();
        assert_eq!(key.parent, "other.org");
    }

    #[test]
    fn test_scoped_id_bare_form_without_parent() {
        let result = GlueRecordRef::parse("ns1");
        assert!(matches!(
            result.unwrap_err(),
            IdError::MissingParent { parent: "zone", .. }
        ));
    }

    #[test]
    fn test_scoped_id_rejects_extra_segments() {
        let result = VhostRef::parse("inst/www.example.com/extra");
        assert!(result.unwrap_err().is_format_error());
    }

    #[test]
    fn test_scoped_id_rejects_empty_parts() {
        assert!(matches!(
            DnssecKeyRef::parse("/42").unwrap_err(),
            IdError::EmptySegment { segment: "domain", .. }
        ));
        assert!(matches!(
            DnssecKeyRef::parse("example.com/").unwrap_err(),
            IdError::EmptySegment { segment: "key_id", .. }
        ));
    }

    #[test]
    fn test_ids_json_roundtrip() {
        let id = RecordId::new("example.com", "@", "TXT");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"example.com/@/TXT\"");
        let parsed: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);

        let vhost = VhostRef::new("inst-1", "www.example.com");
        let json = serde_json::to_string(&vhost).unwrap();
        let parsed: VhostRef = serde_json::from_str(&json).unwrap();
        assert_eq!(vhost, parsed);
    }

    proptest::proptest! {
        #[test]
        fn prop_record_id_roundtrip(
            zone in "[a-z0-9.-]{1,20}",
            name in "[a-z0-9@_*-]{1,12}",
            rtype in "[A-Z]{1,5}",
        ) {
            let id = RecordId::new(zone, name, rtype);
            let parsed = RecordId::parse(&id.to_string()).unwrap();
            proptest::prop_assert_eq!(id, parsed);
        }

        #[test]
        fn prop_scoped_id_roundtrip(parent in "[a-z0-9.-]{1,20}", id in "[a-z0-9-]{1,36}") {
            let key = DnssecKeyRef::new(parent, id);
            let parsed: DnssecKeyRef = key.to_string().parse().unwrap();
            proptest::prop_assert_eq!(key, parsed);
        }
    }
}
