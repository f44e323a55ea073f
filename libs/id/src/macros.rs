//! Macros for defining scoped identity types.

/// Macro to define an identity scoped under a parent object.
///
/// Gandi addresses most sub-objects relative to their parent (a key under a
/// domain, a vhost under an instance). The canonical string form is
/// `{parent}/{id}`, which is also the form accepted on import.
///
/// This generates a struct with:
/// - `parent` and `id` fields
/// - `new()` from both parts
/// - `parse()` accepting `{parent}/{id}`
/// - `parse_scoped()` accepting either `{parent}/{id}` or a bare `{id}`
///   when the parent is already known from configuration
/// - `Display`, `FromStr`, `Serialize` and `Deserialize`
///
/// # Example
///
/// ```ignore
/// define_scoped_id!(DnssecKeyRef, "domain", "key_id");
///
/// let key: DnssecKeyRef = "example.com/42".parse()?;
/// let same = DnssecKeyRef::parse_scoped("42", Some("example.com"))?;
/// ```
#[macro_export]
macro_rules! define_scoped_id {
    ($name:ident, $parent:literal, $child:literal) => {
        /// A scoped identity (`{parent}/{id}`).
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            /// Parent object the identity lives under.
            pub parent: String,
            /// Identifier of the object within its parent.
            pub id: String,
        }

        impl $name {
            /// Name of the parent segment, used in error messages.
            pub const PARENT: &'static str = $parent;

            /// Name of the child segment, used in error messages.
            pub const CHILD: &'static str = $child;

            /// Creates an identity from its parts.
            #[must_use]
            pub fn new(parent: impl Into<String>, id: impl Into<String>) -> Self {
                Self {
                    parent: parent.into(),
                    id: id.into(),
                }
            }

            /// Parses an identity from `{parent}/{id}`.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                Self::parse_scoped(s, None)
            }

            /// Parses either `{parent}/{id}` or a bare `{id}` scoped by `parent`.
            pub fn parse_scoped(s: &str, parent: Option<&str>) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let (parent, id) = match s.split_once('/') {
                    Some((p, i)) => (p, i),
                    None => match parent {
                        Some(p) => (p, s),
                        None => {
                            return Err($crate::IdError::MissingParent {
                                parent: Self::PARENT,
                                id: s.to_string(),
                            })
                        }
                    },
                };

                if id.contains('/') {
                    return Err($crate::IdError::WrongSegmentCount {
                        expected: concat!("{", $parent, "}/{", $child, "}"),
                        actual: s.to_string(),
                    });
                }
                if parent.is_empty() {
                    return Err($crate::IdError::EmptySegment {
                        segment: Self::PARENT,
                        actual: s.to_string(),
                    });
                }
                if id.is_empty() {
                    return Err($crate::IdError::EmptySegment {
                        segment: Self::CHILD,
                        actual: s.to_string(),
                    });
                }

                Ok(Self::new(parent, id))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}/{}", self.parent, self.id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
