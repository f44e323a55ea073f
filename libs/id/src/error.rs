//! Error types for identity parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating resource identities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The identity string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The identity has the wrong number of `/`-separated segments.
    #[error("id format should be '{expected}', got '{actual}'")]
    WrongSegmentCount {
        expected: &'static str,
        actual: String,
    },

    /// One of the segments is empty.
    #[error("empty '{segment}' segment in '{actual}'")]
    EmptySegment {
        segment: &'static str,
        actual: String,
    },

    /// A bare id was given but no parent is known to scope it.
    #[error("missing '{parent}' for bare id '{id}'")]
    MissingParent { parent: &'static str, id: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error indicates a malformed layout.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            IdError::WrongSegmentCount { .. } | IdError::EmptySegment { .. }
        )
    }
}
