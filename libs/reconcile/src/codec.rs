//! Canonical value codec.
//!
//! LiveDNS returns TXT values wrapped in double quotes while configuration
//! usually declares them bare. Comparisons go through the unwrapped form so
//! `"v=spf1 -all"` and `v=spf1 -all` are the same record entry.

use std::borrow::Cow;

/// Quoting marker applied by the remote.
pub const QUOTE: char = '"';

/// Returns true iff the value carries the marker on both ends.
///
/// A lone `"` or a value with a marker on one side only is unwrapped.
pub fn is_wrapped(value: &str) -> bool {
    value.len() >= 2 && value.starts_with(QUOTE) && value.ends_with(QUOTE)
}

/// Wraps a value in quotes unless it already is.
pub fn wrap(value: &str) -> Cow<'_, str> {
    if is_wrapped(value) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{QUOTE}{value}{QUOTE}"))
    }
}

/// Strips one marker from each end of a wrapped value.
pub fn unwrap(value: &str) -> &str {
    if is_wrapped(value) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Transport-agnostic equality.
pub fn canonical_eq(a: &str, b: &str) -> bool {
    unwrap(a) == unwrap(b)
}
