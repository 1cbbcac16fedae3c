//! Cache-entry encoding.
//!
//! The in-memory cache stores each configuration as a single string of the
//! form `group<>value`. The composite form lives only in the cache; the
//! store always holds `group` and `value` as separate columns.

use crate::{GovernanceError, GovernanceResult};

/// Delimiter between the group and the value of an encoded cache entry.
pub const SEPARATOR: &str = "<>";

/// Encode a group and a value into a cache entry.
#[must_use]
pub fn encode_entry(group: &str, value: &str) -> String {
    let mut encoded = String::with_capacity(group.len() + SEPARATOR.len() + value.len());
    encoded.push_str(group);
    encoded.push_str(SEPARATOR);
    encoded.push_str(value);
    encoded
}

/// Split a cache entry into `(group, value)`.
///
/// The entry must contain the separator exactly once. A value that itself
/// contains the separator yields more than two parts and is reported as a
/// [`GovernanceError::Format`] error rather than guessed at.
pub fn split_entry(encoded: &str) -> GovernanceResult<(&str, &str)> {
    let mut parts = encoded.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(group), Some(value), None) => Ok((group, value)),
        _ => Err(GovernanceError::format(encoded)),
    }
}

/// Returns `true` if the value would make its cache entry ambiguous.
#[must_use]
pub fn collides_with_separator(value: &str) -> bool {
    value.contains(SEPARATOR)
}
