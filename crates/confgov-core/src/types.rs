//! Configuration entry types shared by the store, the cache and the
//! governance operations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{GovernanceError, GovernanceResult};

/// Largest page size a listing may request.
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

// =============================================================================
// Config Entry
// =============================================================================

/// A durable configuration entry as owned by the store.
///
/// `key` is unique and never changes after creation. `value` is free text and
/// may itself be a JSON-encoded scalar, array or object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Surrogate id assigned by the store. Only used for ordering.
    pub id: u64,
    pub key: String,
    pub value: String,
    pub name: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ConfigEntry {
    /// Build a partial entry from what the cache knows about a key.
    ///
    /// The cache only carries the group and the value, so `name` is empty,
    /// `description` is absent and the timestamps are the Unix epoch.
    #[must_use]
    pub fn from_cache(key: impl Into<String>, group: &str, value: &str) -> Self {
        Self {
            id: 0,
            key: key.into(),
            value: value.to_string(),
            name: String::new(),
            group: group.to_string(),
            description: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Encode this entry the way the cache stores it.
    #[must_use]
    pub fn cache_value(&self) -> String {
        crate::encode_entry(&self.group, &self.value)
    }
}

// =============================================================================
// Config Input
// =============================================================================

/// Fields supplied by a caller to create or update an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigInput {
    pub key: String,
    pub value: String,
    pub name: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigInput {
    /// Create a new input with the required fields.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        name: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            name: name.into(),
            group: group.into(),
            description: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check that `key`, `value`, `name` and `group` are all non-empty.
    pub fn validate(&self) -> GovernanceResult<()> {
        let missing: Vec<&str> = [
            ("key", &self.key),
            ("value", &self.value),
            ("name", &self.name),
            ("group", &self.group),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::validation(format!(
                "required fields must not be empty: {}",
                missing.join(", ")
            )))
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Store-side filter for listing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFilter {
    /// Substring match on the key.
    pub key_contains: Option<String>,
    /// Substring match on the name.
    pub name_contains: Option<String>,
    /// Exact group match.
    pub group_exact: Option<String>,
    /// Restrict to this set of groups. An empty set matches nothing.
    pub group_in: Option<BTreeSet<String>>,
}

impl ConfigFilter {
    /// Returns `true` if the entry passes every set criterion.
    #[must_use]
    pub fn matches(&self, entry: &ConfigEntry) -> bool {
        if let Some(needle) = &self.key_contains
            && !entry.key.contains(needle.as_str())
        {
            return false;
        }
        if let Some(needle) = &self.name_contains
            && !entry.name.contains(needle.as_str())
        {
            return false;
        }
        if let Some(group) = &self.group_exact
            && entry.group != *group
        {
            return false;
        }
        if let Some(groups) = &self.group_in
            && !groups.contains(&entry.group)
        {
            return false;
        }
        true
    }
}

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_number: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Create a page request, clamping both numbers into their valid ranges.
    #[must_use]
    pub fn new(page_number: u64, page_size: u64) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of items to skip.
    #[must_use]
    pub fn offset(&self) -> usize {
        let offset = self.page_number.saturating_sub(1).saturating_mul(self.page_size);
        usize::try_from(offset).unwrap_or(usize::MAX)
    }

    /// Maximum number of items on this page.
    #[must_use]
    pub fn limit(&self) -> usize {
        usize::try_from(self.page_size).unwrap_or(usize::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching items across all pages.
    pub total: u64,
    pub page_number: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    /// An empty page echoing the request.
    #[must_use]
    pub fn empty(request: PageRequest) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page_number: request.page_number,
            page_size: request.page_size,
        }
    }
}
