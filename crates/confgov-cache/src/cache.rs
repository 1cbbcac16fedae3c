//! Process-wide configuration cache.
//!
//! Maps each configuration key to its `group<>value` encoding. The cache
//! holds the whole configuration set once warmed; there is no eviction, only
//! per-key writes and wholesale replacement by the refresher.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use confgov_core::{GovernanceResult, split_entry};

/// In-memory `key -> group<>value` mapping.
///
/// Every operation only touches the map under the lock; nothing here performs
/// I/O. Readers share the lock, writers are exclusive.
#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: RwLock<HashMap<String, String>>,
}

impl ConfigCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the encoded entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    /// Get the `(group, value)` pair for `key`.
    ///
    /// Returns `Ok(None)` on a miss.
    ///
    /// # Errors
    ///
    /// Returns a `Format` error if the cached entry does not split into
    /// exactly one group and one value.
    pub fn get_decoded(&self, key: &str) -> GovernanceResult<Option<(String, String)>> {
        let Some(encoded) = self.get(key) else {
            return Ok(None);
        };
        let (group, value) = split_entry(&encoded)?;
        Ok(Some((group.to_string(), value.to_string())))
    }

    /// Insert or overwrite the entry for `key`.
    pub fn set(&self, key: impl Into<String>, encoded: impl Into<String>) {
        self.write().insert(key.into(), encoded.into());
    }

    /// Remove the entry for `key`. No-op if absent.
    pub fn delete(&self, key: &str) {
        self.write().remove(key);
    }

    /// Replace the whole map.
    ///
    /// Keys missing from `entries` disappear from the cache.
    pub fn set_all(&self, entries: HashMap<String, String>) {
        *self.write() = entries;
    }

    /// Copy of every cached entry.
    #[must_use]
    pub fn get_all(&self) -> HashMap<String, String> {
        self.read().clone()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer cannot leave the map half-updated, so a poisoned
    // lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
