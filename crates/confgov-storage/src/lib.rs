//! # confgov-storage
//!
//! The durable configuration store is an external collaborator of the
//! governance engine. This crate defines the interface the engine consumes
//! ([`ConfigStore`]) and an in-memory backend ([`InMemoryConfigStore`]) used
//! for bootstrapping and tests.
//!
//! Store calls are expected to bound their own latency; the engine never
//! holds one of its locks across a store call.

pub mod memory;

pub use memory::InMemoryConfigStore;

use std::collections::BTreeSet;

use async_trait::async_trait;
use confgov_core::{ConfigEntry, ConfigFilter, ConfigInput, GovernanceResult, Page, PageRequest};

/// Storage operations for configuration entries.
///
/// Entries are addressed by their unique `key`; the surrogate `id` is only
/// used for ordering listings.
///
/// # Example
///
/// ```ignore
/// use confgov_storage::ConfigStore;
///
/// async fn example(store: &impl ConfigStore) {
///     for entry in store.list_all().await? {
///         println!("{} ({}) = {}", entry.key, entry.group, entry.value);
///     }
/// }
/// ```
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Get an entry by key.
    ///
    /// Returns `None` if no entry has this key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_by_key(&self, key: &str) -> GovernanceResult<Option<ConfigEntry>>;

    /// List every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_all(&self) -> GovernanceResult<Vec<ConfigEntry>>;

    /// Create the entry, or update the existing entry with the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, input: &ConfigInput) -> GovernanceResult<ConfigEntry>;

    /// Delete the entry with this key, returning the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_key(&self, key: &str) -> GovernanceResult<u64>;

    /// List entries matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_by_filter(
        &self,
        filter: &ConfigFilter,
        page: PageRequest,
    ) -> GovernanceResult<Page<ConfigEntry>>;

    /// List the distinct groups present in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_groups(&self) -> GovernanceResult<BTreeSet<String>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .map(|entry| entry.group)
            .collect())
    }
}
