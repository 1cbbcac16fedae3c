//! In-memory configuration store backed by `DashMap`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use confgov_core::{ConfigEntry, ConfigFilter, ConfigInput, GovernanceResult, Page, PageRequest};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::ConfigStore;

/// In-memory configuration store.
///
/// This store provides:
/// - Concurrent access via `DashMap`, keyed on the configuration key
/// - Atomic upserts (the key's shard is locked for the read-modify-write)
/// - Monotonic surrogate ids for newest-first listings
#[derive(Debug)]
pub struct InMemoryConfigStore {
    entries: DashMap<String, ConfigEntry>,
    next_id: AtomicU64,
}

impl InMemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_by_key(&self, key: &str) -> GovernanceResult<Option<ConfigEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn list_all(&self) -> GovernanceResult<Vec<ConfigEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert(&self, input: &ConfigInput) -> GovernanceResult<ConfigEntry> {
        let now = OffsetDateTime::now_utc();

        let stored = match self.entries.entry(input.key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                existing.value.clone_from(&input.value);
                existing.name.clone_from(&input.name);
                existing.group.clone_from(&input.group);
                existing.description.clone_from(&input.description);
                existing.updated_at = now;
                existing.clone()
            }
            Entry::Vacant(vacant) => {
                let created = ConfigEntry {
                    id: self.next_id(),
                    key: input.key.clone(),
                    value: input.value.clone(),
                    name: input.name.clone(),
                    group: input.group.clone(),
                    description: input.description.clone(),
                    created_at: now,
                    updated_at: now,
                };
                vacant.insert(created.clone());
                created
            }
        };

        tracing::debug!(key = %stored.key, id = stored.id, "Configuration upserted");
        Ok(stored)
    }

    async fn delete_by_key(&self, key: &str) -> GovernanceResult<u64> {
        Ok(u64::from(self.entries.remove(key).is_some()))
    }

    async fn list_by_filter(
        &self,
        filter: &ConfigFilter,
        page: PageRequest,
    ) -> GovernanceResult<Page<ConfigEntry>> {
        let mut matched: Vec<ConfigEntry> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        let total = matched.len() as u64;

        Ok(Page {
            items: matched
                .into_iter()
                .skip(page.offset())
                .take(page.limit())
                .collect(),
            total,
            page_number: page.page_number,
            page_size: page.page_size,
        })
    }
}
