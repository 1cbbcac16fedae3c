//! Periodic cache refresh.
//!
//! [`CacheRefreshService`] keeps a [`ConfigCache`] eventually consistent with
//! the durable store. It warms the cache once on start, then replaces the
//! whole map from a fresh store snapshot on every tick.
//!
//! A refresh can overwrite a write-through update whose store write
//! committed after the snapshot was read. The next write-through or refresh
//! corrects it; the two paths are not serialized against each other.
//!
//! # Example
//!
//! ```ignore
//! use confgov_cache::{CacheRefreshService, ConfigCache, RefreshConfig};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! let cache = Arc::new(ConfigCache::new());
//! let service = Arc::new(CacheRefreshService::new(cache, store, RefreshConfig::default()));
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! service.start(shutdown_rx).await;
//!
//! // ... serve requests ...
//!
//! service.shutdown().await;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use confgov_core::{GovernanceError, GovernanceResult};
use confgov_storage::ConfigStore;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cache::ConfigCache;

// =============================================================================
// Refresh Configuration
// =============================================================================

/// Configuration for the cache refresh service.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between periodic refreshes.
    ///
    /// Zero disables the background loop; only explicit refreshes run.
    pub refresh_interval: Duration,

    /// Upper bound on a single store snapshot read.
    pub store_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl RefreshConfig {
    /// Create a configuration with the given interval and store timeout.
    #[must_use]
    pub fn new(refresh_interval: Duration, store_timeout: Duration) -> Self {
        Self {
            refresh_interval,
            store_timeout,
        }
    }
}

// =============================================================================
// Refresh Statistics
// =============================================================================

/// Counters describing the refresh service's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Total number of refresh attempts, periodic and explicit.
    pub refresh_attempts: u64,
    /// Number of refreshes that replaced the cache.
    pub successful_refreshes: u64,
    /// Number of refreshes that left the cache untouched.
    pub failed_refreshes: u64,
    /// When the cache was last replaced.
    pub last_refreshed_at: Option<OffsetDateTime>,
}

// =============================================================================
// Cache Refresh Service
// =============================================================================

/// Reloads the configuration cache from the store.
pub struct CacheRefreshService {
    cache: Arc<ConfigCache>,
    store: Arc<dyn ConfigStore>,
    config: RefreshConfig,

    /// Stop signal observed by the background loop between ticks.
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,

    refresh_attempts: AtomicU64,
    successful_refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
    last_refreshed_at: Mutex<Option<OffsetDateTime>>,
}

impl CacheRefreshService {
    /// Create a refresh service. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(cache: Arc<ConfigCache>, store: Arc<dyn ConfigStore>, config: RefreshConfig) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            cache,
            store,
            config,
            stop,
            task: Mutex::new(None),
            refresh_attempts: AtomicU64::new(0),
            successful_refreshes: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
            last_refreshed_at: Mutex::new(None),
        }
    }

    /// Warm the cache, then launch the background refresh loop.
    ///
    /// The initial refresh runs before this returns. If it fails the error is
    /// logged, the cache stays as it was and the loop starts anyway; reads
    /// fall back to the store until a later refresh succeeds.
    ///
    /// The loop exits when `shutdown` flips to `true` (or its sender is
    /// dropped) or when [`stop`](Self::stop) is called. Calling `start` on a
    /// running service does nothing; a stopped service can be started again.
    pub async fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) {
        if self.is_running() {
            tracing::warn!("Cache refresh service already running");
            return;
        }

        if let Err(e) = self.refresh_now().await {
            tracing::error!(error = %e, "Initial configuration cache refresh failed");
        }

        if self.config.refresh_interval.is_zero() {
            tracing::info!("Periodic configuration cache refresh disabled");
            return;
        }

        // Clear a stop left over from a previous run.
        self.stop.send_replace(false);
        let handle = tokio::spawn(Arc::clone(self).run(shutdown, self.stop.subscribe()));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        mut stop: watch::Receiver<bool>,
    ) {
        let period = self.config.refresh_interval;
        tracing::info!(
            refresh_interval_secs = period.as_secs(),
            "Cache refresh loop started"
        );

        // The cache was just warmed, so the first tick is one period away.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop.borrow_and_update() || *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_now().await {
                        tracing::error!(error = %e, "Periodic configuration cache refresh failed");
                    }
                }
            }
        }

        tracing::info!("Cache refresh loop stopped");
    }

    /// Signal the background loop to exit.
    ///
    /// A refresh already in progress completes first. Safe to call more than
    /// once, and before `start`.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Cache refresh task ended abnormally");
        }
    }

    /// Returns `true` while the background loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Replace the cache with a fresh store snapshot, now.
    ///
    /// The store is read before the cache is touched, so a slow store never
    /// blocks cache readers. On failure the cache is left untouched.
    ///
    /// Returns the number of entries now cached.
    ///
    /// # Errors
    ///
    /// Returns a store error if listing fails or exceeds the store timeout.
    pub async fn refresh_now(&self) -> GovernanceResult<usize> {
        self.refresh_attempts.fetch_add(1, Ordering::Relaxed);

        let snapshot = match self.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let count = snapshot.len();
        self.cache.set_all(snapshot);
        self.successful_refreshes.fetch_add(1, Ordering::Relaxed);
        *self
            .last_refreshed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(OffsetDateTime::now_utc());

        tracing::info!(entries = count, "Configuration cache refreshed");
        Ok(count)
    }

    async fn load_snapshot(&self) -> GovernanceResult<HashMap<String, String>> {
        let timeout = self.config.store_timeout;
        let entries = tokio::time::timeout(timeout, self.store.list_all())
            .await
            .map_err(|_| {
                GovernanceError::store(format!(
                    "listing configurations timed out after {}ms",
                    timeout.as_millis()
                ))
            })??;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let encoded = entry.cache_value();
                (entry.key, encoded)
            })
            .collect())
    }

    /// Get refresh statistics.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            refresh_attempts: self.refresh_attempts.load(Ordering::Relaxed),
            successful_refreshes: self.successful_refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.failed_refreshes.load(Ordering::Relaxed),
            last_refreshed_at: *self
                .last_refreshed_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Get the cache this service refreshes.
    #[must_use]
    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }
}

impl std::fmt::Debug for CacheRefreshService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRefreshService")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
