use std::sync::Arc;

use confgov_auth::InMemoryPolicyEngine;
use confgov_cache::{CacheRefreshService, ConfigCache};
use confgov_storage::InMemoryConfigStore;
use tokio::sync::watch;

use crate::bootstrap::bootstrap_seed;
use crate::config::AppConfig;
use crate::governance::GovernanceService;

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Wire the collaborators, seed them, and assemble the governance service.
    pub async fn build(self) -> anyhow::Result<GovernanceServer> {
        let store = Arc::new(InMemoryConfigStore::new());
        let engine = Arc::new(InMemoryPolicyEngine::new());
        bootstrap_seed(&self.config.seed, store.as_ref(), engine.as_ref()).await?;

        let cache = Arc::new(ConfigCache::new());
        let refresher = Arc::new(CacheRefreshService::new(
            cache,
            store.clone(),
            self.config.cache.refresh_config(),
        ));

        let mut service = GovernanceService::new(store, engine, Arc::clone(&refresher))
            .with_refresh_after_write(self.config.cache.refresh_after_write);
        if let Some(prefix) = &self.config.permissions.public_group_prefix {
            service = service.with_public_group_prefix(prefix.as_str());
        }

        Ok(GovernanceServer {
            service: Arc::new(service),
            refresher,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct GovernanceServer {
    service: Arc<GovernanceService>,
    refresher: Arc<CacheRefreshService>,
}

impl GovernanceServer {
    pub fn service(&self) -> &Arc<GovernanceService> {
        &self.service
    }

    /// Warm the cache, keep it refreshed until Ctrl+C, then stop the refresher.
    pub async fn run(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.refresher.start(shutdown_rx).await;
        tracing::info!(
            entries = self.service.cache().size(),
            "Configuration governance engine started"
        );

        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
        self.refresher.shutdown().await;

        let stats = self.refresher.stats();
        tracing::info!(
            refreshes = stats.successful_refreshes,
            failures = stats.failed_refreshes,
            "Configuration governance engine stopped"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
