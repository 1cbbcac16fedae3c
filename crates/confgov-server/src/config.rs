use std::time::Duration;

use confgov_auth::Operation;
use confgov_cache::RefreshConfig;
use confgov_core::ConfigInput;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Cache refresh configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Group access configuration
    #[serde(default)]
    pub permissions: PermissionsConfig,
    /// Initial configurations and policies for the in-memory collaborators
    #[serde(default)]
    pub seed: SeedConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Cache validations
        if self.cache.refresh_interval_secs == 0 {
            return Err("cache.refresh_interval_secs must be > 0".into());
        }
        if self.cache.store_timeout_ms == 0 {
            return Err("cache.store_timeout_ms must be > 0".into());
        }
        // Seed validations
        for (i, input) in self.seed.configurations.iter().enumerate() {
            input
                .validate()
                .map_err(|e| format!("seed.configurations[{i}]: {e}"))?;
        }
        for (i, policy) in self.seed.policies.iter().enumerate() {
            if policy.role.is_empty() || policy.group.is_empty() {
                return Err(format!(
                    "seed.policies[{i}]: role and group must not be empty"
                ));
            }
            policy
                .operation
                .parse::<Operation>()
                .map_err(|e| format!("seed.policies[{i}]: {e}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds between full cache reloads from the store
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Upper bound for one store call made by the refresher
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Reload the whole cache after every successful write
    #[serde(default = "default_refresh_after_write")]
    pub refresh_after_write: bool,
}

fn default_refresh_interval_secs() -> u64 {
    300
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_refresh_after_write() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            store_timeout_ms: default_store_timeout_ms(),
            refresh_after_write: default_refresh_after_write(),
        }
    }
}

impl CacheConfig {
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig::new(
            Duration::from_secs(self.refresh_interval_secs),
            Duration::from_millis(self.store_timeout_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PermissionsConfig {
    /// Groups starting with this prefix are readable by everyone.
    /// Unset means every read is checked against policies.
    #[serde(default)]
    pub public_group_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub configurations: Vec<ConfigInput>,
    #[serde(default)]
    pub policies: Vec<SeedPolicy>,
}

/// One `(role, configuration, group, operation)` rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    pub role: String,
    pub group: String,
    pub operation: String,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("confgov.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., CONFGOV__CACHE__REFRESH_INTERVAL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix("CONFGOV")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
