pub mod bootstrap;
pub mod config;
pub mod governance;
pub mod observability;
pub mod server;

pub use bootstrap::{BootstrapStats, bootstrap_seed};
pub use config::{AppConfig, CacheConfig, LoggingConfig, PermissionsConfig, SeedConfig, SeedPolicy};
pub use governance::{GovernanceService, ListConfigurationRequest, ValidationOutcome};
pub use observability::init_tracing;
pub use server::{GovernanceServer, ServerBuilder};
