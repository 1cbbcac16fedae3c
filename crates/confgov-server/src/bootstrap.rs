//! Seeding of the in-memory collaborators from configuration.
//!
//! Configurations are upserted into the store and policies are added to the
//! engine. Seeding is idempotent: rerunning it updates the same keys and
//! skips rules that already exist.

use confgov_auth::{Operation, PolicyEngine, PolicyTuple};
use confgov_core::{CONFIGURATION_RESOURCE, GovernanceResult};
use confgov_storage::ConfigStore;
use tracing::info;

use crate::config::SeedConfig;

/// Counts of seeded rows. `policies` only counts rules that were new.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapStats {
    pub configurations: usize,
    pub policies: usize,
}

/// Write the seed configurations and policies.
///
/// # Errors
///
/// Returns an error if a seed policy names an unknown operation, or if the
/// store or the policy engine fails.
pub async fn bootstrap_seed(
    seed: &SeedConfig,
    store: &dyn ConfigStore,
    engine: &dyn PolicyEngine,
) -> GovernanceResult<BootstrapStats> {
    let mut stats = BootstrapStats::default();

    for input in &seed.configurations {
        store.upsert(input).await?;
        stats.configurations += 1;
    }

    for policy in &seed.policies {
        let operation: Operation = policy.operation.parse()?;
        let rule = PolicyTuple::new(
            policy.role.as_str(),
            CONFIGURATION_RESOURCE,
            policy.group.as_str(),
            operation.as_str(),
        );
        // One rule per call: a batch containing an existing rule adds nothing.
        if engine.add_policies(vec![rule]).await? {
            stats.policies += 1;
        }
    }

    info!(
        configurations = stats.configurations,
        policies = stats.policies,
        "Seed data loaded"
    );
    Ok(stats)
}
