//! Caller-facing configuration governance operations.
//!
//! Every operation takes the caller's role codes explicitly; resolving them
//! from a request is the transport's job. Each operation sequences the
//! permission check, the store, the cache and the expression validator:
//!
//! ```text
//! read:   cache ──hit──▶ check read(group) ──▶ entry
//!           └─miss──▶ store ──▶ check read(group) ──▶ backfill cache ──▶ entry
//! write:  check write(group) ──▶ store ──▶ cache(key) ──▶ refresh_now (optional)
//! ```
//!
//! Permission and existence checks always run before the store is mutated.

use std::collections::BTreeSet;
use std::sync::Arc;

use confgov_auth::{
    GroupGrant, Operation, PermissionChecker, PolicyEngine, checker::FORBIDDEN_MESSAGE,
};
use confgov_cache::{CacheRefreshService, ConfigCache};
use confgov_core::{
    CONFIGURATION_RESOURCE, ConfigEntry, ConfigFilter, ConfigInput, GovernanceError,
    GovernanceResult, Page, PageRequest, collides_with_separator, split_entry,
};
use confgov_expr::{ExpressionValidator, Value};
use confgov_storage::ConfigStore;
use serde::{Deserialize, Serialize};

/// Message for a validation against a key that is not cached.
pub const NOT_FOUND_MESSAGE: &str = "common.configuration.notFound";
/// Message for a validation the caller may not read.
pub const READ_FORBIDDEN_MESSAGE: &str = "common.forbidden";
/// Message for a validation that produced a boolean.
pub const SUCCESS_MESSAGE: &str = "common.success";

/// Filters and page for [`GovernanceService::list_configuration`].
///
/// Empty strings are treated the same as absent filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfigurationRequest {
    /// Substring of the key.
    #[serde(default)]
    pub key: Option<String>,
    /// Substring of the name.
    #[serde(default)]
    pub name: Option<String>,
    /// Exact group; must be readable by the caller.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub page: PageRequest,
}

impl ListConfigurationRequest {
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// Result of [`GovernanceService::validate_configuration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// A message code, or the error text when evaluation failed.
    pub message: String,
}

impl ValidationOutcome {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

/// The governance engine's operations over one store and one policy engine.
pub struct GovernanceService {
    store: Arc<dyn ConfigStore>,
    engine: Arc<dyn PolicyEngine>,
    cache: Arc<ConfigCache>,
    refresher: Arc<CacheRefreshService>,
    permissions: PermissionChecker,
    validator: ExpressionValidator,
    refresh_after_write: bool,
}

impl GovernanceService {
    /// Create a service over `store` and `engine`, caching through `refresher`.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        engine: Arc<dyn PolicyEngine>,
        refresher: Arc<CacheRefreshService>,
    ) -> Self {
        let cache = Arc::clone(refresher.cache());
        Self {
            permissions: PermissionChecker::new(Arc::clone(&engine)),
            validator: ExpressionValidator::new(Arc::clone(&cache)),
            store,
            engine,
            cache,
            refresher,
            refresh_after_write: true,
        }
    }

    /// Make groups with this prefix readable without a policy.
    #[must_use]
    pub fn with_public_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.permissions = self.permissions.with_public_group_prefix(prefix);
        self
    }

    /// Whether a full cache refresh follows every successful write.
    #[must_use]
    pub fn with_refresh_after_write(mut self, enabled: bool) -> Self {
        self.refresh_after_write = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    pub fn refresher(&self) -> &Arc<CacheRefreshService> {
        &self.refresher
    }

    pub fn permissions(&self) -> &PermissionChecker {
        &self.permissions
    }

    pub fn validator(&self) -> &ExpressionValidator {
        &self.validator
    }

    // =========================================================================
    // Configuration entries
    // =========================================================================

    /// Get the entry for `key` if one of `roles` may read its group.
    ///
    /// A cache hit returns a partial entry (key, group and value only). A miss
    /// falls back to the store and backfills the cache.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Format` for a corrupt cache entry, `Forbidden`, or a
    /// store / policy engine failure.
    pub async fn get_configuration(
        &self,
        roles: &[String],
        key: &str,
    ) -> GovernanceResult<ConfigEntry> {
        require_key(key)?;

        if let Some((group, value)) = self.cache.get_decoded(key)? {
            self.permissions.check_read_permission(roles, &group).await?;
            return Ok(ConfigEntry::from_cache(key, &group, &value));
        }

        let entry = self
            .store
            .get_by_key(key)
            .await
            .inspect_err(store_failure("get_configuration", key))?
            .ok_or_else(|| GovernanceError::not_found(key))?;

        self.permissions
            .check_read_permission(roles, &entry.group)
            .await?;

        self.cache.set(entry.key.as_str(), entry.cache_value());
        tracing::debug!(key, group = %entry.group, "Configuration cache backfilled");
        Ok(entry)
    }

    /// Create the entry, or update it if the key exists.
    ///
    /// The key's group is fixed at creation; an update naming another group is
    /// rejected.
    ///
    /// # Errors
    ///
    /// `Validation` for missing fields or a group change, `Forbidden`, or a
    /// store / policy engine failure.
    pub async fn create_or_update_configuration(
        &self,
        roles: &[String],
        input: ConfigInput,
    ) -> GovernanceResult<ConfigEntry> {
        input.validate()?;

        self.permissions
            .check_write_permission(roles, &input.group)
            .await?;

        let existing = self
            .store
            .get_by_key(&input.key)
            .await
            .inspect_err(store_failure("create_or_update_configuration", &input.key))?;

        if let Some(existing) = &existing
            && existing.group != input.group
        {
            return Err(GovernanceError::validation(format!(
                "configuration '{}' belongs to group '{}' and cannot move to '{}'",
                input.key, existing.group, input.group
            )));
        }

        if collides_with_separator(&input.value) {
            tracing::warn!(
                key = %input.key,
                "Configuration value contains the cache separator; cached reads of it will fail"
            );
        }

        let entry = self
            .store
            .upsert(&input)
            .await
            .inspect_err(store_failure("create_or_update_configuration", &input.key))?;

        self.cache.set(entry.key.as_str(), entry.cache_value());
        tracing::info!(
            key = %entry.key,
            group = %entry.group,
            created = existing.is_none(),
            "Configuration saved"
        );

        self.refresh_after_write("create_or_update_configuration", &entry.key)
            .await;
        Ok(entry)
    }

    /// Delete the entry for `key` if one of `roles` may write its group.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, or a store / policy engine failure.
    pub async fn delete_configuration(&self, roles: &[String], key: &str) -> GovernanceResult<()> {
        require_key(key)?;

        let entry = self
            .store
            .get_by_key(key)
            .await
            .inspect_err(store_failure("delete_configuration", key))?
            .ok_or_else(|| GovernanceError::not_found(key))?;

        self.permissions
            .check_write_permission(roles, &entry.group)
            .await?;

        let deleted = self
            .store
            .delete_by_key(key)
            .await
            .inspect_err(store_failure("delete_configuration", key))?;

        self.cache.delete(key);
        tracing::info!(key, group = %entry.group, deleted, "Configuration deleted");

        self.refresh_after_write("delete_configuration", key).await;
        Ok(())
    }

    /// List the entries the caller may read, newest first.
    ///
    /// A caller without readable groups gets an empty page and the store is
    /// not queried.
    ///
    /// # Errors
    ///
    /// `Forbidden` if the requested group is not readable, or a store /
    /// policy engine failure.
    pub async fn list_configuration(
        &self,
        roles: &[String],
        request: ListConfigurationRequest,
    ) -> GovernanceResult<Page<ConfigEntry>> {
        let allowed = self
            .permissions
            .get_allowed_groups(roles, Some(Operation::Read))
            .await?;

        if allowed.is_empty() {
            return Ok(Page::empty(request.page));
        }

        let mut filter = ConfigFilter {
            key_contains: non_empty(request.key),
            name_contains: non_empty(request.name),
            ..ConfigFilter::default()
        };

        match non_empty(request.group) {
            Some(group) => {
                if !allowed.contains(&group) {
                    tracing::debug!(group = %group, "Listing of an unreadable group denied");
                    return Err(GovernanceError::forbidden(FORBIDDEN_MESSAGE));
                }
                filter.group_exact = Some(group);
            }
            None => filter.group_in = Some(allowed),
        }

        self.store
            .list_by_filter(&filter, request.page)
            .await
            .inspect_err(store_failure("list_configuration", ""))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Evaluate a boolean rule against the cached value of `key`.
    ///
    /// Never fails: every problem is reported as `is_valid == false` with a
    /// message, so the result can drive conditional logic directly.
    pub async fn validate_configuration(
        &self,
        roles: &[String],
        key: &str,
        expr: &str,
    ) -> ValidationOutcome {
        let Some(encoded) = self.cache.get(key) else {
            return ValidationOutcome::invalid(NOT_FOUND_MESSAGE);
        };

        let group = match split_entry(&encoded) {
            Ok((group, _)) => group,
            Err(e) => return ValidationOutcome::invalid(e.to_string()),
        };

        if self
            .permissions
            .check_read_permission(roles, group)
            .await
            .is_err()
        {
            return ValidationOutcome::invalid(READ_FORBIDDEN_MESSAGE);
        }

        match self.validator.validate(key, expr) {
            Ok(is_valid) => ValidationOutcome {
                is_valid,
                message: SUCCESS_MESSAGE.to_string(),
            },
            Err(e) => {
                if e.is_client_error() {
                    tracing::debug!(key, expression = expr, category = ?e.category(), error = %e, "Configuration rule rejected");
                } else {
                    tracing::error!(key, expression = expr, category = ?e.category(), error = %e, "Configuration validation failed");
                }
                ValidationOutcome::invalid(e.to_string())
            }
        }
    }

    /// Evaluate `expr` against the cached value of `key` and return the result.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Format`, `Forbidden`, `Compilation` or `Evaluation`.
    pub async fn evaluate_configuration(
        &self,
        roles: &[String],
        key: &str,
        expr: &str,
    ) -> GovernanceResult<Value> {
        let (group, _) = self
            .cache
            .get_decoded(key)?
            .ok_or_else(|| GovernanceError::not_found(key))?;

        self.permissions.check_read_permission(roles, &group).await?;
        self.validator.evaluate(key, expr)
    }

    // =========================================================================
    // Role grants
    // =========================================================================

    /// Replace the configuration grants of `role`.
    ///
    /// Each grant is written `<group>:<operation>`. Malformed grants are
    /// skipped; the accepted ones are returned in canonical form.
    ///
    /// # Errors
    ///
    /// `Validation` if `role` is empty or no grant is well-formed, or a
    /// policy engine failure.
    pub async fn assign_configuration_groups(
        &self,
        role: &str,
        grants: &[String],
    ) -> GovernanceResult<Vec<String>> {
        if role.is_empty() {
            return Err(GovernanceError::validation("role must not be empty"));
        }

        let mut accepted: Vec<GroupGrant> = Vec::with_capacity(grants.len());
        for raw in grants {
            match raw.parse::<GroupGrant>() {
                Ok(grant) if !accepted.contains(&grant) => accepted.push(grant),
                Ok(_) => {}
                Err(e) => tracing::warn!(role, grant = %raw, error = %e, "Skipping malformed grant"),
            }
        }
        if accepted.is_empty() {
            return Err(GovernanceError::validation(format!(
                "no valid configuration grants for role '{role}'"
            )));
        }

        let tuples = accepted.iter().map(|grant| grant.to_tuple(role)).collect();
        let changed = self
            .engine
            .update_filtered_policies(tuples, 0, &[role, CONFIGURATION_RESOURCE])
            .await
            .inspect_err(|e| {
                tracing::error!(role, error = %e, "Failed to update configuration grants");
            })?;

        tracing::info!(role, grants = accepted.len(), changed, "Configuration grants assigned");
        Ok(accepted.iter().map(ToString::to_string).collect())
    }

    /// With a role, that role's grants as `<group>:<operation>`; without one,
    /// every group present in the store.
    ///
    /// # Errors
    ///
    /// Returns a store or policy engine failure.
    pub async fn get_configuration_groups(&self, role: Option<&str>) -> GovernanceResult<Vec<String>> {
        let Some(role) = role.filter(|r| !r.is_empty()) else {
            let groups = self
                .store
                .list_groups()
                .await
                .inspect_err(store_failure("get_configuration_groups", ""))?;
            return Ok(groups.into_iter().collect());
        };

        let policies = self
            .engine
            .get_filtered_policy(0, &[role, CONFIGURATION_RESOURCE])
            .await
            .inspect_err(|e| {
                tracing::error!(role, error = %e, "Failed to read configuration grants");
            })?;

        let grants: BTreeSet<String> = policies
            .iter()
            .filter_map(GroupGrant::from_tuple)
            .map(|grant| grant.to_string())
            .collect();
        Ok(grants.into_iter().collect())
    }

    async fn refresh_after_write(&self, operation: &'static str, key: &str) {
        if !self.refresh_after_write {
            return;
        }
        if let Err(e) = self.refresher.refresh_now().await {
            tracing::warn!(operation, key, error = %e, "Cache refresh after write failed");
        }
    }
}

impl std::fmt::Debug for GovernanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceService")
            .field("cache_size", &self.cache.size())
            .field("permissions", &self.permissions)
            .field("validator", &self.validator)
            .field("refresh_after_write", &self.refresh_after_write)
            .finish_non_exhaustive()
    }
}

fn require_key(key: &str) -> GovernanceResult<()> {
    if key.is_empty() {
        return Err(GovernanceError::validation("key must not be empty"));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn store_failure<'a>(operation: &'static str, key: &'a str) -> impl Fn(&GovernanceError) + 'a {
    move |e| {
        if e.is_server_error() {
            tracing::error!(operation, key, category = ?e.category(), error = %e, "Configuration store call failed");
        } else {
            tracing::debug!(operation, key, category = ?e.category(), error = %e, "Configuration store call rejected");
        }
    }
}
