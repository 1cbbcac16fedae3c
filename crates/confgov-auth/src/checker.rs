//! Group-scoped permission checks.
//!
//! [`PermissionChecker`] answers two questions for a caller's roles:
//!
//! - may these roles read/write group `G`?
//! - which groups may these roles read/write?
//!
//! It keeps no state of its own. Every call re-queries the policy engine,
//! so a rule change is visible to the very next check.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use confgov_core::{CONFIGURATION_RESOURCE, GovernanceError, GovernanceResult};
use serde::{Deserialize, Serialize};

use crate::engine::PolicyEngine;

/// Message attached to every permission denial.
pub const FORBIDDEN_MESSAGE: &str = "common.configuration.forbidden";

// =============================================================================
// Operation
// =============================================================================

/// Operation a policy tuple grants on a configuration group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// The policy-tuple spelling of this operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(GovernanceError::validation(format!(
                "unknown operation '{other}', expected 'read' or 'write'"
            ))),
        }
    }
}

// =============================================================================
// Permission Checker
// =============================================================================

/// Stateless facade over the policy engine.
///
/// Roles are passed explicitly to every call; resolving them from a request
/// is the transport layer's job.
pub struct PermissionChecker {
    engine: Arc<dyn PolicyEngine>,
    public_group_prefix: Option<String>,
}

impl PermissionChecker {
    /// Create a checker over the given policy engine.
    #[must_use]
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            engine,
            public_group_prefix: None,
        }
    }

    /// Let anyone read groups starting with `prefix`. Writes are never exempt.
    #[must_use]
    pub fn with_public_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.public_group_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Returns `true` if `group` is readable without any role.
    #[must_use]
    pub fn is_public_group(&self, group: &str) -> bool {
        self.public_group_prefix
            .as_deref()
            .is_some_and(|prefix| group.starts_with(prefix))
    }

    /// Check that at least one of `roles` may read `group`.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if no role grants the read, or a policy engine
    /// error if the engine fails.
    pub async fn check_read_permission(&self, roles: &[String], group: &str) -> GovernanceResult<()> {
        if self.is_public_group(group) {
            return Ok(());
        }
        self.check_permission(roles, group, Operation::Read).await
    }

    /// Check that at least one of `roles` may write `group`.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if no role grants the write, or a policy engine
    /// error if the engine fails.
    pub async fn check_write_permission(
        &self,
        roles: &[String],
        group: &str,
    ) -> GovernanceResult<()> {
        self.check_permission(roles, group, Operation::Write).await
    }

    /// Same as [`check_permission`](Self::check_permission) but denials carry
    /// `message` instead of the default forbidden message.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` with `message` on denial; engine failures are
    /// propagated unchanged.
    pub async fn check_permission_with_message(
        &self,
        roles: &[String],
        group: &str,
        operation: Operation,
        message: &str,
    ) -> GovernanceResult<()> {
        if operation == Operation::Read && self.is_public_group(group) {
            return Ok(());
        }
        match self.check_permission(roles, group, operation).await {
            Err(GovernanceError::Forbidden { .. }) => Err(GovernanceError::forbidden(message)),
            other => other,
        }
    }

    /// Check that at least one of `roles` holds `(role, configuration, group, operation)`.
    ///
    /// Roles are tried in order and the first match wins.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if `roles` is empty or no role matches, or a
    /// policy engine error if the engine fails.
    pub async fn check_permission(
        &self,
        roles: &[String],
        group: &str,
        operation: Operation,
    ) -> GovernanceResult<()> {
        let roles = usable_roles(roles);
        if roles.is_empty() {
            tracing::warn!(group, %operation, "Permission check without any caller role");
            return Err(GovernanceError::forbidden(FORBIDDEN_MESSAGE));
        }
        // An empty value is a wildcard in field filters.
        if group.is_empty() {
            return Err(GovernanceError::forbidden(FORBIDDEN_MESSAGE));
        }

        for role in roles {
            let policies = self
                .engine
                .get_filtered_policy(
                    0,
                    &[role, CONFIGURATION_RESOURCE, group, operation.as_str()],
                )
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        role,
                        group,
                        %operation,
                        error = %e,
                        "Failed to query configuration policies"
                    );
                })?;

            if !policies.is_empty() {
                tracing::debug!(role, group, %operation, "Configuration permission granted");
                return Ok(());
            }
        }

        tracing::debug!(group, %operation, "Configuration permission denied");
        Err(GovernanceError::forbidden(FORBIDDEN_MESSAGE))
    }

    /// Groups for which at least one of `roles` holds `operation`.
    ///
    /// With `operation == None` the groups of both operations are unioned.
    /// A caller without roles gets an empty set, which means "nothing
    /// visible", never "unrestricted".
    ///
    /// # Errors
    ///
    /// Returns a policy engine error if the engine fails.
    pub async fn get_allowed_groups(
        &self,
        roles: &[String],
        operation: Option<Operation>,
    ) -> GovernanceResult<BTreeSet<String>> {
        let roles = usable_roles(roles);
        let mut groups = BTreeSet::new();
        if roles.is_empty() {
            tracing::warn!("Allowed-groups lookup without any caller role");
            return Ok(groups);
        }

        for role in roles {
            let policies = self
                .engine
                .get_filtered_policy(0, &[role, CONFIGURATION_RESOURCE])
                .await
                .inspect_err(|e| {
                    tracing::error!(role, error = %e, "Failed to query configuration policies");
                })?;

            groups.extend(
                policies
                    .into_iter()
                    .filter(|policy| {
                        operation.is_none_or(|op| policy.operation == op.as_str())
                    })
                    .map(|policy| policy.group),
            );
        }

        Ok(groups)
    }
}

impl fmt::Debug for PermissionChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionChecker")
            .field("public_group_prefix", &self.public_group_prefix)
            .finish_non_exhaustive()
    }
}

/// Role codes that can be used in a field filter. An empty code would match
/// every role.
fn usable_roles(roles: &[String]) -> Vec<&str> {
    roles
        .iter()
        .map(String::as_str)
        .filter(|role| !role.is_empty())
        .collect()
}
