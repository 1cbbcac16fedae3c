//! Policy engine interface.
//!
//! The policy engine is an external collaborator that stores allow rules as
//! 4-tuples and answers filtered queries over them. Field filters follow the
//! usual tuple-engine convention: `values` are matched against consecutive
//! fields starting at `field_index`, and an empty value matches anything.

use std::collections::HashSet;

use async_trait::async_trait;
use confgov_core::GovernanceResult;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// =============================================================================
// Policy Tuple
// =============================================================================

/// A single allow rule: `(subject, resource, group, operation)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyTuple {
    /// Role code the rule is granted to.
    pub subject: String,
    /// Resource type, `configuration` for every rule this engine cares about.
    pub resource: String,
    /// Configuration group.
    pub group: String,
    /// `read` or `write`.
    pub operation: String,
}

impl PolicyTuple {
    /// Create a new policy tuple.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        resource: impl Into<String>,
        group: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            group: group.into(),
            operation: operation.into(),
        }
    }

    /// The tuple fields in positional order.
    #[must_use]
    pub fn fields(&self) -> [&str; 4] {
        [
            self.subject.as_str(),
            self.resource.as_str(),
            self.group.as_str(),
            self.operation.as_str(),
        ]
    }

    /// Returns `true` if the tuple matches a positional field filter.
    #[must_use]
    pub fn matches_filter(&self, field_index: usize, values: &[&str]) -> bool {
        let fields = self.fields();
        values.iter().enumerate().all(|(offset, expected)| {
            expected.is_empty()
                || fields
                    .get(field_index + offset)
                    .is_some_and(|actual| actual == expected)
        })
    }
}

/// An enforcement request, answered `true` iff a tuple with exactly these
/// fields exists.
pub type PolicyRequest = PolicyTuple;

// =============================================================================
// Policy Engine Trait
// =============================================================================

/// Operations consumed from the policy engine.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Add rules. Returns `false` and adds nothing if any rule already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy engine fails.
    async fn add_policies(&self, rules: Vec<PolicyTuple>) -> GovernanceResult<bool>;

    /// Remove every rule matching the filter. Returns `true` if any was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy engine fails.
    async fn remove_filtered_policy(
        &self,
        field_index: usize,
        values: &[&str],
    ) -> GovernanceResult<bool>;

    /// Return every rule matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy engine fails.
    async fn get_filtered_policy(
        &self,
        field_index: usize,
        values: &[&str],
    ) -> GovernanceResult<Vec<PolicyTuple>>;

    /// Atomically replace every rule matching the filter with `new_rules`.
    /// Returns `true` if the rule set changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy engine fails.
    async fn update_filtered_policies(
        &self,
        new_rules: Vec<PolicyTuple>,
        field_index: usize,
        values: &[&str],
    ) -> GovernanceResult<bool>;

    /// Answer several enforcement requests at once, in request order.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy engine fails.
    async fn batch_enforce(&self, requests: &[PolicyRequest]) -> GovernanceResult<Vec<bool>>;
}

// =============================================================================
// In-Memory Policy Engine
// =============================================================================

/// Policy engine holding its rules in memory.
#[derive(Debug, Default)]
pub struct InMemoryPolicyEngine {
    rules: RwLock<Vec<PolicyTuple>>,
}

impl InMemoryPolicyEngine {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine seeded with rules. Duplicates are dropped.
    #[must_use]
    pub fn with_policies(rules: impl IntoIterator<Item = PolicyTuple>) -> Self {
        let mut deduped: Vec<PolicyTuple> = Vec::new();
        for rule in rules {
            if !deduped.contains(&rule) {
                deduped.push(rule);
            }
        }
        Self {
            rules: RwLock::new(deduped),
        }
    }

    /// Number of rules held.
    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    /// Returns `true` if the engine holds no rules.
    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

#[async_trait]
impl PolicyEngine for InMemoryPolicyEngine {
    async fn add_policies(&self, rules: Vec<PolicyTuple>) -> GovernanceResult<bool> {
        let mut current = self.rules.write().await;
        if rules.iter().any(|rule| current.contains(rule)) {
            return Ok(false);
        }
        for rule in rules {
            if !current.contains(&rule) {
                current.push(rule);
            }
        }
        Ok(true)
    }

    async fn remove_filtered_policy(
        &self,
        field_index: usize,
        values: &[&str],
    ) -> GovernanceResult<bool> {
        let mut current = self.rules.write().await;
        let before = current.len();
        current.retain(|rule| !rule.matches_filter(field_index, values));
        Ok(current.len() != before)
    }

    async fn get_filtered_policy(
        &self,
        field_index: usize,
        values: &[&str],
    ) -> GovernanceResult<Vec<PolicyTuple>> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.matches_filter(field_index, values))
            .cloned()
            .collect())
    }

    async fn update_filtered_policies(
        &self,
        new_rules: Vec<PolicyTuple>,
        field_index: usize,
        values: &[&str],
    ) -> GovernanceResult<bool> {
        let mut current = self.rules.write().await;
        let before: HashSet<PolicyTuple> = current.iter().cloned().collect();

        current.retain(|rule| !rule.matches_filter(field_index, values));
        for rule in new_rules {
            if !current.contains(&rule) {
                current.push(rule);
            }
        }

        let after: HashSet<&PolicyTuple> = current.iter().collect();
        Ok(after.len() != before.len() || before.iter().any(|rule| !after.contains(rule)))
    }

    async fn batch_enforce(&self, requests: &[PolicyRequest]) -> GovernanceResult<Vec<bool>> {
        let current = self.rules.read().await;
        Ok(requests
            .iter()
            .map(|request| current.contains(request))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(role: &str, group: &str, op: &str) -> PolicyTuple {
        PolicyTuple::new(role, "configuration", group, op)
    }

    #[test]
    fn test_matches_filter() {
        let r = rule("admin", "billing", "read");

        assert!(r.matches_filter(0, &["admin"]));
        assert!(r.matches_filter(0, &["admin", "configuration", "billing", "read"]));
        assert!(r.matches_filter(0, &["admin", "", "billing"]));
        assert!(r.matches_filter(2, &["billing", "read"]));
        assert!(!r.matches_filter(0, &["guest"]));
        assert!(!r.matches_filter(3, &["read", "extra"]));
    }

    #[tokio::test]
    async fn test_add_policies_rejects_existing() {
        let engine = InMemoryPolicyEngine::new();

        assert!(
            engine
                .add_policies(vec![rule("a", "g1", "read")])
                .await
                .unwrap()
        );
        assert!(
            !engine
                .add_policies(vec![rule("a", "g1", "read"), rule("a", "g2", "read")])
                .await
                .unwrap()
        );
        assert_eq!(engine.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_and_remove_filtered() {
        let engine = InMemoryPolicyEngine::with_policies([
            rule("a", "g1", "read"),
            rule("a", "g1", "write"),
            rule("b", "g2", "read"),
        ]);

        let found = engine
            .get_filtered_policy(0, &["a", "configuration"])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        assert!(engine.remove_filtered_policy(0, &["a"]).await.unwrap());
        assert!(!engine.remove_filtered_policy(0, &["a"]).await.unwrap());
        assert_eq!(engine.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_filtered_policies_replaces_role_rules() {
        let engine = InMemoryPolicyEngine::with_policies([
            rule("a", "g1", "read"),
            rule("b", "g1", "read"),
        ]);

        let changed = engine
            .update_filtered_policies(
                vec![rule("a", "g2", "write")],
                0,
                &["a", "configuration"],
            )
            .await
            .unwrap();
        assert!(changed);

        let a_rules = engine.get_filtered_policy(0, &["a"]).await.unwrap();
        assert_eq!(a_rules, vec![rule("a", "g2", "write")]);
        assert_eq!(engine.get_filtered_policy(0, &["b"]).await.unwrap().len(), 1);

        let unchanged = engine
            .update_filtered_policies(
                vec![rule("a", "g2", "write")],
                0,
                &["a", "configuration"],
            )
            .await
            .unwrap();
        assert!(!unchanged);
    }

    #[tokio::test]
    async fn test_batch_enforce() {
        let engine = InMemoryPolicyEngine::with_policies([rule("b", "g1", "read")]);

        let results = engine
            .batch_enforce(&[rule("a", "g1", "read"), rule("b", "g1", "read")])
            .await
            .unwrap();
        assert_eq!(results, vec![false, true]);
    }
}
