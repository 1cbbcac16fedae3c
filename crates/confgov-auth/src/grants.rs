//! `group:operation` grant strings.
//!
//! Grants are how configuration groups are assigned to a role: each grant
//! becomes one `(role, configuration, group, operation)` tuple.

use std::fmt;
use std::str::FromStr;

use confgov_core::{CONFIGURATION_RESOURCE, GovernanceError};

use crate::checker::Operation;
use crate::engine::PolicyTuple;

/// A single group grant, written `<group>:<operation>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupGrant {
    pub group: String,
    pub operation: Operation,
}

impl GroupGrant {
    /// Create a grant.
    #[must_use]
    pub fn new(group: impl Into<String>, operation: Operation) -> Self {
        Self {
            group: group.into(),
            operation,
        }
    }

    /// The policy tuple granting this to `role`.
    #[must_use]
    pub fn to_tuple(&self, role: &str) -> PolicyTuple {
        PolicyTuple::new(
            role,
            CONFIGURATION_RESOURCE,
            self.group.as_str(),
            self.operation.as_str(),
        )
    }

    /// Read a grant back from a configuration policy tuple.
    ///
    /// Returns `None` for tuples on other resources or with an unknown operation.
    #[must_use]
    pub fn from_tuple(tuple: &PolicyTuple) -> Option<Self> {
        if tuple.resource != CONFIGURATION_RESOURCE {
            return None;
        }
        let operation = tuple.operation.parse().ok()?;
        Some(Self::new(tuple.group.as_str(), operation))
    }
}

impl fmt::Display for GroupGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.operation)
    }
}

impl FromStr for GroupGrant {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [group, operation] = parts.as_slice() else {
            return Err(GovernanceError::validation(format!(
                "grant '{s}' must have the form '<group>:<operation>'"
            )));
        };
        if group.is_empty() {
            return Err(GovernanceError::validation(format!(
                "grant '{s}' names an empty group"
            )));
        }
        Ok(Self::new(*group, operation.parse()?))
    }
}
