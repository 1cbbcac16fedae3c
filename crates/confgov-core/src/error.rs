//! Governance error types.
//!
//! Every component of the engine reports failures through [`GovernanceError`].
//! The variants mirror the taxonomy callers are expected to branch on: a
//! missing key, a corrupt cache entry, a denied permission, a bad request,
//! an expression that does not compile or does not evaluate, and failures of
//! the external store or policy engine.

use std::fmt;

/// Errors that can occur while governing configuration entries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GovernanceError {
    /// The key is absent from both the cache and the store.
    #[error("Configuration '{key}' not found")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// A cached entry does not split into exactly `group` and `value`.
    #[error("Malformed cache entry '{entry}'")]
    Format {
        /// The offending encoded entry.
        entry: String,
    },

    /// The caller's roles do not grant the required group operation.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// The request is missing required fields or carries malformed arguments.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// The expression failed to parse or type-check.
    #[error("Compilation error: {message}")]
    Compilation {
        /// Description of the compilation failure.
        message: String,
    },

    /// The expression compiled but failed at runtime or returned the wrong type.
    #[error("Evaluation error: {message}")]
    Evaluation {
        /// Description of the evaluation failure.
        message: String,
    },

    /// The configuration store failed.
    #[error("Store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
    },

    /// The policy engine failed.
    #[error("Policy engine error: {message}")]
    PolicyEngine {
        /// Description of the policy engine failure.
        message: String,
    },

    /// The engine itself is misconfigured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl GovernanceError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Format` error.
    #[must_use]
    pub fn format(entry: impl Into<String>) -> Self {
        Self::Format {
            entry: entry.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `Compilation` error.
    #[must_use]
    pub fn compilation(message: impl Into<String>) -> Self {
        Self::Compilation {
            message: message.into(),
        }
    }

    /// Creates a new `Evaluation` error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Creates a new `Store` error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a new `PolicyEngine` error.
    #[must_use]
    pub fn policy_engine(message: impl Into<String>) -> Self {
        Self::PolicyEngine {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller can fix this error by changing the request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::Validation { .. }
                | Self::Compilation { .. }
                | Self::Evaluation { .. }
        )
    }

    /// Returns `true` if this error originates in the engine or its collaborators.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Format { .. }
                | Self::Store { .. }
                | Self::PolicyEngine { .. }
                | Self::Configuration { .. }
        )
    }

    /// Returns `true` if this is a permission error.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Returns `true` if the key was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Format { .. } => ErrorCategory::Internal,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Compilation { .. } | Self::Evaluation { .. } => ErrorCategory::Expression,
            Self::Store { .. } | Self::PolicyEngine { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of governance errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The requested key does not exist.
    NotFound,
    /// Permission checks failed.
    Authorization,
    /// Request validation errors.
    Validation,
    /// Expression compilation or evaluation errors.
    Expression,
    /// Store or policy engine failures.
    Infrastructure,
    /// Engine misconfiguration.
    Configuration,
    /// Corrupt internal state.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Authorization => write!(f, "authorization"),
            Self::Validation => write!(f, "validation"),
            Self::Expression => write!(f, "expression"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
