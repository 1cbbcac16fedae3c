//! Expression engine errors.

use confgov_core::GovernanceError;

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// The expression text is not valid CEL.
    #[error("{message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// The expression nests or chains operators beyond the accepted limits.
    #[error("expression is nested too deeply")]
    TooDeep,

    /// Evaluation failed at runtime.
    #[error("{message}")]
    Eval {
        /// Description of the runtime failure.
        message: String,
    },
}

impl ExprError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new `Eval` error.
    #[must_use]
    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised before evaluation.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::TooDeep)
    }
}

impl From<ExprError> for GovernanceError {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::Parse { .. } | ExprError::TooDeep => {
                GovernanceError::compilation(err.to_string())
            }
            ExprError::Eval { message } => GovernanceError::evaluation(message),
        }
    }
}

/// Type alias for expression engine results.
pub type ExprResult<T> = Result<T, ExprError>;
