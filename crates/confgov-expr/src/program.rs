//! Compiled expressions.

use std::fmt;

use cel_interpreter::{Context, Value};
use serde_json::Value as JsonValue;

use crate::error::{ExprError, ExprResult};
use crate::limits::check_depth;

/// A parsed CEL expression over the `value` variable.
///
/// Programs are immutable once compiled and can be evaluated concurrently.
pub struct Program {
    source: String,
    inner: cel_interpreter::Program,
}

impl Program {
    /// Name of the single variable bound during evaluation.
    pub const VARIABLE: &'static str = "value";

    /// Check the structural limits of `source`, then parse it.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::TooDeep`] for over-nested input, otherwise a
    /// parse error carrying the parser's diagnostic.
    pub fn compile(source: &str) -> ExprResult<Self> {
        check_depth(source)?;
        let inner = cel_interpreter::Program::compile(source)
            .map_err(|e| ExprError::parse(e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            inner,
        })
    }

    /// The expression text this program was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `value` bound to the given JSON document.
    ///
    /// # Errors
    ///
    /// Returns an evaluation error on a runtime failure such as an
    /// undeclared reference, a missing map key or a type mismatch.
    pub fn eval(&self, value: &JsonValue) -> ExprResult<Value> {
        let mut context = Context::default();
        context
            .add_variable(Self::VARIABLE, value)
            .map_err(|e| ExprError::eval(e.to_string()))?;
        self.inner
            .execute(&context)
            .map_err(|e| ExprError::eval(e.to_string()))
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
