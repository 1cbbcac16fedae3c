//! Expression validation of cached configuration values.
//!
//! The validator binds a configuration's decoded value to the `value`
//! variable and evaluates a boolean rule against it:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ ExpressionValidator                      │
//! │ ├── cache: Arc<ConfigCache>              │
//! │ └── programs: DashMap<source, Program>   │
//! │                                          │
//! │ validate(key, expr):                     │
//! │   1. Get or compile program (cached)     │
//! │   2. Read and decode the cached value    │
//! │   3. Evaluate, require a bool            │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Programs are cached by exact expression text and never evicted. Two
//! callers racing on the same new expression may both compile it; the last
//! insert wins and both results are equivalent.

use std::sync::Arc;

use cel_interpreter::Value;
use confgov_cache::ConfigCache;
use confgov_core::{GovernanceError, GovernanceResult, split_entry};
use dashmap::DashMap;
use serde_json::Value as JsonValue;

use crate::program::Program;
use crate::value::{decode, type_name};

/// Evaluates CEL rules against values held in the [`ConfigCache`].
pub struct ExpressionValidator {
    cache: Arc<ConfigCache>,
    programs: DashMap<String, Arc<Program>>,
}

impl ExpressionValidator {
    /// Create a validator reading from `cache`.
    pub fn new(cache: Arc<ConfigCache>) -> Self {
        Self {
            cache,
            programs: DashMap::new(),
        }
    }

    /// Evaluate `expr` against the value of `key` and return its boolean result.
    ///
    /// # Errors
    ///
    /// - `Compilation` if the expression does not parse or nests too deeply
    /// - `NotFound` if `key` is not cached
    /// - `Format` if the cached entry is malformed
    /// - `Evaluation` on a runtime failure, including an undeclared
    ///   reference, or a non-boolean result
    pub fn validate(&self, key: &str, expr: &str) -> GovernanceResult<bool> {
        let out = self.evaluate(key, expr)?;
        match out {
            Value::Bool(valid) => Ok(valid),
            other => Err(GovernanceError::evaluation(format!(
                "expression '{expr}' did not return bool, got {} ({other:?})",
                type_name(&other)
            ))),
        }
    }

    /// Evaluate `expr` against the value of `key` and return the raw result.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate), minus the boolean requirement.
    pub fn evaluate(&self, key: &str, expr: &str) -> GovernanceResult<Value> {
        let program = self.get_program(expr)?;
        let value = self.prepare_value(key)?;

        program.eval(&value).map_err(|e| {
            tracing::debug!(key = %key, expression = %expr, error = %e, "Expression evaluation failed");
            GovernanceError::evaluation(format!(
                "evaluation failed (key: '{key}', expression: '{expr}'): {e}"
            ))
        })
    }

    /// Compile `expr` without evaluating it, caching the program.
    ///
    /// # Errors
    ///
    /// Returns `Compilation` if the expression does not parse or nests too deeply.
    pub fn compile(&self, expr: &str) -> GovernanceResult<()> {
        self.get_program(expr).map(|_| ())
    }

    /// Number of cached programs.
    pub fn program_cache_size(&self) -> usize {
        self.programs.len()
    }

    /// Drop all cached programs.
    pub fn clear_program_cache(&self) {
        self.programs.clear();
        tracing::debug!("Expression program cache cleared");
    }

    fn get_program(&self, expr: &str) -> GovernanceResult<Arc<Program>> {
        if let Some(program) = self.programs.get(expr) {
            return Ok(Arc::clone(program.value()));
        }

        let program = Program::compile(expr).map(Arc::new).map_err(|e| {
            GovernanceError::compilation(format!("expression '{expr}': {e}"))
        })?;
        self.programs.insert(expr.to_string(), Arc::clone(&program));
        tracing::trace!(expression = %expr, "Compiled expression");
        Ok(program)
    }

    fn prepare_value(&self, key: &str) -> GovernanceResult<JsonValue> {
        let encoded = self
            .cache
            .get(key)
            .ok_or_else(|| GovernanceError::not_found(key))?;
        let (_, raw) = split_entry(&encoded)?;
        Ok(decode(raw))
    }
}

impl std::fmt::Debug for ExpressionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionValidator")
            .field("cached_programs", &self.programs.len())
            .finish_non_exhaustive()
    }
}
