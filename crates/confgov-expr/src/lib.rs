//! # confgov-expr
//!
//! CEL rules evaluated against cached configuration values, built on
//! `cel-interpreter`.
//!
//! An expression sees exactly one variable, `value`, bound to the decoded
//! configuration value: parsed JSON when the raw string is valid JSON,
//! otherwise the raw string itself. JSON numbers are doubles.
//!
//! ```text
//! int(value) > 20
//! value.theme == "dark" && value.max_items <= 50
//! 201 in value
//! value.startsWith("admin") || value.matches("^ops-[0-9]+$")
//! value.all(id, id > 0)
//! ```

mod error;
mod limits;
mod program;
mod validator;
mod value;

pub use cel_interpreter::Value;
pub use error::{ExprError, ExprResult};
pub use limits::{MAX_NESTING, MAX_OPERATORS};
pub use program::Program;
pub use validator::ExpressionValidator;
pub use value::{decode, type_name};
