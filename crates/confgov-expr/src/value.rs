//! Decoding stored configuration values into expression inputs.

use cel_interpreter::Value;
use serde_json::{Number, Value as JsonValue};

/// Decode a stored configuration value.
///
/// Valid JSON is decoded into its structured form; anything else is kept
/// verbatim as a string. Every JSON number becomes a double, so `50` and
/// `50.0` behave the same inside an expression.
#[must_use]
pub fn decode(raw: &str) -> JsonValue {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(json) => numbers_as_doubles(json),
        Err(_) => JsonValue::String(raw.to_string()),
    }
}

fn numbers_as_doubles(json: JsonValue) -> JsonValue {
    match json {
        JsonValue::Number(n) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map_or(JsonValue::Null, JsonValue::Number),
        JsonValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(numbers_as_doubles).collect())
        }
        JsonValue::Object(fields) => JsonValue::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, numbers_as_doubles(v)))
                .collect(),
        ),
        other => other,
    }
}

/// The CEL name of a value's type.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null_type",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::UInt(_) => "uint",
        Value::Float(_) => "double",
        Value::String(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::List(_) => "list",
        Value::Map(_) => "map",
        _ => "dyn",
    }
}
