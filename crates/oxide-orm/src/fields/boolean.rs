//! Boolean fields.

use crate::error::ValidationError;
use crate::value::Value;

/// Reads a textual flag: `""`, `no`, `false`, `off`, `disabled` and `0`
/// are false (case-insensitive), anything else is true.
#[must_use]
pub fn parse_bool(text: &str) -> bool {
    let lower = text.trim().to_ascii_lowercase();
    !matches!(lower.as_str(), "" | "no" | "false" | "off" | "disabled" | "0")
}

pub(super) fn coerce(field: &str, value: Value) -> Result<Value, ValidationError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(n) => Ok(Value::Bool(n != 0)),
        Value::Float(v) => Ok(Value::Bool(v != 0.0)),
        Value::Text(s) => Ok(Value::Bool(parse_bool(&s))),
        other => Err(ValidationError::WrongType {
            field: String::from(field),
            found: other.kind(),
        }),
    }
}
