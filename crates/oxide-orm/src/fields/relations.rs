//! Reference fields.

use crate::error::ValidationError;
use crate::value::Value;

/// Only an entity of exactly the declared type is accepted.
pub(super) fn coerce(field: &str, target: &str, value: Value) -> Result<Value, ValidationError> {
    match value {
        Value::Entity(entity) if entity.type_name() == target => Ok(Value::Entity(entity)),
        Value::Entity(entity) => Err(ValidationError::WrongClass {
            field: String::from(field),
            expected: String::from(target),
            found: String::from(entity.type_name()),
        }),
        other => Err(ValidationError::WrongType {
            field: String::from(field),
            found: other.kind(),
        }),
    }
}
