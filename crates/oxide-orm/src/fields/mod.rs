//! Per-type field semantics.
//!
//! Three conversions meet here:
//!
//! - [`coerce`]: what a setter accepts, with bounds checks
//! - [`decode`]: a stored column back into a [`Value`]
//! - [`encode`]: a [`Value`] into the literal written to the column
//!
//! A reference decodes to its raw id as [`Value::Int`]; the entity keeps it
//! deferred until the field is read.

mod boolean;
mod char;
mod document;
mod numeric;
mod relations;
mod temporal;

pub use boolean::parse_bool;
pub use document::check_xml;
pub use temporal::{format_timestamp, parse_timestamp};

use oxide_sql_core::{DriverError, FieldDescriptor, FieldKind, SqlValue};

use crate::error::{OrmError, ValidationError};
use crate::value::Value;

/// Converts an assigned value into the field's in-memory form.
///
/// Null is not handled here; the entity decides between null, the default
/// and an error.
///
/// # Errors
///
/// Returns the [`ValidationError`] describing why the value does not fit.
pub fn coerce(field: &FieldDescriptor, value: Value) -> Result<Value, ValidationError> {
    match &field.kind {
        FieldKind::Reference { target, .. } => relations::coerce(&field.name, target, value),
        FieldKind::Text { max_length } => char::coerce_text(&field.name, *max_length, value),
        FieldKind::Binary { length } => char::coerce_binary(&field.name, *length, value),
        FieldKind::Integer { .. } => {
            let (min, max) = field.integer_range().unwrap_or((i64::MIN, i64::MAX));
            numeric::coerce_integer(&field.name, min, max, value)
        }
        FieldKind::Float { min, max } => numeric::coerce_float(&field.name, *min, *max, value),
        FieldKind::Timestamp | FieldKind::DateTime => temporal::coerce(&field.name, value),
        FieldKind::Boolean => boolean::coerce(&field.name, value),
        FieldKind::Json => document::coerce_json(&field.name, value),
        FieldKind::Xml { max_length } => document::coerce_xml(&field.name, *max_length, value),
    }
}

/// Reads a primary key given as a lookup value: any integer the `id`
/// column can hold, or text that parses as one.
///
/// # Errors
///
/// Returns the [`ValidationError`] describing why the value is not an id.
pub fn coerce_id(value: &Value) -> Result<u64, ValidationError> {
    let id = numeric::integer_within("id", 1, i64::MAX, value)?;
    Ok(id.unsigned_abs())
}

/// Reads a stored column.
///
/// # Errors
///
/// Fails with [`DriverError::Decode`] when the stored text does not parse
/// as the field's type.
pub fn decode(field: &FieldDescriptor, raw: &SqlValue) -> Result<Value, DriverError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let bad = |message: String| DriverError::Decode {
        column: field.name.clone(),
        message,
    };
    let text = || raw.to_text().unwrap_or_default();
    Ok(match &field.kind {
        FieldKind::Reference { .. } => match raw.as_i64() {
            Some(0) => Value::Null,
            Some(id) => Value::Int(id),
            None => return Err(bad(format!("expected an id, got {raw}"))),
        },
        FieldKind::Text { .. } => Value::Text(text()),
        FieldKind::Xml { .. } => Value::Xml(text()),
        FieldKind::Binary { .. } => match raw {
            SqlValue::Blob(bytes) => Value::Binary(bytes.clone()),
            other => Value::Binary(other.to_text().unwrap_or_default().into_bytes()),
        },
        FieldKind::Integer { .. } => match raw {
            #[allow(clippy::cast_possible_truncation)]
            SqlValue::Float(v) => Value::Int(*v as i64),
            other => Value::Int(
                other
                    .as_i64()
                    .ok_or_else(|| bad(format!("expected an integer, got {other}")))?,
            ),
        },
        FieldKind::Float { .. } => match raw {
            SqlValue::Float(v) => Value::Float(*v),
            other => Value::Float(
                text()
                    .trim()
                    .parse()
                    .map_err(|_| bad(format!("expected a number, got {other}")))?,
            ),
        },
        FieldKind::Boolean => match raw.as_i64() {
            Some(n) => Value::Bool(n != 0),
            None => Value::Bool(parse_bool(&text())),
        },
        FieldKind::Timestamp | FieldKind::DateTime => Value::Timestamp(
            parse_timestamp(&text()).ok_or_else(|| bad(format!("bad timestamp {raw}")))?,
        ),
        FieldKind::Json => {
            Value::Json(serde_json::from_str(&text()).map_err(|e| bad(e.to_string()))?)
        }
    })
}

/// Renders a value for its column.
///
/// # Errors
///
/// Fails when a referenced entity has not been saved yet, or a JSON
/// document cannot be serialized.
pub fn encode(field: &FieldDescriptor, value: &Value) -> Result<SqlValue, OrmError> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Int(n) => SqlValue::Int(*n),
        Value::Float(v) => SqlValue::Float(*v),
        Value::Text(s) | Value::Xml(s) => SqlValue::Text(s.clone()),
        Value::Binary(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(t) => SqlValue::Text(format_timestamp(t)),
        Value::Json(v) => SqlValue::Text(serde_json::to_string(v)?),
        Value::Entity(e) => {
            let id = e.id().ok_or_else(|| {
                OrmError::Configuration(format!(
                    "field '{}' references an unsaved {}",
                    field.name,
                    e.type_name()
                ))
            })?;
            SqlValue::Int(i64::try_from(id).unwrap_or(i64::MAX))
        }
    })
}
