//! Integer and float fields.

use crate::error::ValidationError;
use crate::value::Value;

fn wrong_type(field: &str, value: &Value) -> ValidationError {
    ValidationError::WrongType {
        field: String::from(field),
        found: value.kind(),
    }
}

fn out_of_range(
    field: &str,
    value: impl ToString,
    min: impl ToString,
    max: impl ToString,
) -> ValidationError {
    ValidationError::OutOfRange {
        field: String::from(field),
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    }
}

/// Integers, booleans, integral floats and numeric text are accepted, then
/// checked against the effective `[min, max]`.
pub(super) fn coerce_integer(
    field: &str,
    min: i64,
    max: i64,
    value: Value,
) -> Result<Value, ValidationError> {
    integer_within(field, min, max, &value).map(Value::Int)
}

pub(super) fn integer_within(
    field: &str,
    min: i64,
    max: i64,
    value: &Value,
) -> Result<i64, ValidationError> {
    let n = match value {
        Value::Int(n) => *n,
        Value::Bool(b) => i64::from(*b),
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        Value::Float(v) if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 => {
            *v as i64
        }
        Value::Text(s) => s.trim().parse().map_err(|_| wrong_type(field, value))?,
        _ => return Err(wrong_type(field, value)),
    };
    if n < min || n > max {
        return Err(out_of_range(field, n, min, max));
    }
    Ok(n)
}

/// Finite numbers only; a missing bound is open on that side.
pub(super) fn coerce_float(
    field: &str,
    min: Option<f64>,
    max: Option<f64>,
    value: Value,
) -> Result<Value, ValidationError> {
    let v = match &value {
        Value::Float(v) => *v,
        #[allow(clippy::cast_precision_loss)]
        Value::Int(n) => *n as f64,
        Value::Text(s) => s.trim().parse().map_err(|_| wrong_type(field, &value))?,
        _ => return Err(wrong_type(field, &value)),
    };
    if !v.is_finite() {
        return Err(wrong_type(field, &value));
    }
    if min.is_some_and(|lo| v < lo) || max.is_some_and(|hi| v > hi) {
        let bound =
            |b: Option<f64>, open: &str| b.map_or_else(|| String::from(open), |b| b.to_string());
        return Err(out_of_range(field, v, bound(min, "-inf"), bound(max, "inf")));
    }
    Ok(Value::Float(v))
}
