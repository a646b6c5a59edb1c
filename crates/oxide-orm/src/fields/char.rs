//! Text and binary fields.

use crate::error::ValidationError;
use crate::value::Value;

/// Scalars are stringified; length is counted in characters.
pub(super) fn coerce_text(
    field: &str,
    max_length: Option<usize>,
    value: Value,
) -> Result<Value, ValidationError> {
    let text = match value {
        Value::Text(s) | Value::Xml(s) => s,
        Value::Int(n) => n.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Bool(b) => String::from(if b { "1" } else { "0" }),
        other => {
            return Err(ValidationError::WrongType {
                field: String::from(field),
                found: other.kind(),
            })
        }
    };
    check_length(field, max_length, &text)?;
    Ok(Value::Text(text))
}

pub(super) fn check_length(
    field: &str,
    max_length: Option<usize>,
    text: &str,
) -> Result<(), ValidationError> {
    match max_length {
        Some(max) if text.chars().count() > max => Err(ValidationError::TooLong {
            field: String::from(field),
            max,
            unit: "characters",
        }),
        _ => Ok(()),
    }
}

/// Bytes as they are, or text as hex digits.
pub(super) fn coerce_binary(
    field: &str,
    length: usize,
    value: Value,
) -> Result<Value, ValidationError> {
    let bytes = match value {
        Value::Binary(b) => b,
        Value::Text(s) => decode_hex(&s).ok_or_else(|| ValidationError::Malformed {
            field: String::from(field),
            message: String::from("expected hexadecimal digits"),
        })?,
        other => {
            return Err(ValidationError::WrongType {
                field: String::from(field),
                found: other.kind(),
            })
        }
    };
    if bytes.len() > length {
        return Err(ValidationError::TooLong {
            field: String::from(field),
            max: length,
            unit: "bytes",
        });
    }
    Ok(Value::Binary(bytes))
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
