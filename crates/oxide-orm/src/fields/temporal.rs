//! Timestamp and datetime fields.
//!
//! Both are held as UTC instants and stored as `YYYY-MM-DD HH:MM:SS`; MySQL
//! sessions run at `+00:00`, so the text is UTC on both backends.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::ValidationError;
use crate::value::Value;

const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (read as UTC) or a bare
/// date (midnight UTC).
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Storage text of an instant.
#[must_use]
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(STORAGE_FORMAT).to_string()
}

/// Instants, unix seconds (integer or numeric text) and date text.
pub(super) fn coerce(field: &str, value: Value) -> Result<Value, ValidationError> {
    let malformed = |message: String| ValidationError::Malformed {
        field: String::from(field),
        message,
    };
    let from_unix = |secs: i64| {
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| malformed(format!("{secs} is not a representable unix time")))
    };
    let instant = match value {
        Value::Timestamp(t) => t,
        Value::Int(secs) => from_unix(secs)?,
        Value::Text(s) => match s.trim().parse::<i64>() {
            Ok(secs) => from_unix(secs)?,
            Err(_) => parse_timestamp(&s).ok_or_else(|| malformed(format!("'{s}' is not a date")))?,
        },
        other => {
            return Err(ValidationError::WrongType {
                field: String::from(field),
                found: other.kind(),
            })
        }
    };
    Ok(Value::Timestamp(instant))
}
