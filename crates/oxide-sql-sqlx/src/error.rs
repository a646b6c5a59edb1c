//! Translation of `sqlx` failures into [`DriverError`].

use oxide_sql_core::DriverError;

/// Backend-specific reading of a database error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mismatch {
    Table,
    Column,
}

/// MySQL reports missing objects through SQLSTATE `42S02` and `42S22`.
pub(crate) fn mysql_mismatch(code: Option<&str>, _message: &str) -> Option<Mismatch> {
    match code? {
        "42S02" => Some(Mismatch::Table),
        "42S22" => Some(Mismatch::Column),
        _ => None,
    }
}

/// SQLite only reports a generic code, so the message is the signal.
pub(crate) fn sqlite_mismatch(_code: Option<&str>, message: &str) -> Option<Mismatch> {
    if message.starts_with("no such table") {
        Some(Mismatch::Table)
    } else if message.starts_with("no such column") || message.contains("has no column named") {
        Some(Mismatch::Column)
    } else {
        None
    }
}

/// Classifies `err`, raised while running `sql`.
pub(crate) fn translate(
    err: sqlx::Error,
    sql: &str,
    classify: fn(Option<&str>, &str) -> Option<Mismatch>,
) -> DriverError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned());
            let message = db.message().to_string();
            match classify(code.as_deref(), &message) {
                Some(Mismatch::Table) => DriverError::MissingTable {
                    message,
                    sql: String::from(sql),
                },
                Some(Mismatch::Column) => DriverError::MissingColumn {
                    message,
                    sql: String::from(sql),
                },
                None => DriverError::Backend {
                    code,
                    message,
                    sql: String::from(sql),
                },
            }
        }
        other => DriverError::Backend {
            code: None,
            message: other.to_string(),
            sql: String::from(sql),
        },
    }
}

pub(crate) fn decode_error(column: &str, err: impl std::fmt::Display) -> DriverError {
    DriverError::Decode {
        column: String::from(column),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_codes() {
        assert_eq!(
            mysql_mismatch(Some("42S02"), "Table 'db.w' doesn't exist"),
            Some(Mismatch::Table)
        );
        assert_eq!(
            mysql_mismatch(Some("42S22"), "Unknown column 'sku'"),
            Some(Mismatch::Column)
        );
        assert_eq!(mysql_mismatch(Some("23000"), "Duplicate entry"), None);
        assert_eq!(mysql_mismatch(None, "gone away"), None);
    }

    #[test]
    fn test_sqlite_messages() {
        assert_eq!(
            sqlite_mismatch(Some("1"), "no such table: w"),
            Some(Mismatch::Table)
        );
        assert_eq!(
            sqlite_mismatch(Some("1"), "no such column: sku"),
            Some(Mismatch::Column)
        );
        assert_eq!(
            sqlite_mismatch(Some("1"), "table w has no column named sku"),
            Some(Mismatch::Column)
        );
        assert_eq!(
            sqlite_mismatch(Some("2067"), "UNIQUE constraint failed: w.name"),
            None
        );
    }

    #[test]
    fn test_translate_non_database_error() {
        let err = translate(sqlx::Error::RowNotFound, "SELECT 1", sqlite_mismatch);
        assert!(matches!(err, DriverError::Backend { code: None, .. }));
        assert_eq!(err.sql(), Some("SELECT 1"));
    }
}
