//! Error log sink.
//!
//! Records are stored as JSON in the internal `[[*errorLog]]` table. After
//! every insert the table is pruned to the newest `max-log-entries` rows.

use chrono::{DateTime, Utc};
use oxide_sql_core::{Connection, Delete, FieldDescriptor, Insert, Order, Select, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{OrmError, Result};
use crate::fields::parse_timestamp;
use crate::store::Store;

/// Logical name of the error log table.
pub const ERROR_LOG_TABLE: &str = "*errorLog";

/// Setting holding how many records survive pruning.
pub const MAX_LOG_ENTRIES: &str = "max-log-entries";

/// Definition of the error log table.
#[must_use]
pub fn errorlog_table() -> TableDefinition {
    TableDefinition::new(ERROR_LOG_TABLE).field(FieldDescriptor::text("content"))
}

/// A structured error report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, JsonValue>,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            location: None,
            causes: Vec::new(),
            context: Map::new(),
        }
    }

    /// Builds a record from an error and its source chain.
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut record = Self::new(error.to_string());
        let mut source = error.source();
        while let Some(cause) = source {
            record.causes.push(cause.to_string());
            source = cause.source();
        }
        record
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attaches a context entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl From<&OrmError> for ErrorRecord {
    fn from(error: &OrmError) -> Self {
        let kind = match error {
            OrmError::SchemaMismatch { .. } => "schema-mismatch",
            OrmError::Driver(_) => "driver",
            OrmError::NotFound { .. } => "not-found",
            OrmError::Validation(_) => "validation",
            OrmError::AccessDenied { .. } => "access-denied",
            OrmError::Configuration(_) | OrmError::Schema(_) => "configuration",
            OrmError::Escape(_) => "escape",
            OrmError::Json(_) => "json",
            OrmError::Io(_) => "io",
        };
        Self::from_error(error).kind(kind)
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedError {
    pub id: u64,
    pub record: ErrorRecord,
    pub added: Option<DateTime<Utc>>,
}

impl<C: Connection> Store<C> {
    /// Stores a record and prunes the log. Returns the new record's id.
    ///
    /// # Errors
    ///
    /// Fails when the log or settings table cannot be written.
    pub async fn log_error(&mut self, record: &ErrorRecord) -> Result<u64> {
        let table = self.names().physical(ERROR_LOG_TABLE);
        let content = serde_json::to_string(record)?;
        let sql = Insert::into(table.as_str())
            .value("content", content)
            .render(self.dialect())?;
        let result = self.execute_recovering(&[errorlog_table()], &sql).await?;
        let id = result.last_insert_id.or_else(|| self.insert_id()).unwrap_or(0);

        let keep = self.setting_within(MAX_LOG_ENTRIES, 100_i64, 5, i64::MAX).await?;
        let sql = Select::from(table.as_str())
            .columns(["id"])
            .order_by("id", Order::Desc)
            .limit(1)
            .offset(u64::try_from(keep).unwrap_or(u64::MAX))
            .render(self.dialect())?;
        let cutoff = self
            .connection()
            .fetch_optional(&sql)
            .await?
            .and_then(|row| row.get("id").and_then(oxide_sql_core::SqlValue::as_i64));
        if let Some(cutoff) = cutoff {
            let sql = Delete::from(table)
                .filter_at_most("id", cutoff)
                .render(self.dialect())?;
            let pruned = self.connection().execute(&sql).await?;
            debug!(cutoff, rows = pruned.rows_affected, "Pruned error log");
        }
        Ok(id)
    }

    /// The newest `limit` records, newest first.
    ///
    /// # Errors
    ///
    /// Fails when the log table cannot be read.
    pub async fn recent_errors(&mut self, limit: u64) -> Result<Vec<LoggedError>> {
        let sql = Select::from(self.names().physical(ERROR_LOG_TABLE))
            .columns(["id", "content", "added"])
            .order_by("id", Order::Desc)
            .limit(limit)
            .render(self.dialect())?;
        let rows = self.fetch_recovering(&[errorlog_table()], &sql).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let content = row.text("content").unwrap_or_default();
                LoggedError {
                    id: row
                        .get("id")
                        .and_then(oxide_sql_core::SqlValue::as_i64)
                        .and_then(|id| u64::try_from(id).ok())
                        .unwrap_or(0),
                    record: serde_json::from_str(&content)
                        .unwrap_or_else(|_| ErrorRecord::new(content)),
                    added: row.text("added").as_deref().and_then(parse_timestamp),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_record_serializes_sparse() {
        let record = ErrorRecord::new("boom");
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"message":"boom"}"#);

        let record = ErrorRecord::new("boom")
            .kind("driver")
            .with("table", "widget");
        let json: JsonValue = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "driver");
        assert_eq!(json["context"]["table"], "widget");
    }

    #[test]
    fn test_from_orm_error() {
        let error = OrmError::from(ValidationError::EmptyName);
        let record = ErrorRecord::from(&error);
        assert_eq!(record.kind.as_deref(), Some("validation"));
        assert_eq!(record.message, error.to_string());
    }

    #[test]
    fn test_from_error_collects_causes() {
        let io = std::io::Error::other("disk full");
        let error = OrmError::from(io);
        let record = ErrorRecord::from_error(&error);
        assert_eq!(record.message, "IO error: disk full");
        assert_eq!(record.causes, vec![String::from("disk full")]);
    }
}
