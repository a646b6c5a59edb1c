//! Connection gateway contract.
//!
//! Driver crates (oxide-sql-sqlx) implement [`Connection`] on top of a live
//! database connection. The core crate defines only the trait and the plain
//! data it exchanges, so it stays driver-agnostic.

use thiserror::Error;

use crate::dialect::Dialect;
use crate::schema::ForeignKeyAction;
use crate::value::SqlValue;

/// Failure reported by a driver, already classified.
///
/// `MissingTable` and `MissingColumn` are schema mismatches that the entity
/// runtime recovers from by migrating; everything else is fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The statement referenced a table that does not exist.
    #[error("missing table: {message}")]
    MissingTable {
        /// Backend message.
        message: String,
        /// The failing statement.
        sql: String,
    },

    /// The statement referenced a column that does not exist.
    #[error("missing column: {message}")]
    MissingColumn {
        /// Backend message.
        message: String,
        /// The failing statement.
        sql: String,
    },

    /// Any other backend failure.
    #[error("database error {}: {message} (statement: {sql})", .code.as_deref().unwrap_or("-"))]
    Backend {
        /// Backend error code, when reported.
        code: Option<String>,
        /// Backend message.
        message: String,
        /// The failing statement.
        sql: String,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A column value could not be decoded.
    #[error("cannot decode column '{column}': {message}")]
    Decode {
        /// Column name.
        column: String,
        /// What went wrong.
        message: String,
    },
}

impl DriverError {
    /// Whether this is a missing table or missing column failure.
    #[must_use]
    pub const fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::MissingTable { .. } | Self::MissingColumn { .. })
    }

    /// The failing statement, when known.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::MissingTable { sql, .. }
            | Self::MissingColumn { sql, .. }
            | Self::Backend { sql, .. } => Some(sql),
            Self::Connection(_) | Self::Decode { .. } => None,
        }
    }

    /// The backend error code, when known.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed.
    pub rows_affected: u64,
    /// Id generated by an `INSERT`, when any.
    pub last_insert_id: Option<u64>,
}

/// One result row: column names with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    /// Appends a column, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Value of the first column called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Value at a position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    /// Text view of a column, see [`SqlValue::to_text`].
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(SqlValue::to_text)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// A live column, as reported by introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, as the backend prints it.
    pub sql_type: String,
    /// Whether the column accepts null.
    pub nullable: bool,
}

/// A live non-primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Key name.
    pub name: String,
    /// Whether the key is unique.
    pub unique: bool,
    /// Columns in key order.
    pub columns: Vec<String>,
}

/// A live foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    /// Constraint name, when the backend names them.
    pub name: Option<String>,
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub references: String,
    /// `ON DELETE` action.
    pub on_delete: ForeignKeyAction,
}

/// A live database connection.
///
/// One logical connection, used by one task at a time through `&mut`.
/// Transactions are explicit: the gateway never opens one by itself.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Dialect spoken by this connection.
    fn dialect(&self) -> &dyn Dialect;

    /// Executes a statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError>;

    /// Executes a query and returns every row.
    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, DriverError>;

    /// Executes a query and returns its first row.
    async fn fetch_optional(&mut self, sql: &str) -> Result<Option<Row>, DriverError> {
        Ok(self.fetch_all(sql).await?.into_iter().next())
    }

    /// Columns of `table`, or `None` when the table does not exist.
    async fn describe(&mut self, table: &str) -> Result<Option<Vec<ColumnInfo>>, DriverError>;

    /// Non-primary keys of `table`.
    async fn keys(&mut self, table: &str) -> Result<Vec<IndexInfo>, DriverError>;

    /// Foreign keys of `table`.
    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>, DriverError>;

    /// Id generated by the most recent `INSERT` on this connection.
    fn insert_id(&self) -> Option<u64>;

    /// Opens a transaction.
    async fn begin(&mut self) -> Result<(), DriverError> {
        let sql = self.dialect().begin_transaction();
        self.execute(sql).await.map(|_| ())
    }

    /// Commits the open transaction.
    async fn commit(&mut self) -> Result<(), DriverError> {
        self.execute("COMMIT").await.map(|_| ())
    }

    /// Rolls back the open transaction.
    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.execute("ROLLBACK").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup() {
        let row = Row::new()
            .with("id", 1_i64)
            .with("name", "bolt")
            .with("Type", SqlValue::Blob(b"int unsigned".to_vec()));
        assert_eq!(row.get("id"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get_index(1), Some(&SqlValue::Text(String::from("bolt"))));
        assert_eq!(row.text("Type").as_deref(), Some("int unsigned"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_schema_mismatch_classification() {
        let missing = DriverError::MissingColumn {
            message: String::from("Unknown column 'sku'"),
            sql: String::from("SELECT sku FROM w"),
        };
        assert!(missing.is_schema_mismatch());
        assert_eq!(missing.sql(), Some("SELECT sku FROM w"));
        let other = DriverError::Backend {
            code: Some(String::from("23000")),
            message: String::from("Duplicate entry"),
            sql: String::from("INSERT"),
        };
        assert!(!other.is_schema_mismatch());
        assert_eq!(other.code(), Some("23000"));
        assert_eq!(
            other.to_string(),
            "database error 23000: Duplicate entry (statement: INSERT)"
        );
    }
}
