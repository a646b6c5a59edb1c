//! SQLite gateway.

use std::str::FromStr;

use oxide_sql_core::gateway::{ColumnInfo, Connection, ExecResult, ForeignKeyInfo, IndexInfo};
use oxide_sql_core::schema::ForeignKeyAction;
use oxide_sql_core::{Dialect, DriverError, Row, SqlValue, SqliteDialect};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column as _, ConnectOptions as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use crate::error::{decode_error, sqlite_mismatch, translate};

/// A single SQLite connection.
///
/// Foreign keys are enforced. Use `sqlite::memory:` for a throwaway
/// database.
#[derive(Debug)]
pub struct SqliteGateway {
    conn: SqliteConnection,
    dialect: SqliteDialect,
    last_insert_id: Option<u64>,
}

impl SqliteGateway {
    /// Opens a connection from a `sqlite:` URL.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Connection`] when the URL is invalid or the
    /// database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self, DriverError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DriverError::Connection(e.to_string()))?
            .foreign_keys(true)
            .create_if_missing(true);
        let conn = options
            .connect()
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// See [`SqliteGateway::connect`].
    pub async fn in_memory() -> Result<Self, DriverError> {
        Self::connect("sqlite::memory:").await
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self {
            conn,
            dialect: SqliteDialect,
            last_insert_id: None,
        }
    }

    /// The underlying `sqlx` connection.
    pub fn inner_mut(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    async fn pragma(&mut self, pragma: &str, table: &str) -> Result<Vec<Row>, DriverError> {
        let sql = format!("PRAGMA {pragma}({})", self.dialect.quote_identifier(table));
        self.fetch_all(&sql).await
    }
}

/// Decodes by the storage class of each value; SQLite columns carry no
/// reliable declared type.
fn decode_row(row: &SqliteRow) -> Result<Row, DriverError> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(index).map_err(|e| decode_error(name, e))?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let class = raw.type_info().name().to_ascii_uppercase();
            let decoded = match class.as_str() {
                "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index).map(SqlValue::Int),
                "REAL" => row.try_get_unchecked::<f64, _>(index).map(SqlValue::Float),
                "BLOB" => row
                    .try_get_unchecked::<Vec<u8>, _>(index)
                    .map(SqlValue::Blob),
                _ => row
                    .try_get_unchecked::<String, _>(index)
                    .map(SqlValue::Text),
            };
            decoded.map_err(|e| decode_error(name, e))?
        };
        out.push(name, value);
    }
    Ok(out)
}

impl Connection for SqliteGateway {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::raw_sql(sql)
            .execute(&mut self.conn)
            .await
            .map_err(|e| translate(e, sql, sqlite_mismatch))?;
        let last_insert_id = u64::try_from(result.last_insert_rowid())
            .ok()
            .filter(|id| *id > 0);
        if last_insert_id.is_some() {
            self.last_insert_id = last_insert_id;
        }
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id,
        })
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, DriverError> {
        debug!(sql = %sql, "Fetching rows");
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| translate(e, sql, sqlite_mismatch))?;
        rows.iter().map(decode_row).collect()
    }

    async fn describe(&mut self, table: &str) -> Result<Option<Vec<ColumnInfo>>, DriverError> {
        let rows = self.pragma("table_info", table).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let columns = rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.text("name").unwrap_or_default(),
                sql_type: row.text("type").unwrap_or_default(),
                nullable: row.get("notnull").and_then(SqlValue::as_i64) == Some(0),
            })
            .collect();
        Ok(Some(columns))
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<IndexInfo>, DriverError> {
        let list = self.pragma("index_list", table).await?;
        let mut keys = Vec::new();
        for entry in list {
            // Only indexes created by CREATE INDEX; `u` and `pk` ones belong
            // to constraints in the table definition.
            if entry.text("origin").as_deref() != Some("c") {
                continue;
            }
            let Some(name) = entry.text("name") else {
                continue;
            };
            let mut info = self.pragma("index_info", &name).await?;
            info.sort_by_key(|row| row.get("seqno").and_then(SqlValue::as_i64));
            keys.push(IndexInfo {
                unique: entry.get("unique").and_then(SqlValue::as_i64) == Some(1),
                columns: info.iter().filter_map(|row| row.text("name")).collect(),
                name,
            });
        }
        Ok(keys)
    }

    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>, DriverError> {
        let rows = self.pragma("foreign_key_list", table).await?;
        Ok(rows
            .iter()
            .map(|row| ForeignKeyInfo {
                name: None,
                column: row.text("from").unwrap_or_default(),
                references: row.text("table").unwrap_or_default(),
                on_delete: ForeignKeyAction::parse(&row.text("on_delete").unwrap_or_default()),
            })
            .collect())
    }

    fn insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn gateway() -> SqliteGateway {
        SqliteGateway::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_execute_and_fetch() {
        let mut db = gateway().await;
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, score REAL, data BLOB)")
            .await
            .unwrap();
        let result = db
            .execute("INSERT INTO t (name, score, data) VALUES ('a', 1.5, X'00FF')")
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, Some(1));
        assert_eq!(db.insert_id(), Some(1));

        let rows = db.fetch_all("SELECT id, name, score, data, NULL AS empty FROM t").await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("id"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("name"), Some(&SqlValue::Text(String::from("a"))));
        assert_eq!(row.get("score"), Some(&SqlValue::Float(1.5)));
        assert_eq!(row.get("data"), Some(&SqlValue::Blob(vec![0x00, 0xFF])));
        assert_eq!(row.get("empty"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_missing_table_and_column() {
        let mut db = gateway().await;
        let err = db.fetch_all("SELECT * FROM nope").await.unwrap_err();
        assert!(matches!(err, DriverError::MissingTable { .. }));

        db.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        let err = db.fetch_all("SELECT sku FROM t").await.unwrap_err();
        assert!(matches!(err, DriverError::MissingColumn { .. }));
        let err = db.execute("INSERT INTO t (sku) VALUES (1)").await.unwrap_err();
        assert!(matches!(err, DriverError::MissingColumn { .. }));
    }

    #[tokio::test]
    async fn test_backend_error_keeps_statement() {
        let mut db = gateway().await;
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").await.unwrap();
        db.execute("INSERT INTO t (id) VALUES (1)").await.unwrap();
        let err = db.execute("INSERT INTO t (id) VALUES (1)").await.unwrap_err();
        assert!(!err.is_schema_mismatch());
        assert_eq!(err.sql(), Some("INSERT INTO t (id) VALUES (1)"));
    }

    #[tokio::test]
    async fn test_introspection() {
        let mut db = gateway().await;
        assert_eq!(db.describe("p").await.unwrap(), None);
        db.execute("CREATE TABLE p (id INTEGER PRIMARY KEY AUTOINCREMENT)").await.unwrap();
        db.execute(
            "CREATE TABLE c (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             slug TEXT NOT NULL, \
             parent INTEGER REFERENCES p (id) ON DELETE CASCADE ON UPDATE CASCADE)",
        )
        .await
        .unwrap();
        db.execute("CREATE UNIQUE INDEX \"c:slug\" ON c (slug, parent)").await.unwrap();

        let columns = db.describe("c").await.unwrap().unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "slug", "parent"]);
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);

        let keys = db.keys("c").await.unwrap();
        assert_eq!(
            keys,
            vec![IndexInfo {
                name: String::from("c:slug"),
                unique: true,
                columns: vec![String::from("slug"), String::from("parent")],
            }]
        );

        let fks = db.foreign_keys("c").await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].column, "parent");
        assert_eq!(fks[0].references, "p");
        assert_eq!(fks[0].on_delete, ForeignKeyAction::Cascade);
    }

    #[tokio::test]
    async fn test_transactions() {
        let mut db = gateway().await;
        db.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        db.begin().await.unwrap();
        db.execute("INSERT INTO t (id) VALUES (1)").await.unwrap();
        db.rollback().await.unwrap();
        assert!(db.fetch_all("SELECT * FROM t").await.unwrap().is_empty());

        db.begin().await.unwrap();
        db.execute("INSERT INTO t (id) VALUES (2)").await.unwrap();
        db.commit().await.unwrap();
        assert_eq!(db.fetch_all("SELECT * FROM t").await.unwrap().len(), 1);
    }
}
