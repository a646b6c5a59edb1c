//! MySQL / MariaDB gateway.
//!
//! Statements run over the text protocol (`sqlx::raw_sql`), so every value
//! arrives as text and is decoded by the column's declared type.

use std::str::FromStr;
use std::sync::LazyLock;

use oxide_sql_core::gateway::{ColumnInfo, Connection, ExecResult, ForeignKeyInfo, IndexInfo};
use oxide_sql_core::schema::ForeignKeyAction;
use oxide_sql_core::{Dialect, DriverError, MySqlDialect, Row, SqlValue};
use regex::Regex;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column as _, ConnectOptions as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use crate::error::{decode_error, mysql_mismatch, translate};

static FOREIGN_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"CONSTRAINT `((?:[^`]|``)+)` FOREIGN KEY \(`((?:[^`]|``)+)`\) REFERENCES `((?:[^`]|``)+)` \([^)]*\)([A-Z ]*)",
    )
    .unwrap_or_else(|e| unreachable!("foreign key pattern: {e}"))
});

static ON_DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ON DELETE (CASCADE|SET NULL|SET DEFAULT|RESTRICT|NO ACTION)")
        .unwrap_or_else(|e| unreachable!("on delete pattern: {e}"))
});

/// A single MySQL connection, in `utf8mb4` with a UTC session time zone.
#[derive(Debug)]
pub struct MySqlGateway {
    conn: MySqlConnection,
    dialect: MySqlDialect,
    last_insert_id: Option<u64>,
}

impl MySqlGateway {
    /// Opens a connection from a `mysql://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Connection`] when the URL is invalid or the
    /// server refuses the connection.
    pub async fn connect(url: &str) -> Result<Self, DriverError> {
        let options = MySqlConnectOptions::from_str(url)
            .map_err(|e| DriverError::Connection(e.to_string()))?
            .charset("utf8mb4")
            .timezone(Some(String::from("+00:00")));
        let conn = options
            .connect()
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: MySqlConnection) -> Self {
        Self {
            conn,
            dialect: MySqlDialect,
            last_insert_id: None,
        }
    }

    /// The underlying `sqlx` connection.
    pub fn inner_mut(&mut self) -> &mut MySqlConnection {
        &mut self.conn
    }
}

fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    let upper = type_name.to_ascii_uppercase();
    Ok(if upper == "BOOLEAN" {
        SqlValue::Bool(row.try_get_unchecked::<bool, _>(index)?)
    } else if upper.contains("INT") && upper.contains("UNSIGNED") {
        let value = row.try_get_unchecked::<u64, _>(index)?;
        SqlValue::Int(i64::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))?)
    } else if upper.contains("INT") || upper == "YEAR" {
        SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?)
    } else if upper == "FLOAT" || upper == "DOUBLE" {
        SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?)
    } else if upper.contains("BINARY") || upper.contains("BLOB") || upper == "BIT" {
        SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?)
    } else {
        // Text, DECIMAL, JSON and the temporal types: the text protocol
        // already gives `YYYY-MM-DD HH:MM:SS` in the session time zone.
        SqlValue::Text(row.try_get_unchecked::<String, _>(index)?)
    })
}

fn decode_row(row: &MySqlRow) -> Result<Row, DriverError> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(index).map_err(|e| decode_error(name, e))?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            decode_value(row, index, column.type_info().name())
                .map_err(|e| decode_error(name, e))?
        };
        out.push(name, value);
    }
    Ok(out)
}

/// Foreign keys declared in a `SHOW CREATE TABLE` statement.
pub(crate) fn parse_foreign_keys(create_table: &str) -> Vec<ForeignKeyInfo> {
    FOREIGN_KEY
        .captures_iter(create_table)
        .map(|caps| {
            let actions = caps.get(4).map_or("", |m| m.as_str());
            let on_delete = ON_DELETE
                .captures(actions)
                .and_then(|c| c.get(1))
                .map_or(ForeignKeyAction::Restrict, |m| {
                    ForeignKeyAction::parse(m.as_str())
                });
            ForeignKeyInfo {
                name: Some(caps[1].replace("``", "`")),
                column: caps[2].replace("``", "`"),
                references: caps[3].replace("``", "`"),
                on_delete,
            }
        })
        .collect()
}

impl Connection for MySqlGateway {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::raw_sql(sql)
            .execute(&mut self.conn)
            .await
            .map_err(|e| translate(e, sql, mysql_mismatch))?;
        let last_insert_id = Some(result.last_insert_id()).filter(|id| *id > 0);
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
            .map_err(|e| translate(e, sql, mysql_mismatch))?;
        rows.iter().map(decode_row).collect()
    }

    async fn describe(&mut self, table: &str) -> Result<Option<Vec<ColumnInfo>>, DriverError> {
        let sql = format!("SHOW COLUMNS FROM {}", self.dialect.quote_identifier(table));
        let rows = match self.fetch_all(&sql).await {
            Ok(rows) => rows,
            Err(DriverError::MissingTable { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(
            rows.iter()
                .map(|row| ColumnInfo {
                    name: row.text("Field").unwrap_or_default(),
                    sql_type: row.text("Type").unwrap_or_default(),
                    nullable: row.text("Null").as_deref() == Some("YES"),
                })
                .collect(),
        ))
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<IndexInfo>, DriverError> {
        let sql = format!(
            "SHOW KEYS FROM {} WHERE Key_name <> 'PRIMARY'",
            self.dialect.quote_identifier(table)
        );
        let rows = self.fetch_all(&sql).await?;
        let mut keys: Vec<(IndexInfo, Vec<(i64, String)>)> = Vec::new();
        for row in rows {
            let name = row.text("Key_name").unwrap_or_default();
            let seq = row.get("Seq_in_index").and_then(SqlValue::as_i64).unwrap_or(0);
            let column = row.text("Column_name").unwrap_or_default();
            let unique = row.get("Non_unique").and_then(SqlValue::as_i64) == Some(0);
            match keys.iter_mut().find(|(info, _)| info.name == name) {
                Some((_, columns)) => columns.push((seq, column)),
                None => keys.push((
                    IndexInfo {
                        name,
                        unique,
                        columns: Vec::new(),
                    },
                    vec![(seq, column)],
                )),
            }
        }
        Ok(keys
            .into_iter()
            .map(|(mut info, mut columns)| {
                columns.sort_by_key(|(seq, _)| *seq);
                info.columns = columns.into_iter().map(|(_, c)| c).collect();
                info
            })
            .collect())
    }

    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>, DriverError> {
        let sql = format!("SHOW CREATE TABLE {}", self.dialect.quote_identifier(table));
        let row = self.fetch_optional(&sql).await?;
        let create = row
            .as_ref()
            .and_then(|r| r.text("Create Table").or_else(|| r.get_index(1).and_then(SqlValue::to_text)))
            .unwrap_or_default();
        Ok(parse_foreign_keys(&create))
    }

    fn insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE: &str = "CREATE TABLE `app_Doc` (\n  \
        `id` int unsigned NOT NULL AUTO_INCREMENT,\n  \
        `owner` int unsigned NOT NULL,\n  \
        `parent` int unsigned DEFAULT NULL,\n  \
        `editor` int unsigned NOT NULL,\n  \
        PRIMARY KEY (`id`),\n  \
        KEY `owner` (`owner`),\n  \
        CONSTRAINT `app_Doc-owner` FOREIGN KEY (`owner`) REFERENCES `app_User` (`id`) ON DELETE CASCADE ON UPDATE CASCADE,\n  \
        CONSTRAINT `app_Doc-parent` FOREIGN KEY (`parent`) REFERENCES `app_Doc` (`id`) ON DELETE SET NULL ON UPDATE CASCADE,\n  \
        CONSTRAINT `app_Doc-editor` FOREIGN KEY (`editor`) REFERENCES `app_User` (`id`) ON UPDATE CASCADE\n\
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

    #[test]
    fn test_parse_foreign_keys() {
        let fks = parse_foreign_keys(CREATE);
        assert_eq!(
            fks,
            vec![
                ForeignKeyInfo {
                    name: Some(String::from("app_Doc-owner")),
                    column: String::from("owner"),
                    references: String::from("app_User"),
                    on_delete: ForeignKeyAction::Cascade,
                },
                ForeignKeyInfo {
                    name: Some(String::from("app_Doc-parent")),
                    column: String::from("parent"),
                    references: String::from("app_Doc"),
                    on_delete: ForeignKeyAction::SetNull,
                },
                ForeignKeyInfo {
                    name: Some(String::from("app_Doc-editor")),
                    column: String::from("editor"),
                    references: String::from("app_User"),
                    on_delete: ForeignKeyAction::Restrict,
                },
            ]
        );
    }

    #[test]
    fn test_parse_without_constraints() {
        assert!(parse_foreign_keys("CREATE TABLE `t` (`id` int) ENGINE=InnoDB").is_empty());
    }
}
