//! Backend chosen at runtime from a connection URL.

use oxide_sql_core::gateway::{ColumnInfo, Connection, ExecResult, ForeignKeyInfo, IndexInfo};
use oxide_sql_core::{Dialect, DriverError, Row};
use tracing::info;

use crate::mysql::MySqlGateway;
use crate::sqlite::SqliteGateway;

/// Either backend behind one [`Connection`].
#[derive(Debug)]
pub enum AnyGateway {
    /// MySQL or MariaDB.
    MySql(MySqlGateway),
    /// SQLite.
    Sqlite(SqliteGateway),
}

/// Connects to the backend named by the URL scheme: `mysql:`, `mariadb:`
/// or `sqlite:`.
///
/// # Errors
///
/// Returns [`DriverError::Connection`] for an unknown scheme or a failed
/// connection.
pub async fn connect(url: &str) -> Result<AnyGateway, DriverError> {
    let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
    let gateway = match scheme.as_str() {
        "mysql" => MySqlGateway::connect(url).await.map(AnyGateway::MySql),
        "mariadb" => {
            let url = format!("mysql{}", &url[scheme.len()..]);
            MySqlGateway::connect(&url).await.map(AnyGateway::MySql)
        }
        "sqlite" => SqliteGateway::connect(url).await.map(AnyGateway::Sqlite),
        other => Err(DriverError::Connection(format!(
            "unsupported database scheme '{other}'"
        ))),
    }?;
    info!(dialect = gateway.dialect().name(), "Connected");
    Ok(gateway)
}

impl Connection for AnyGateway {
    fn dialect(&self) -> &dyn Dialect {
        match self {
            Self::MySql(db) => db.dialect(),
            Self::Sqlite(db) => db.dialect(),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        match self {
            Self::MySql(db) => db.execute(sql).await,
            Self::Sqlite(db) => db.execute(sql).await,
        }
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, DriverError> {
        match self {
            Self::MySql(db) => db.fetch_all(sql).await,
            Self::Sqlite(db) => db.fetch_all(sql).await,
        }
    }

    async fn describe(&mut self, table: &str) -> Result<Option<Vec<ColumnInfo>>, DriverError> {
        match self {
            Self::MySql(db) => db.describe(table).await,
            Self::Sqlite(db) => db.describe(table).await,
        }
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<IndexInfo>, DriverError> {
        match self {
            Self::MySql(db) => db.keys(table).await,
            Self::Sqlite(db) => db.keys(table).await,
        }
    }

    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>, DriverError> {
        match self {
            Self::MySql(db) => db.foreign_keys(table).await,
            Self::Sqlite(db) => db.foreign_keys(table).await,
        }
    }

    fn insert_id(&self) -> Option<u64> {
        match self {
            Self::MySql(db) => db.insert_id(),
            Self::Sqlite(db) => db.insert_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_sqlite() {
        let mut db = connect("sqlite::memory:").await.unwrap();
        assert_eq!(db.dialect().name(), "sqlite");
        db.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        assert!(db.describe("t").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let err = connect("postgres://localhost/db").await.unwrap_err();
        assert!(matches!(err, DriverError::Connection(msg) if msg.contains("postgres")));
    }
}
