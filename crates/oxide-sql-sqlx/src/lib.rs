//! # oxide-sql-sqlx
//!
//! [`Connection`](oxide_sql_core::Connection) gateways for `oxide-sql-core`,
//! built on [sqlx].
//!
//! # How the backends differ
//!
//! - **MySQL** is the production backend. Statements run over the text
//!   protocol, values are decoded by declared column type, and missing
//!   tables or columns are recognised by SQLSTATE (`42S02`, `42S22`).
//!   Introspection reads `SHOW COLUMNS`, `SHOW KEYS` and
//!   `SHOW CREATE TABLE`.
//! - **SQLite** is the embedded backend, mostly used in memory for tests.
//!   Foreign keys are switched on for every connection. Values are decoded
//!   by storage class, missing objects are recognised by message, and
//!   introspection reads the `table_info`, `index_list`, `index_info` and
//!   `foreign_key_list` pragmas. Only explicitly created indexes are
//!   reported as keys.
//!
//! [sqlx]: https://docs.rs/sqlx
//!
//! ## Example
//!
//! ```rust,no_run
//! use oxide_sql_core::Connection;
//!
//! # async fn run() -> Result<(), oxide_sql_core::DriverError> {
//! let mut db = oxide_sql_sqlx::connect("sqlite::memory:").await?;
//! db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").await?;
//! let columns = db.describe("t").await?;
//! assert!(columns.is_some());
//! # Ok(())
//! # }
//! ```

mod any;
mod error;
mod mysql;
mod sqlite;

pub use any::{connect, AnyGateway};
pub use mysql::MySqlGateway;
pub use sqlite::SqliteGateway;
