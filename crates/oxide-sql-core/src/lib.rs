//! # oxide-sql-core
//!
//! The dialect-aware foundation of the entity store.
//!
//! This crate provides:
//! - Field descriptors and table definitions, with narrowest-width integer
//!   storage and configuration decoding
//! - MySQL and SQLite dialects that escape identifiers and literals and
//!   synthesize the DDL used by migrations
//! - Query templates with symbolic table names and bound parameters
//! - Small statement builders that inline escaped literals
//! - The [`Connection`] contract drivers implement
//!
//! ## Schema synthesis
//!
//! ```rust
//! use oxide_sql_core::dialect::{Dialect, MySqlDialect};
//! use oxide_sql_core::schema::FieldDescriptor;
//!
//! let price = FieldDescriptor::integer("price").min(0).max(100_000);
//! assert_eq!(MySqlDialect.column_definition(&price), "`price` MEDIUMINT UNSIGNED NOT NULL");
//! ```
//!
//! ## SQL Injection Prevention
//!
//! Every bound value is escaped for the target dialect:
//!
//! ```rust
//! use oxide_sql_core::builder::Select;
//! use oxide_sql_core::dialect::SqliteDialect;
//!
//! let user_input = "'; DROP TABLE users; --";
//! let sql = Select::from("users")
//!     .columns(["id"])
//!     .filter("name", user_input)
//!     .render(&SqliteDialect)
//!     .unwrap();
//!
//! assert_eq!(sql, "SELECT \"id\" FROM \"users\" WHERE \"name\" = '''; DROP TABLE users; --'");
//! ```

pub mod builder;
pub mod dialect;
pub mod error;
pub mod gateway;
pub mod schema;
pub mod template;
pub mod value;

pub use builder::{Delete, Insert, Order, Select, Update};
pub use dialect::{Dialect, MySqlDialect, SqliteDialect};
pub use error::{EscapeError, SchemaError};
pub use gateway::{
    ColumnInfo, Connection, DriverError, ExecResult, ForeignKeyInfo, IndexInfo, Row,
};
pub use schema::{FieldDescriptor, FieldKind, FieldType, IndexDescriptor, TableDefinition};
pub use template::TableNames;
pub use value::{SqlValue, ToSqlValue};
