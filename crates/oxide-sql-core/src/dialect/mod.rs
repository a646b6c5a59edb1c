//! SQL Dialect support.
//!
//! A dialect knows how to quote identifiers, escape literals and turn
//! schema declarations into DDL for one backend. MySQL is the production
//! dialect; SQLite is the embedded one.

mod mysql;
mod sqlite;

use std::fmt;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use crate::error::EscapeError;
use crate::gateway::{ForeignKeyInfo, IndexInfo};
use crate::schema::{FieldDescriptor, KeyPlan, TableDefinition};
use crate::value::SqlValue;

/// Where a column added to an existing table goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnAnchor {
    /// Before every other column.
    First,
    /// Right after the named column.
    After(String),
}

/// A declared field absent from the live table.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingColumn<'a> {
    /// The declaration.
    pub field: &'a FieldDescriptor,
    /// Its declared predecessor.
    pub anchor: ColumnAnchor,
}

/// Trait for SQL dialect-specific behavior.
///
/// Table and column names passed in are physical and unquoted.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char;

    /// Quotes an identifier, doubling any embedded quote character.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let mut out = String::with_capacity(name.len() + 2);
        out.push(quote);
        for c in name.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    /// Escapes the body of a string literal (without the quotes).
    fn escape_string(&self, value: &str) -> String;

    /// Renders a value as a literal.
    ///
    /// # Errors
    ///
    /// Non-finite floats have no literal form.
    fn escape_literal(&self, value: &SqlValue) -> Result<String, EscapeError> {
        Ok(match value {
            SqlValue::Null => String::from("NULL"),
            SqlValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(f) if f.is_finite() => format!("{f:?}"),
            SqlValue::Float(f) => return Err(EscapeError::NonFiniteFloat(*f)),
            SqlValue::Text(s) => format!("'{}'", self.escape_string(s)),
            SqlValue::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        })
    }

    /// Column type fragment for a field, e.g. `VARCHAR(32) ...`.
    fn column_type(&self, field: &FieldDescriptor) -> String;

    /// Full column definition: quoted name, type and nullability.
    fn column_definition(&self, field: &FieldDescriptor) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&field.name),
            self.column_type(field)
        );
        if !field.nullable {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    /// Statements creating `table` with its primary key, declared columns
    /// and timestamp columns. Keys from `plan` are added separately through
    /// [`Dialect::add_keys`].
    fn create_table(&self, table: &str, definition: &TableDefinition, plan: &KeyPlan)
        -> Vec<String>;

    /// Statements adding the missing columns to `table`.
    fn add_columns(&self, table: &str, columns: &[MissingColumn<'_>]) -> Vec<String>;

    /// Statements dropping the given keys and foreign keys.
    fn drop_keys(&self, table: &str, keys: &[IndexInfo], foreign_keys: &[ForeignKeyInfo])
        -> Vec<String>;

    /// Statements adding the keys (and, where supported, foreign keys) of
    /// `plan`.
    fn add_keys(&self, table: &str, plan: &KeyPlan) -> Vec<String>;

    /// Whether foreign keys can be added to an existing table.
    fn supports_add_constraint(&self) -> bool;

    /// Statement opening a transaction.
    fn begin_transaction(&self) -> &'static str {
        "BEGIN"
    }

    /// Tail of an `INSERT INTO t` that stores a row of defaults.
    fn insert_default_values(&self) -> &'static str;

    /// Whether updates must set the `updated` column themselves.
    fn touches_updated_column(&self) -> bool;
}

fn join_columns(dialect: &(impl Dialect + ?Sized), columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}
