//! Statement builders.
//!
//! The builders compose statements from physical table and column names
//! and render them for a [`Dialect`], inlining every bound value as an
//! escaped literal.
//!
//! # Example
//!
//! ```rust
//! use oxide_sql_core::builder::Select;
//! use oxide_sql_core::dialect::MySqlDialect;
//!
//! let sql = Select::from("app_Widget")
//!     .columns(["id", "name"])
//!     .filter("name", "bolt")
//!     .limit(1)
//!     .render(&MySqlDialect)
//!     .unwrap();
//!
//! assert_eq!(sql, "SELECT `id`, `name` FROM `app_Widget` WHERE `name` = 'bolt' LIMIT 1");
//! ```

mod delete;
mod insert;
mod select;
mod update;

pub use delete::Delete;
pub use insert::Insert;
pub use select::{Order, Select};
pub use update::Update;

use crate::dialect::Dialect;
use crate::error::EscapeError;
use crate::value::SqlValue;

/// Comparison used by a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Le,
}

/// One `column <op> value` term of a `WHERE` conjunction.
#[derive(Debug, Clone, PartialEq)]
struct Condition {
    column: String,
    comparison: Comparison,
    value: SqlValue,
}

impl Condition {
    fn render(&self, dialect: &dyn Dialect) -> Result<String, EscapeError> {
        let column = dialect.quote_identifier(&self.column);
        Ok(match (self.comparison, &self.value) {
            (Comparison::Eq, SqlValue::Null) => format!("{column} IS NULL"),
            (Comparison::Eq, value) => format!("{column} = {}", dialect.escape_literal(value)?),
            (Comparison::Le, value) => format!("{column} <= {}", dialect.escape_literal(value)?),
        })
    }
}

/// Appends ` WHERE a AND b ...` when there are conditions.
fn push_where(
    sql: &mut String,
    dialect: &dyn Dialect,
    conditions: &[Condition],
) -> Result<(), EscapeError> {
    if conditions.is_empty() {
        return Ok(());
    }
    let terms = conditions
        .iter()
        .map(|c| c.render(dialect))
        .collect::<Result<Vec<_>, _>>()?;
    sql.push_str(" WHERE ");
    sql.push_str(&terms.join(" AND "));
    Ok(())
}
