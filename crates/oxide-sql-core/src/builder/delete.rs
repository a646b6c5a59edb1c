//! DELETE statement builder.

use super::{push_where, Comparison, Condition};
use crate::dialect::Dialect;
use crate::error::EscapeError;
use crate::value::ToSqlValue;

/// A DELETE from one table.
///
/// **Warning**: without a filter every row is deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    conditions: Vec<Condition>,
}

impl Delete {
    /// Deletes from `table`.
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    /// Adds `column = value` to the WHERE conjunction.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            comparison: Comparison::Eq,
            value: value.to_sql_value(),
        });
        self
    }

    /// Adds `column <= value` to the WHERE conjunction.
    #[must_use]
    pub fn filter_at_most(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            comparison: Comparison::Le,
            value: value.to_sql_value(),
        });
        self
    }

    /// Renders the statement.
    ///
    /// # Errors
    ///
    /// Fails when a value cannot be rendered.
    pub fn render(&self, dialect: &dyn Dialect) -> Result<String, EscapeError> {
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        push_where(&mut sql, dialect, &self.conditions)?;
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;

    #[test]
    fn test_delete_by_id() {
        let sql = Delete::from("w").filter("id", 9_u64).render(&MySqlDialect).unwrap();
        assert_eq!(sql, "DELETE FROM `w` WHERE `id` = 9");
    }

    #[test]
    fn test_delete_prune() {
        let sql = Delete::from("app_*errorLog")
            .filter_at_most("id", 40_i64)
            .render(&MySqlDialect)
            .unwrap();
        assert_eq!(sql, "DELETE FROM `app_*errorLog` WHERE `id` <= 40");
    }
}
