//! SELECT statement builder.

use super::{push_where, Comparison, Condition};
use crate::dialect::Dialect;
use crate::error::EscapeError;
use crate::value::ToSqlValue;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// A SELECT over one table with an `AND`-ed equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    conditions: Vec<Condition>,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    /// Selects every column of `table`.
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Restricts the selected columns.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Adds `column = value` (`IS NULL` for null).
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            comparison: Comparison::Eq,
            value: value.to_sql_value(),
        });
        self
    }

    /// Adds an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets OFFSET; only rendered together with a LIMIT.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Renders the statement.
    ///
    /// # Errors
    ///
    /// Fails when a bound value cannot be rendered.
    pub fn render(&self, dialect: &dyn Dialect) -> Result<String, EscapeError> {
        let columns = if self.columns.is_empty() {
            String::from("*")
        } else {
            self.columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!(
            "SELECT {columns} FROM {}",
            dialect.quote_identifier(&self.table)
        );
        push_where(&mut sql, dialect, &self.conditions)?;
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, order)| {
                    let direction = match order {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    format!("{} {direction}", dialect.quote_identifier(column))
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};
    use crate::value::SqlValue;

    #[test]
    fn test_select_all() {
        let sql = Select::from("users").render(&SqliteDialect).unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\"");
    }

    #[test]
    fn test_select_conjunction() {
        let sql = Select::from("w")
            .columns(["id"])
            .filter("name", "a'b")
            .filter("owner", SqlValue::Null)
            .filter("price", 5_i64)
            .render(&MySqlDialect)
            .unwrap();
        assert_eq!(
            sql,
            r"SELECT `id` FROM `w` WHERE `name` = 'a\'b' AND `owner` IS NULL AND `price` = 5"
        );
    }

    #[test]
    fn test_order_limit_offset() {
        let sql = Select::from("log")
            .columns(["id"])
            .order_by("id", Order::Desc)
            .limit(1)
            .offset(100)
            .render(&SqliteDialect)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\" FROM \"log\" ORDER BY \"id\" DESC LIMIT 1 OFFSET 100"
        );
    }

    #[test]
    fn test_non_finite_filter_fails() {
        let result = Select::from("w")
            .filter("ratio", f64::NAN)
            .render(&SqliteDialect);
        assert!(result.is_err());
    }
}
