//! UPDATE statement builder.

use super::{push_where, Comparison, Condition};
use crate::dialect::Dialect;
use crate::error::EscapeError;
use crate::value::{SqlValue, ToSqlValue};

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    Value(SqlValue),
    Expression(String),
}

/// An UPDATE of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    assignments: Vec<(String, Assignment)>,
    conditions: Vec<Condition>,
}

impl Update {
    /// Updates `table`.
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Assigns a value.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.assignments
            .push((column.into(), Assignment::Value(value.to_sql_value())));
        self
    }

    /// Assigns a raw SQL expression such as `CURRENT_TIMESTAMP`.
    ///
    /// The expression is inserted verbatim and must never carry user input.
    #[must_use]
    pub fn set_expression(mut self, column: impl Into<String>, expression: &str) -> Self {
        self.assignments
            .push((column.into(), Assignment::Expression(String::from(expression))));
        self
    }

    /// Whether no assignment has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
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

    /// Renders the statement. With no assignments, the first filtered
    /// column is assigned to itself so the statement stays valid.
    ///
    /// # Errors
    ///
    /// Fails when a value cannot be rendered.
    pub fn render(&self, dialect: &dyn Dialect) -> Result<String, EscapeError> {
        let mut parts = Vec::with_capacity(self.assignments.len().max(1));
        for (column, assignment) in &self.assignments {
            let rhs = match assignment {
                Assignment::Value(value) => dialect.escape_literal(value)?,
                Assignment::Expression(expression) => expression.clone(),
            };
            parts.push(format!("{} = {rhs}", dialect.quote_identifier(column)));
        }
        if parts.is_empty() {
            if let Some(first) = self.conditions.first() {
                let column = dialect.quote_identifier(&first.column);
                parts.push(format!("{column} = {column}"));
            }
        }
        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            parts.join(", ")
        );
        push_where(&mut sql, dialect, &self.conditions)?;
        Ok(sql)
    }
}
