//! INSERT statement builder.

use crate::dialect::Dialect;
use crate::error::EscapeError;
use crate::value::{SqlValue, ToSqlValue};

/// A single-row INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    values: Vec<(String, SqlValue)>,
}

impl Insert {
    /// Inserts into `table`.
    #[must_use]
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Sets a column value.
    #[must_use]
    pub fn value(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.values.push((column.into(), value.to_sql_value()));
        self
    }

    /// Renders the statement; without values it inserts a row of defaults.
    ///
    /// # Errors
    ///
    /// Fails when a value cannot be rendered.
    pub fn render(&self, dialect: &dyn Dialect) -> Result<String, EscapeError> {
        let table = dialect.quote_identifier(&self.table);
        if self.values.is_empty() {
            return Ok(format!(
                "INSERT INTO {table} {}",
                dialect.insert_default_values()
            ));
        }
        let columns: Vec<String> = self
            .values
            .iter()
            .map(|(column, _)| dialect.quote_identifier(column))
            .collect();
        let literals = self
            .values
            .iter()
            .map(|(_, value)| dialect.escape_literal(value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            literals.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};

    #[test]
    fn test_insert_values() {
        let sql = Insert::into("w")
            .value("name", "bolt")
            .value("price", 5_i64)
            .value("hash", vec![0xDE_u8, 0xAD])
            .render(&MySqlDialect)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `w` (`name`, `price`, `hash`) VALUES ('bolt', 5, X'DEAD')"
        );
    }

    #[test]
    fn test_insert_defaults() {
        assert_eq!(
            Insert::into("w").render(&MySqlDialect).unwrap(),
            "INSERT INTO `w` () VALUES ()"
        );
        assert_eq!(
            Insert::into("w").render(&SqliteDialect).unwrap(),
            "INSERT INTO \"w\" DEFAULT VALUES"
        );
    }
}
