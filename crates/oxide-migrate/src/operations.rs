//! Migration operations.
//!
//! An operation is one phase of converging a table, already rendered to
//! the statements the connection's dialect needs for it.

use std::fmt;

/// One phase of a table migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOperation {
    /// Create the table with its primary key and every declared column.
    CreateTable {
        /// Physical table name.
        table: String,
        /// DDL statements.
        statements: Vec<String>,
    },
    /// Add declared columns the live table lacks.
    AddColumns {
        /// Physical table name.
        table: String,
        /// Names of the added columns, in declared order.
        columns: Vec<String>,
        /// DDL statements.
        statements: Vec<String>,
    },
    /// Drop every foreign key and non-primary key.
    ResetKeys {
        /// Physical table name.
        table: String,
        /// DDL statements.
        statements: Vec<String>,
    },
    /// Add the declared unique keys, reference keys and foreign keys.
    RebuildKeys {
        /// Physical table name.
        table: String,
        /// DDL statements.
        statements: Vec<String>,
    },
}

impl MigrationOperation {
    /// Statements to execute, in order.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        match self {
            Self::CreateTable { statements, .. }
            | Self::AddColumns { statements, .. }
            | Self::ResetKeys { statements, .. }
            | Self::RebuildKeys { statements, .. } => statements,
        }
    }

    /// Physical name of the table the operation changes.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::AddColumns { table, .. }
            | Self::ResetKeys { table, .. }
            | Self::RebuildKeys { table, .. } => table,
        }
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, .. } => write!(f, "create table {table}"),
            Self::AddColumns { table, columns, .. } => {
                write!(f, "add columns {} to {table}", columns.join(", "))
            }
            Self::ResetKeys { table, .. } => write!(f, "reset keys of {table}"),
            Self::RebuildKeys { table, .. } => write!(f, "rebuild keys of {table}"),
        }
    }
}

/// What a migration did to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationOutcome {
    /// The table did not exist and was created.
    Created,
    /// Columns were added; keys may have been rebuilt too.
    Altered,
    /// Only keys were rebuilt.
    IndexesRebuilt,
    /// Nothing to do.
    UpToDate,
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Altered => "altered",
            Self::IndexesRebuilt => "indexes rebuilt",
            Self::UpToDate => "up to date",
        })
    }
}

/// Summary of one table migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Physical table name.
    pub table: String,
    /// What happened.
    pub outcome: MigrationOutcome,
    /// Statements executed (or, in a dry run, that would have been).
    pub statements: Vec<String>,
}

impl MigrationReport {
    /// Whether any DDL was issued.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.outcome != MigrationOutcome::UpToDate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let op = MigrationOperation::AddColumns {
            table: String::from("app_Widget"),
            columns: vec![String::from("sku"), String::from("note")],
            statements: vec![String::from("ALTER TABLE ...")],
        };
        assert_eq!(op.to_string(), "add columns sku, note to app_Widget");
        assert_eq!(op.table(), "app_Widget");
        assert_eq!(op.statements().len(), 1);
        assert_eq!(MigrationOutcome::IndexesRebuilt.to_string(), "indexes rebuilt");
    }
}
