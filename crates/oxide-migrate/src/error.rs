//! Error types for the migration system.

use std::path::PathBuf;

use oxide_sql_core::{DriverError, EscapeError, SchemaError};

/// Errors that can occur while converging a table.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The backend rejected an introspection query or a DDL statement.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A table definition is inconsistent.
    #[error("Invalid table definition: {0}")]
    Schema(#[from] SchemaError),

    /// A template could not be rendered.
    #[error(transparent)]
    Escape(#[from] EscapeError),

    /// IO error (reading schema files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a schema file.
    #[error("Failed to parse schema file '{path}': {message}")]
    ParseError {
        /// Path to the schema file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A schema file names a table it does not declare.
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
