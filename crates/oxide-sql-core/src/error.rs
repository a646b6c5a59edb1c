//! Error types shared by the escaping layer and the schema synthesizer.

use thiserror::Error;

/// A declaration that cannot be turned into a column or a table.
///
/// These are configuration mistakes: they are reported, never coerced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A numeric field type code outside `1..=10`.
    #[error("unknown field type code {0}")]
    UnknownFieldType(u8),

    /// A field type name that is not recognized.
    #[error("unknown field type '{0}'")]
    UnknownFieldTypeName(String),

    /// A field descriptor whose options contradict each other.
    #[error("field '{field}': {message}")]
    InvalidField {
        /// The field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A field name that cannot be used as a column.
    #[error("invalid field name '{0}'")]
    InvalidFieldName(String),

    /// The same field declared twice in one table.
    #[error("field '{field}' declared twice in '{table}'")]
    DuplicateField {
        /// The table name.
        table: String,
        /// The repeated field.
        field: String,
    },

    /// A unique group naming a field the table does not declare.
    #[error("unique key on '{table}' references unknown field '{field}'")]
    UnknownIndexField {
        /// The table name.
        table: String,
        /// The missing field.
        field: String,
    },
}

/// Failure to render a statement.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EscapeError {
    /// NaN and infinities have no SQL literal.
    #[error("cannot render non-finite float {0}")]
    NonFiniteFloat(f64),

    /// The number of `?` markers does not match the bound values.
    #[error("template has {expected} parameter markers but {given} values were bound")]
    ParameterCount {
        /// Markers found in the template.
        expected: usize,
        /// Values supplied.
        given: usize,
    },

    /// A `[[` without its closing `]]`.
    #[error("unterminated table placeholder at byte {0}")]
    UnterminatedPlaceholder(usize),
}
