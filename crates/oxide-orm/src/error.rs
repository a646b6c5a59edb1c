//! Error types for the entity runtime.

use oxide_migrate::MigrateError;
use oxide_sql_core::{DriverError, EscapeError, SchemaError};
use thiserror::Error;

use crate::permission::Permissions;

/// A value rejected by a field setter.
///
/// Setters run before anything reaches the database, so these never
/// leave a half-written row behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An empty field name.
    #[error("field name must not be empty")]
    EmptyName,

    /// A field name starting with `_`.
    #[error("field '{0}' is not accessible")]
    Reserved(String),

    /// A name the entity type does not declare.
    #[error("{entity} has no field '{field}'")]
    UnknownField {
        /// Entity type name.
        entity: String,
        /// Requested field.
        field: String,
    },

    /// Assignment to a read-only field.
    #[error("field '{0}' is read-only")]
    ReadOnly(String),

    /// Null on a field that is neither nullable nor defaulted.
    #[error("field '{0}' does not accept null")]
    NullNotAllowed(String),

    /// Unset on a field that is neither nullable nor defaulted.
    #[error("field '{0}' cannot be unset")]
    CannotUnset(String),

    /// A number outside the declared range.
    #[error("value {value} of field '{field}' is outside [{min}, {max}]")]
    OutOfRange {
        /// Field name.
        field: String,
        /// Rejected value.
        value: String,
        /// Lower bound.
        min: String,
        /// Upper bound.
        max: String,
    },

    /// Text or bytes longer than the declared maximum.
    #[error("field '{field}' holds at most {max} {unit}")]
    TooLong {
        /// Field name.
        field: String,
        /// Declared maximum.
        max: usize,
        /// `characters` or `bytes`.
        unit: &'static str,
    },

    /// An entity of another type assigned to a reference.
    #[error("field '{field}' expects {expected}, got {found}")]
    WrongClass {
        /// Field name.
        field: String,
        /// Declared target type.
        expected: String,
        /// Type of the assigned entity.
        found: String,
    },

    /// A value of the wrong kind.
    #[error("field '{field}' cannot hold a {found} value")]
    WrongType {
        /// Field name.
        field: String,
        /// Kind of the assigned value.
        found: &'static str,
    },

    /// Text that does not parse as the field's format.
    #[error("field '{field}' is malformed: {message}")]
    Malformed {
        /// Field name.
        field: String,
        /// Parser message.
        message: String,
    },
}

/// Entity runtime errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A table or column is missing and one migration did not fix it.
    #[error("schema mismatch: {message} (statement: {sql})")]
    SchemaMismatch {
        /// Backend message.
        message: String,
        /// The failing statement.
        sql: String,
    },

    /// Any other backend failure.
    #[error(transparent)]
    Driver(DriverError),

    /// `open` found no row and was asked to fail.
    #[error("{entity} {key} not found")]
    NotFound {
        /// Entity type name.
        entity: String,
        /// Rendered lookup key.
        key: String,
    },

    /// A setter rejected a value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The permission gate refused an operation.
    #[error("User does not have {permission} permissions on {subject}")]
    AccessDenied {
        /// Entity type name.
        subject: String,
        /// Requested permission bits.
        permission: Permissions,
    },

    /// Bad descriptors, unknown types or registry misuse.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A table definition is inconsistent.
    #[error("invalid table definition: {0}")]
    Schema(#[from] SchemaError),

    /// A statement could not be rendered.
    #[error(transparent)]
    Escape(#[from] EscapeError),

    /// A structured record could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (reading configuration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DriverError> for OrmError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::MissingTable { message, sql }
            | DriverError::MissingColumn { message, sql } => {
                Self::SchemaMismatch { message, sql }
            }
            other => Self::Driver(other),
        }
    }
}

impl From<MigrateError> for OrmError {
    fn from(err: MigrateError) -> Self {
        match err {
            MigrateError::Driver(e) => e.into(),
            MigrateError::Schema(e) => Self::Schema(e),
            MigrateError::Escape(e) => Self::Escape(e),
            MigrateError::Io(e) => Self::Io(e),
            other => Self::Configuration(other.to_string()),
        }
    }
}

impl OrmError {
    /// Whether this is a [`OrmError::SchemaMismatch`].
    #[must_use]
    pub const fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }
}

/// Result type alias for entity operations.
pub type Result<T> = std::result::Result<T, OrmError>;
