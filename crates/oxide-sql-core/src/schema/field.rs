//! Field descriptors.
//!
//! A [`FieldDescriptor`] is the static declaration of one entity property:
//! its storage type, nullability, default and type-specific constraints.
//! Descriptors are built in code with the fluent constructors below, or
//! decoded from configuration through [`FieldSpec`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::width::{effective_range, IntWidth};
use crate::error::SchemaError;
use crate::value::{SqlValue, ToSqlValue};

/// Names the runtime reserves for its own columns.
pub const RESERVED_COLUMNS: [&str; 3] = ["id", "added", "updated"];

/// Storage type of a field, with its stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Reference to another entity (code 1).
    Reference,
    /// Character data (code 2).
    Text,
    /// Fixed-length binary data (code 3).
    Binary,
    /// Bounded integer (code 4).
    Integer,
    /// Double precision float (code 5).
    Float,
    /// Point in time stored as `TIMESTAMP` (code 6).
    Timestamp,
    /// Point in time stored as `DATETIME` (code 7).
    DateTime,
    /// Boolean (code 8).
    Boolean,
    /// Any JSON value (code 9).
    Json,
    /// Well-formed XML document (code 10).
    Xml,
}

impl FieldType {
    /// The stable numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Reference => 1,
            Self::Text => 2,
            Self::Binary => 3,
            Self::Integer => 4,
            Self::Float => 5,
            Self::Timestamp => 6,
            Self::DateTime => 7,
            Self::Boolean => 8,
            Self::Json => 9,
            Self::Xml => 10,
        }
    }

    /// Lower-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Timestamp => "timestamp",
            Self::DateTime => "datetime",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

impl TryFrom<u8> for FieldType {
    type Error = SchemaError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::Reference,
            2 => Self::Text,
            3 => Self::Binary,
            4 => Self::Integer,
            5 => Self::Float,
            6 => Self::Timestamp,
            7 => Self::DateTime,
            8 => Self::Boolean,
            9 => Self::Json,
            10 => Self::Xml,
            other => return Err(SchemaError::UnknownFieldType(other)),
        })
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "reference" => Self::Reference,
            "text" => Self::Text,
            "binary" => Self::Binary,
            "integer" | "int" => Self::Integer,
            "float" => Self::Float,
            "timestamp" => Self::Timestamp,
            "datetime" => Self::DateTime,
            "boolean" | "bool" => Self::Boolean,
            "json" => Self::Json,
            "xml" => Self::Xml,
            _ => return Err(SchemaError::UnknownFieldTypeName(String::from(s))),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-specific part of a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Reference to an entity of type `target`.
    Reference {
        /// Referenced entity type name.
        target: String,
        /// Delete this row when the referenced row goes away.
        cascade: bool,
        /// Primary-key width of the referenced type.
        width: IntWidth,
    },
    /// Character data, optionally capped at `max_length` characters.
    Text {
        /// Maximum length in characters.
        max_length: Option<usize>,
    },
    /// Binary data of at most `length` bytes.
    Binary {
        /// Column length in bytes.
        length: usize,
    },
    /// Integer within the effective `[min, max]` range.
    Integer {
        /// Lower bound.
        min: Option<i64>,
        /// Upper bound.
        max: Option<i64>,
    },
    /// Float within `[min, max]`.
    Float {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// `TIMESTAMP` column.
    Timestamp,
    /// `DATETIME` column.
    DateTime,
    /// Boolean column.
    Boolean,
    /// JSON column.
    Json,
    /// XML document, optionally capped at `max_length` characters.
    Xml {
        /// Maximum length in characters.
        max_length: Option<usize>,
    },
}

impl FieldKind {
    /// The storage type of this kind.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Reference { .. } => FieldType::Reference,
            Self::Text { .. } => FieldType::Text,
            Self::Binary { .. } => FieldType::Binary,
            Self::Integer { .. } => FieldType::Integer,
            Self::Float { .. } => FieldType::Float,
            Self::Timestamp => FieldType::Timestamp,
            Self::DateTime => FieldType::DateTime,
            Self::Boolean => FieldType::Boolean,
            Self::Json => FieldType::Json,
            Self::Xml { .. } => FieldType::Xml,
        }
    }
}

/// Static declaration of one entity field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field and column name.
    pub name: String,
    /// Type and type-specific constraints.
    pub kind: FieldKind,
    /// Whether null is a legal value.
    pub nullable: bool,
    /// Only writable through `force_set`.
    pub read_only: bool,
    /// Default in raw storage form.
    pub default: Option<SqlValue>,
}

impl FieldDescriptor {
    /// Creates a non-nullable field of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            read_only: false,
            default: None,
        }
    }

    /// Reference to entities of type `target`, `INT`-sized by default.
    #[must_use]
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Reference {
                target: target.into(),
                cascade: false,
                width: IntWidth::Regular,
            },
        )
    }

    /// Unbounded text.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text { max_length: None })
    }

    /// Binary data of at most `length` bytes.
    #[must_use]
    pub fn binary(name: impl Into<String>, length: usize) -> Self {
        Self::new(name, FieldKind::Binary { length })
    }

    /// Unbounded integer (`INT` range).
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Integer {
                min: None,
                max: None,
            },
        )
    }

    /// Unbounded float.
    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Float {
                min: None,
                max: None,
            },
        )
    }

    /// `TIMESTAMP` field.
    #[must_use]
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    /// `DATETIME` field.
    #[must_use]
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// Boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// JSON field.
    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Json)
    }

    /// XML field.
    #[must_use]
    pub fn xml(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Xml { max_length: None })
    }

    /// Allows null.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the field read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Sets the default, in storage form.
    #[must_use]
    pub fn default_value(mut self, value: impl ToSqlValue) -> Self {
        self.default = Some(value.to_sql_value());
        self
    }

    /// Caps text and XML fields, in characters. Ignored by other kinds.
    #[must_use]
    pub fn max_length(mut self, length: usize) -> Self {
        if let FieldKind::Text { max_length } | FieldKind::Xml { max_length } = &mut self.kind {
            *max_length = Some(length);
        }
        self
    }

    /// Lower bound of an integer or float field.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn min(mut self, bound: i64) -> Self {
        match &mut self.kind {
            FieldKind::Integer { min, .. } => *min = Some(bound),
            FieldKind::Float { min, .. } => *min = Some(bound as f64),
            _ => {}
        }
        self
    }

    /// Upper bound of an integer or float field.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn max(mut self, bound: i64) -> Self {
        match &mut self.kind {
            FieldKind::Integer { max, .. } => *max = Some(bound),
            FieldKind::Float { max, .. } => *max = Some(bound as f64),
            _ => {}
        }
        self
    }

    /// Fractional bounds of a float field.
    #[must_use]
    pub fn float_range(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let FieldKind::Float { min, max } = &mut self.kind {
            *min = lower;
            *max = upper;
        }
        self
    }

    /// Cascades deletes of the referenced row to this one.
    #[must_use]
    pub fn cascade(mut self) -> Self {
        if let FieldKind::Reference { cascade, .. } = &mut self.kind {
            *cascade = true;
        }
        self
    }

    /// Primary-key width of the referenced type.
    #[must_use]
    pub fn id_width(mut self, id_width: IntWidth) -> Self {
        if let FieldKind::Reference { width, .. } = &mut self.kind {
            *width = id_width;
        }
        self
    }

    /// The storage type.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// Referenced type name, for reference fields.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Reference { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Effective integer range, for integer fields.
    #[must_use]
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self.kind {
            FieldKind::Integer { min, max } => Some(effective_range(min, max)),
            _ => None,
        }
    }

    /// Checks the descriptor for contradictions.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for a bad name, a zero length, an empty
    /// reference target or inverted bounds.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !is_valid_field_name(&self.name) {
            return Err(SchemaError::InvalidFieldName(self.name.clone()));
        }
        let invalid = |message: &str| SchemaError::InvalidField {
            field: self.name.clone(),
            message: String::from(message),
        };
        match &self.kind {
            FieldKind::Reference { target, .. } if target.is_empty() => {
                Err(invalid("reference without a target type"))
            }
            FieldKind::Text {
                max_length: Some(0),
            }
            | FieldKind::Xml {
                max_length: Some(0),
            } => Err(invalid("maximum length must be positive")),
            FieldKind::Binary { length: 0 } => Err(invalid("binary fields need a length")),
            FieldKind::Integer { min, max } => {
                let (lo, hi) = effective_range(*min, *max);
                if lo > hi {
                    Err(invalid("minimum is greater than maximum"))
                } else {
                    Ok(())
                }
            }
            FieldKind::Float { min, max } => {
                if min.is_some_and(|v| !v.is_finite()) || max.is_some_and(|v| !v.is_finite()) {
                    return Err(invalid("bounds must be finite"));
                }
                match (min, max) {
                    (Some(lo), Some(hi)) if lo > hi => {
                        Err(invalid("minimum is greater than maximum"))
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// A property name usable as a column: non-empty, not starting with `_`,
/// and not one of [`RESERVED_COLUMNS`].
#[must_use]
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('_') && !RESERVED_COLUMNS.contains(&name)
}

/// A field type given as its numeric code or its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldTypeSpec {
    /// Numeric code, `1..=10`.
    Code(u8),
    /// Name such as `"integer"`.
    Name(String),
}

/// A numeric bound from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    /// Integer bound.
    Int(i64),
    /// Fractional bound.
    Float(f64),
}

impl Bound {
    #[allow(clippy::cast_precision_loss)]
    const fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// Flat, deserializable form of a field descriptor.
///
/// ```
/// use oxide_sql_core::schema::{FieldDescriptor, FieldSpec};
///
/// let spec: FieldSpec = serde_json::from_str(
///     r#"{"name": "price", "type": 4, "min": 0, "max": 100000}"#,
/// ).unwrap();
/// let field = FieldDescriptor::try_from(spec).unwrap();
/// assert_eq!(field.integer_range(), Some((0, 100_000)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Field type code or name.
    #[serde(rename = "type")]
    pub field_type: FieldTypeSpec,
    /// Whether null is allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the field is read-only.
    #[serde(default, rename = "readOnly", alias = "read_only")]
    pub read_only: bool,
    /// Default in storage form.
    #[serde(default)]
    pub default: Option<SqlValue>,
    /// Maximum length for text and XML.
    #[serde(default, rename = "maxLength", alias = "max_length")]
    pub max_length: Option<usize>,
    /// Length for binary fields.
    #[serde(default)]
    pub length: Option<usize>,
    /// Lower bound for numeric fields.
    #[serde(default)]
    pub min: Option<Bound>,
    /// Upper bound for numeric fields.
    #[serde(default)]
    pub max: Option<Bound>,
    /// Referenced type for reference fields.
    #[serde(default, alias = "type_name")]
    pub references: Option<String>,
    /// Cascade deletes for reference fields.
    #[serde(default)]
    pub cascade: bool,
    /// Primary-key byte budget of the referenced type.
    #[serde(default, rename = "idBytes", alias = "id_bytes")]
    pub id_bytes: Option<u8>,
}

impl TryFrom<FieldSpec> for FieldDescriptor {
    type Error = SchemaError;

    fn try_from(spec: FieldSpec) -> Result<Self, Self::Error> {
        let field_type = match &spec.field_type {
            FieldTypeSpec::Code(code) => FieldType::try_from(*code)?,
            FieldTypeSpec::Name(name) => name.parse()?,
        };
        let invalid = |message: &str| SchemaError::InvalidField {
            field: spec.name.clone(),
            message: String::from(message),
        };
        let int_bound = |bound: Option<Bound>| match bound {
            None => Ok(None),
            Some(Bound::Int(v)) => Ok(Some(v)),
            Some(Bound::Float(_)) => Err(invalid("integer bounds must be whole numbers")),
        };
        let kind = match field_type {
            FieldType::Reference => FieldKind::Reference {
                target: spec
                    .references
                    .clone()
                    .ok_or_else(|| invalid("reference without a target type"))?,
                cascade: spec.cascade,
                width: IntWidth::from_bytes(spec.id_bytes.unwrap_or(4)),
            },
            FieldType::Text => FieldKind::Text {
                max_length: spec.max_length,
            },
            FieldType::Binary => FieldKind::Binary {
                length: spec
                    .length
                    .ok_or_else(|| invalid("binary fields need a length"))?,
            },
            FieldType::Integer => FieldKind::Integer {
                min: int_bound(spec.min)?,
                max: int_bound(spec.max)?,
            },
            FieldType::Float => FieldKind::Float {
                min: spec.min.map(Bound::as_f64),
                max: spec.max.map(Bound::as_f64),
            },
            FieldType::Timestamp => FieldKind::Timestamp,
            FieldType::DateTime => FieldKind::DateTime,
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::Json => FieldKind::Json,
            FieldType::Xml => FieldKind::Xml {
                max_length: spec.max_length,
            },
        };
        let descriptor = Self {
            name: spec.name,
            kind,
            nullable: spec.nullable,
            read_only: spec.read_only,
            default: spec.default,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_are_stable() {
        for code in 1..=10_u8 {
            let field_type = FieldType::try_from(code).unwrap();
            assert_eq!(field_type.code(), code);
            assert_eq!(field_type.name().parse::<FieldType>().unwrap(), field_type);
        }
        assert_eq!(
            FieldType::try_from(11),
            Err(SchemaError::UnknownFieldType(11))
        );
        assert_eq!(FieldType::try_from(0), Err(SchemaError::UnknownFieldType(0)));
    }

    #[test]
    fn test_builder_constraints() {
        let field = FieldDescriptor::integer("price").min(0).max(100_000);
        assert_eq!(field.integer_range(), Some((0, 100_000)));
        assert!(field.validate().is_ok());

        let field = FieldDescriptor::text("name").max_length(32).nullable();
        assert_eq!(field.kind, FieldKind::Text { max_length: Some(32) });
        assert!(field.nullable);

        let field = FieldDescriptor::reference("owner", "User")
            .cascade()
            .id_width(IntWidth::Small);
        assert_eq!(field.target(), Some("User"));
        assert_eq!(
            field.kind,
            FieldKind::Reference {
                target: String::from("User"),
                cascade: true,
                width: IntWidth::Small
            }
        );
    }

    #[test]
    fn test_validate_rejects_contradictions() {
        assert!(FieldDescriptor::integer("n").min(5).max(1).validate().is_err());
        assert!(FieldDescriptor::binary("hash", 0).validate().is_err());
        assert!(FieldDescriptor::text("_secret").validate().is_err());
        assert!(FieldDescriptor::text("").validate().is_err());
        assert!(FieldDescriptor::text("id").validate().is_err());
        assert!(FieldDescriptor::float("ratio")
            .float_range(Some(1.0), Some(0.5))
            .validate()
            .is_err());
    }

    #[test]
    fn test_spec_missing_binary_length() {
        let spec: FieldSpec =
            serde_json::from_str(r#"{"name": "hash", "type": "binary"}"#).unwrap();
        assert_eq!(
            FieldDescriptor::try_from(spec),
            Err(SchemaError::InvalidField {
                field: String::from("hash"),
                message: String::from("binary fields need a length"),
            })
        );
    }

    #[test]
    fn test_spec_unknown_type_code() {
        let spec: FieldSpec = serde_json::from_str(r#"{"name": "x", "type": 42}"#).unwrap();
        assert_eq!(
            FieldDescriptor::try_from(spec),
            Err(SchemaError::UnknownFieldType(42))
        );
    }

    #[test]
    fn test_spec_reference() {
        let spec: FieldSpec = serde_json::from_str(
            r#"{"name": "owner", "type": 1, "references": "User", "cascade": true, "idBytes": 2}"#,
        )
        .unwrap();
        let field = FieldDescriptor::try_from(spec).unwrap();
        assert_eq!(
            field.kind,
            FieldKind::Reference {
                target: String::from("User"),
                cascade: true,
                width: IntWidth::Small
            }
        );
    }
}
