//! Field values in their in-memory form.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::entity::Entity;

/// The in-memory value of an entity field.
///
/// Storage coercion to and from [`oxide_sql_core::SqlValue`] is done by
/// [`crate::fields`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// A UTC instant.
    Timestamp(DateTime<Utc>),
    /// A parsed JSON document.
    Json(serde_json::Value),
    /// A well-formed XML document.
    Xml(String),
    /// A resolved reference.
    Entity(Box<Entity>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
            Self::Xml(_) => "xml",
            Self::Entity(_) => "entity",
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Text of a [`Value::Text`] or [`Value::Xml`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Xml(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) | Self::Xml(s) => f.write_str(s),
            Self::Binary(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Json(v) => write!(f, "{v}"),
            Self::Entity(e) => match e.id() {
                Some(id) => write!(f, "{}#{id}", e.type_name()),
                None => write!(f, "{}#new", e.type_name()),
            },
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(via $conv:path)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant($($conv)?(v))
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int via i64::from,
    i16 => Int via i64::from,
    u32 => Int via i64::from,
    u16 => Int via i64::from,
    u8 => Int via i64::from,
    f64 => Float,
    f32 => Float via f64::from,
    String => Text,
    Vec<u8> => Binary,
    DateTime<Utc> => Timestamp,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(String::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Binary(v.to_vec())
    }
}

impl From<Entity> for Value {
    fn from(v: Entity) -> Self {
        Self::Entity(Box::new(v))
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
