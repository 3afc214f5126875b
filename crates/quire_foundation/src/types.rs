//! Type descriptors for field formats.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Type descriptor of a record field.
///
/// Used to declare field types, to infer them from raw data and to cast raw
/// values into typed ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Type {
    /// Boolean type.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Real,
    /// Fixed point amount, carried as a float.
    Money,
    /// Short string.
    String,
    /// Long string.
    Text,
    /// ISO date (`YYYY-MM-DD`), carried as a string.
    Date,
    /// ISO date and time, carried as a string.
    DateTime,
    /// ISO time, carried as a string.
    Time,
    /// Identity (primary key) value.
    Identity,
    /// UUID string.
    Uuid,
    /// Base64 encoded binary.
    Binary,
    /// Single choice from a dictionary.
    Enum,
    /// Tri-state set of choices from a dictionary.
    Flags,
    /// Nested record.
    Record,
    /// Nested recordset.
    RecordSet,
    /// Arbitrary object (passed through as-is).
    Object,
    /// Homogeneous array.
    Array(Box<Type>),
    /// Any value.
    Any,
}

impl Type {
    /// Creates an array type with the given element type.
    #[must_use]
    pub fn array(element: Type) -> Self {
        Self::Array(Box::new(element))
    }

    /// Returns the canonical lowercase name of this type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Money => "money",
            Self::String => "string",
            Self::Text => "text",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Identity => "identity",
            Self::Uuid => "uuid",
            Self::Binary => "binary",
            Self::Enum => "enum",
            Self::Flags => "flags",
            Self::Record => "record",
            Self::RecordSet => "recordset",
            Self::Object => "object",
            Self::Array(_) => "array",
            Self::Any => "any",
        }
    }

    /// Returns true if values of this type are live instances.
    ///
    /// Complex values are cached by their owner and registered as its children.
    #[must_use]
    pub const fn is_complex(&self) -> bool {
        matches!(
            self,
            Self::Enum | Self::Flags | Self::Record | Self::RecordSet
        )
    }

    /// Returns true if the value is stored as text.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::String
                | Self::Text
                | Self::Date
                | Self::DateTime
                | Self::Time
                | Self::Uuid
                | Self::Binary
        )
    }

    /// Infers the type of a plain value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null | Value::Undefined | Value::Function(_) => Self::Any,
            Value::Bool(_) => Self::Boolean,
            Value::Int(_) => Self::Integer,
            Value::Float(_) => Self::Real,
            Value::String(_) => Self::String,
            Value::Array(items) => {
                let mut element = None;
                for item in items.iter() {
                    let ty = Self::of(item);
                    match &element {
                        None => element = Some(ty),
                        Some(existing) if *existing == ty => {}
                        Some(_) => return Self::array(Self::Any),
                    }
                }
                Self::array(element.unwrap_or(Self::Any))
            }
            Value::Object(_) | Value::Instance(_) => Self::Object,
        }
    }

    /// Checks if a plain value is accepted by this type.
    ///
    /// `Null` and `Undefined` are accepted everywhere; nullability is a field
    /// concern, not a type concern.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if matches!(value, Value::Null | Value::Undefined) {
            return true;
        }
        match (self, value) {
            (Self::Any | Self::Object, _)
            | (Self::Boolean, Value::Bool(_))
            | (
                Self::Integer | Self::Identity | Self::Real | Self::Money,
                Value::Int(_),
            )
            | (Self::Real | Self::Money, Value::Float(_))
            | (Self::Array(_), Value::Array(_))
            | (Self::Enum | Self::Flags | Self::Record | Self::RecordSet, Value::Instance(_)) => {
                true
            }
            (ty, Value::String(_)) => ty.is_textual(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(inner) => write!(f, "array<{inner}>"),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for Type {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(inner) = lower
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(Self::array(inner.parse()?));
        }
        Ok(match lower.as_str() {
            "boolean" | "bool" => Self::Boolean,
            "integer" | "int" => Self::Integer,
            "real" | "double" | "float" => Self::Real,
            "money" => Self::Money,
            "string" => Self::String,
            "text" => Self::Text,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "time" => Self::Time,
            "identity" => Self::Identity,
            "uuid" => Self::Uuid,
            "binary" => Self::Binary,
            "enum" => Self::Enum,
            "flags" => Self::Flags,
            "record" => Self::Record,
            "recordset" => Self::RecordSet,
            "object" => Self::Object,
            "array" => Self::array(Self::Any),
            "any" => Self::Any,
            _ => return Err(Error::invalid_value("type name", s)),
        })
    }
}
