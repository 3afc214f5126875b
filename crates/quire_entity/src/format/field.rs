//! Field descriptors.

use std::sync::Arc;

use quire_foundation::{Type, Value};
use serde::{Deserialize, Serialize};

/// Describes one field of a format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique within a format.
    pub name: Arc<str>,
    /// Field type.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Value of the field in a freshly added row. Plain JSON only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Whether null is a legal value.
    #[serde(default = "nullable_default")]
    pub nullable: bool,
    /// Value space of enum and flags fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Vec<Arc<str>>>,
    /// Digits after the decimal point of money and real fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

fn nullable_default() -> bool {
    true
}

impl FieldDescriptor {
    /// Creates a nullable field without default.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            nullable: true,
            dictionary: None,
            precision: None,
        }
    }

    /// Creates an enum field over a dictionary.
    #[must_use]
    pub fn enumeration<I, S>(name: impl Into<Arc<str>>, dictionary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(name, Type::Enum).with_dictionary(dictionary)
    }

    /// Creates a flags field over a dictionary.
    #[must_use]
    pub fn flags<I, S>(name: impl Into<Arc<str>>, dictionary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(name, Type::Flags).with_dictionary(dictionary)
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the dictionary.
    #[must_use]
    pub fn with_dictionary<I, S>(mut self, dictionary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.dictionary = Some(dictionary.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the precision.
    #[must_use]
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Default value as a field value.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default.clone().map(Value::from).unwrap_or_default()
    }

    /// Dictionary entries, empty if the field has none.
    #[must_use]
    pub fn dictionary(&self) -> &[Arc<str>] {
        self.dictionary.as_deref().unwrap_or_default()
    }
}
