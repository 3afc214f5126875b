//! Declared formats, complete or partial.

use std::sync::Arc;

use quire_foundation::{Result, Type};
use serde::{Deserialize, Serialize};

use super::{FieldDescriptor, Format};

/// Partial declaration of one field; unset parts come from the inferred format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Field name.
    pub name: Arc<str>,
    /// Declared type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    /// Declared default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Declared nullability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Declared dictionary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Vec<Arc<str>>>,
    /// Declared precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

impl FieldDeclaration {
    /// Declares a field by name only.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: None,
            nullable: None,
            dictionary: None,
            precision: None,
        }
    }

    /// Declares the type.
    #[must_use]
    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Declares the default.
    #[must_use]
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Declares nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Declares the dictionary.
    #[must_use]
    pub fn with_dictionary<I, S>(mut self, dictionary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.dictionary = Some(dictionary.into_iter().map(Into::into).collect());
        self
    }

    /// Declares the precision.
    #[must_use]
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Applies the declared parts over a descriptor.
    fn apply(&self, mut field: FieldDescriptor) -> FieldDescriptor {
        if let Some(ty) = &self.ty {
            field.ty = ty.clone();
        }
        if let Some(default) = &self.default {
            field.default = Some(default.clone());
        }
        if let Some(nullable) = self.nullable {
            field.nullable = nullable;
        }
        if let Some(dictionary) = &self.dictionary {
            field.dictionary = Some(dictionary.clone());
        }
        if let Some(precision) = self.precision {
            field.precision = Some(precision);
        }
        field
    }
}

/// Format declared by the user of an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields", rename_all = "lowercase")]
pub enum FormatDeclaration {
    /// Authoritative format; raw data is made to follow it.
    Complete(Format),
    /// Overrides merged over the format inferred from raw data.
    Partial(Vec<FieldDeclaration>),
}

impl FormatDeclaration {
    /// Returns true for a complete declaration.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Builds the effective format from the inferred one.
    ///
    /// A complete declaration wins outright. Partial declarations override
    /// matching inferred fields and append the fields raw data lacks.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if a partial declaration names a field twice.
    pub fn merge(&self, inferred: &Format) -> Result<Format> {
        match self {
            Self::Complete(format) => Ok(format.clone()),
            Self::Partial(declarations) => {
                let mut merged = inferred.clone();
                let mut seen: Vec<&str> = Vec::with_capacity(declarations.len());
                for declaration in declarations {
                    if seen.contains(&&*declaration.name) {
                        return Err(quire_foundation::Error::duplicate_field(
                            declaration.name.to_string(),
                        ));
                    }
                    seen.push(&*declaration.name);
                    let base = merged.get(&declaration.name).cloned().unwrap_or_else(|| {
                        FieldDescriptor::new(declaration.name.clone(), Type::String)
                    });
                    merged.replace(declaration.apply(base));
                }
                Ok(merged)
            }
        }
    }

    /// Declares an added field so its type survives inference.
    pub(crate) fn add_field(&mut self, field: FieldDescriptor, at: Option<usize>) -> Result<()> {
        match self {
            Self::Complete(format) => format.add(field, at),
            Self::Partial(declarations) => {
                declarations.retain(|d| d.name != field.name);
                declarations.push(FieldDeclaration::from(&field));
                Ok(())
            }
        }
    }

    /// Removes a field from the declaration if it is declared.
    pub(crate) fn remove_field(&mut self, name: &str) {
        match self {
            Self::Complete(format) => {
                let _ = format.remove(name);
            }
            Self::Partial(declarations) => declarations.retain(|d| &*d.name != name),
        }
    }
}

impl From<&FieldDescriptor> for FieldDeclaration {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            name: field.name.clone(),
            ty: Some(field.ty.clone()),
            default: field.default.clone(),
            nullable: Some(field.nullable),
            dictionary: field.dictionary.clone(),
            precision: field.precision,
        }
    }
}

impl From<Format> for FormatDeclaration {
    fn from(format: Format) -> Self {
        Self::Complete(format)
    }
}
