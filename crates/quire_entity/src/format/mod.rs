//! Field formats: ordered, uniquely named field descriptors.

mod declaration;
mod field;

use std::sync::Arc;

use quire_foundation::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

pub use declaration::{FieldDeclaration, FormatDeclaration};
pub use field::FieldDescriptor;

/// Ordered list of field descriptors with unique names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Format {
    fields: Vec<FieldDescriptor>,
}

impl Format {
    /// Creates an empty format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a format from fields.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if a name occurs twice.
    pub fn from_fields(fields: impl IntoIterator<Item = FieldDescriptor>) -> Result<Self> {
        let mut format = Self::new();
        for field in fields {
            format.add(field, None)?;
        }
        Ok(format)
    }

    /// Builder method adding a field at the end.
    ///
    /// # Errors
    ///
    /// See [`Self::add`].
    pub fn with_field(mut self, field: FieldDescriptor) -> Result<Self> {
        self.add(field, None)?;
        Ok(self)
    }

    /// Inserts a field at `at`, or appends it.
    ///
    /// # Errors
    ///
    /// Returns `FieldPosition` if the name exists at another position than
    /// `at`, and `DuplicateField` otherwise when the name exists.
    pub fn add(&mut self, field: FieldDescriptor, at: Option<usize>) -> Result<()> {
        if let Some(existing) = self.index_of(&field.name) {
            return Err(match at {
                Some(requested) if requested != existing => {
                    Error::new(ErrorKind::FieldPosition {
                        field: field.name.to_string(),
                        existing,
                        requested,
                    })
                }
                _ => Error::duplicate_field(field.name.to_string()),
            });
        }
        match at {
            Some(index) if index < self.fields.len() => self.fields.insert(index, field),
            _ => self.fields.push(field),
        }
        Ok(())
    }

    /// Removes a field by name.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if there is no such field.
    pub fn remove(&mut self, name: &str) -> Result<FieldDescriptor> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::field_not_found(name))?;
        Ok(self.fields.remove(index))
    }

    /// Removes a field by position.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such position.
    pub fn remove_at(&mut self, index: usize) -> Result<FieldDescriptor> {
        if index >= self.fields.len() {
            return Err(Error::index_out_of_bounds(index, self.fields.len()));
        }
        Ok(self.fields.remove(index))
    }

    /// Replaces the field with the same name, keeping its position.
    pub(crate) fn replace(&mut self, field: FieldDescriptor) {
        match self.index_of(&field.name) {
            Some(index) => self.fields[index] = field,
            None => self.fields.push(field),
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    /// Looks up a field by position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Position of a field.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| &*f.name == name)
    }

    /// Field names in order.
    #[must_use]
    pub fn names(&self) -> Vec<Arc<str>> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Iterates over fields in order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
