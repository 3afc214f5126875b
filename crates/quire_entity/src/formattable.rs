//! Binding of raw data, its adapter and the effective format.

use std::cell::RefCell;
use std::sync::Arc;

use quire_foundation::{Error, ErrorKind, Result, Value};
use tracing::{trace, warn};

use crate::adapter::AdapterRef;
use crate::format::{FieldDescriptor, Format, FormatDeclaration};

/// Whether raw data holds one record or a table of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// A single row.
    Record,
    /// A table of rows.
    Table,
}

/// Raw data seen through an adapter, with a lazily built format.
///
/// The effective format is the declared one, the inferred one, or the
/// inferred one with a partial declaration merged over it. It is cached
/// until the raw data or the declaration changes.
#[derive(Debug)]
pub struct Formattable {
    raw: RefCell<Value>,
    adapter: AdapterRef,
    shape: Shape,
    declared: RefCell<Option<FormatDeclaration>>,
    format: RefCell<Option<Format>>,
}

impl Formattable {
    /// Binds raw data to an adapter.
    ///
    /// With a complete declaration, fields the raw data lacks are added with
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if a partial declaration names a field twice.
    pub fn new(
        raw: Value,
        adapter: AdapterRef,
        shape: Shape,
        declared: Option<FormatDeclaration>,
    ) -> Result<Self> {
        let this = Self {
            raw: RefCell::new(raw),
            adapter,
            shape,
            declared: RefCell::new(declared),
            format: RefCell::new(None),
        };
        this.build_format()?;
        this.normalize();
        Ok(this)
    }

    /// Binds raw data to an adapter with a format inferred from it.
    #[must_use]
    pub fn inferred_from(raw: Value, adapter: AdapterRef, shape: Shape) -> Self {
        Self {
            raw: RefCell::new(raw),
            adapter,
            shape,
            declared: RefCell::new(None),
            format: RefCell::new(None),
        }
    }

    /// The adapter.
    #[must_use]
    pub fn adapter(&self) -> &AdapterRef {
        &self.adapter
    }

    /// Copy of the raw data. Composite parts are shared until written.
    #[must_use]
    pub fn raw_data(&self) -> Value {
        self.raw.borrow().clone()
    }

    /// Replaces the raw data.
    pub fn set_raw_data(&self, raw: Value) {
        *self.raw.borrow_mut() = raw;
        self.reset_format();
        self.normalize();
    }

    /// Runs `f` over the raw data.
    pub fn with_raw<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.raw.borrow())
    }

    /// Runs `f` over the raw data mutably.
    pub fn with_raw_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.raw.borrow_mut())
    }

    /// The declaration, if any.
    #[must_use]
    pub fn declared(&self) -> Option<FormatDeclaration> {
        self.declared.borrow().clone()
    }

    /// Returns true if a format was declared.
    #[must_use]
    pub fn has_declared_format(&self) -> bool {
        self.declared.borrow().is_some()
    }

    /// Replaces the declaration.
    pub(crate) fn declare(&self, declared: Option<FormatDeclaration>) {
        *self.declared.borrow_mut() = declared;
        self.reset_format();
        self.normalize();
    }

    /// Drops the cached format.
    pub fn reset_format(&self) {
        self.format.borrow_mut().take();
    }

    /// The effective format.
    #[must_use]
    pub fn format(&self) -> Format {
        if let Some(format) = self.format.borrow().as_ref() {
            return format.clone();
        }
        match self.build_format() {
            Ok(format) => format,
            Err(error) => {
                warn!(%error, "declared format ignored");
                self.inferred()
            }
        }
    }

    /// Descriptor of one field.
    #[must_use]
    pub fn field_format(&self, name: &str) -> Option<FieldDescriptor> {
        self.format().get(name).cloned()
    }

    /// Field names of the raw data, in order.
    #[must_use]
    pub fn fields(&self) -> Vec<Arc<str>> {
        let raw = self.raw.borrow();
        match self.shape {
            Shape::Record => self.adapter.for_record().fields(&raw),
            Shape::Table => self.adapter.for_table().fields(&raw),
        }
    }

    /// Adds a field to the raw data and the declaration.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` or `FieldPosition` if the name exists.
    pub fn add_field(&self, field: FieldDescriptor, at: Option<usize>) -> Result<()> {
        let mut next = self.format();
        next.add(field.clone(), at)?;
        self.with_raw_mut(|raw| match self.shape {
            Shape::Record => self.adapter.for_record().add_field(raw, &field, at),
            Shape::Table => self.adapter.for_table().add_field(raw, &field, at),
        })?;
        self.declared
            .borrow_mut()
            .get_or_insert_with(|| FormatDeclaration::Partial(Vec::new()))
            .add_field(field, at)?;
        *self.format.borrow_mut() = Some(next);
        Ok(())
    }

    /// Removes a field from the raw data and the declaration.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if there is no such field.
    pub fn remove_field(&self, name: &str) -> Result<()> {
        let mut next = self.format();
        next.remove(name)?;
        let removed = self.with_raw_mut(|raw| match self.shape {
            Shape::Record => self.adapter.for_record().remove_field(raw, name),
            Shape::Table => self.adapter.for_table().remove_field(raw, name),
        });
        match removed {
            // Declared fields of an empty table exist in the format only
            Err(Error {
                kind: ErrorKind::FieldNotFound(_),
                ..
            }) => {}
            other => other?,
        }
        if let Some(declared) = self.declared.borrow_mut().as_mut() {
            declared.remove_field(name);
        }
        *self.format.borrow_mut() = Some(next);
        Ok(())
    }

    /// Removes a field by position and returns its name.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such position.
    pub fn remove_field_at(&self, index: usize) -> Result<Arc<str>> {
        let format = self.format();
        let field = format
            .at(index)
            .ok_or_else(|| Error::index_out_of_bounds(index, format.len()))?;
        self.remove_field(&field.name)?;
        Ok(field.name.clone())
    }

    fn inferred(&self) -> Format {
        let raw = self.raw.borrow();
        match self.shape {
            Shape::Record => self.adapter.for_record().format(&raw),
            Shape::Table => self.adapter.for_table().format(&raw),
        }
    }

    fn build_format(&self) -> Result<Format> {
        let inferred = self.inferred();
        let format = match self.declared.borrow().as_ref() {
            Some(declared) => declared.merge(&inferred)?,
            None => inferred,
        };
        *self.format.borrow_mut() = Some(format.clone());
        Ok(format)
    }

    /// Adds the fields of a complete declaration the raw data lacks.
    fn normalize(&self) {
        let Some(FormatDeclaration::Complete(format)) = self.declared() else {
            return;
        };
        {
            let mut raw = self.raw.borrow_mut();
            if raw.is_nullish() {
                *raw = match self.shape {
                    Shape::Record => self.adapter.for_record().empty(),
                    Shape::Table => self.adapter.for_table().empty(&format),
                };
            }
        }
        let present = self.fields();
        let mut raw = self.raw.borrow_mut();
        for (index, field) in format.iter().enumerate() {
            if present.contains(&field.name) {
                continue;
            }
            trace!(field = %field.name, "adding declared field to raw data");
            let added = match self.shape {
                Shape::Record => self.adapter.for_record().add_field(&mut raw, field, Some(index)),
                Shape::Table => self.adapter.for_table().add_field(&mut raw, field, Some(index)),
            };
            if let Err(error) = added {
                warn!(field = %field.name, %error, "cannot add declared field");
            }
        }
    }
}
