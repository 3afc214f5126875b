//! Adapters between raw wire data and uniform field access.
//!
//! Adapters are stateless: every operation receives the raw data it works
//! on. A record adapter sees one row, a table adapter sees a whole table.

mod json;
mod sbis;

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use quire_foundation::{Error, Result, Value};
use tracing::warn;

use crate::format::{FieldDescriptor, Format};

pub use json::JsonAdapter;
pub use sbis::SbisAdapter;

/// Field access on the raw data of one record.
pub trait RecordAdapter {
    /// Raw data of an empty record.
    fn empty(&self) -> Value;

    /// Checks if the raw data holds a field.
    fn has(&self, raw: &Value, name: &str) -> bool;

    /// Raw value of a field; `Undefined` if there is no such field.
    fn get(&self, raw: &Value, name: &str) -> Value;

    /// Writes the raw value of a field.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if the adapter cannot create fields implicitly
    /// and the field does not exist.
    fn set(&self, raw: &mut Value, name: &str, value: Value) -> Result<()>;

    /// Field names in order.
    fn fields(&self, raw: &Value) -> Vec<Arc<str>>;

    /// Format of a field as far as the raw data tells.
    fn field_format(&self, raw: &Value, name: &str) -> Option<FieldDescriptor>;

    /// Adds a field holding its default value.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if the field exists.
    fn add_field(&self, raw: &mut Value, field: &FieldDescriptor, at: Option<usize>) -> Result<()>;

    /// Removes a field.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if the field does not exist.
    fn remove_field(&self, raw: &mut Value, name: &str) -> Result<()>;

    /// Removes a field by position.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such position.
    fn remove_field_at(&self, raw: &mut Value, index: usize) -> Result<()> {
        let fields = self.fields(raw);
        let name = fields
            .get(index)
            .ok_or_else(|| Error::index_out_of_bounds(index, fields.len()))?;
        self.remove_field(raw, name)
    }

    /// Format inferred from the raw data.
    fn format(&self, raw: &Value) -> Format {
        infer_format(self.fields(raw), |name| self.field_format(raw, name))
    }
}

/// Row access on the raw data of a table.
pub trait TableAdapter {
    /// Raw data of an empty table with the given format.
    fn empty(&self, format: &Format) -> Value;

    /// Number of rows.
    fn count(&self, raw: &Value) -> usize;

    /// Raw data of one row, as seen by the record adapter.
    fn at(&self, raw: &Value, index: usize) -> Option<Value>;

    /// Inserts a row at `at`, or appends it.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not fit the table.
    fn add(&self, raw: &mut Value, row: Value, at: Option<usize>) -> Result<()>;

    /// Removes a row.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such row.
    fn remove(&self, raw: &mut Value, index: usize) -> Result<()>;

    /// Replaces a row.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such row.
    fn replace(&self, raw: &mut Value, row: Value, index: usize) -> Result<()>;

    /// Field names in order.
    fn fields(&self, raw: &Value) -> Vec<Arc<str>>;

    /// Format of a field as far as the raw data tells.
    fn field_format(&self, raw: &Value, name: &str) -> Option<FieldDescriptor>;

    /// Adds a field to every row.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if the field exists.
    fn add_field(&self, raw: &mut Value, field: &FieldDescriptor, at: Option<usize>) -> Result<()>;

    /// Removes a field from every row.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if the field does not exist.
    fn remove_field(&self, raw: &mut Value, name: &str) -> Result<()>;

    /// Format inferred from the raw data.
    fn format(&self, raw: &Value) -> Format {
        infer_format(self.fields(raw), |name| self.field_format(raw, name))
    }
}

/// A wire dialect.
pub trait Adapter: fmt::Debug {
    /// Name used to find the adapter again on revival.
    fn name(&self) -> &'static str;

    /// Access to single records.
    fn for_record(&self) -> &dyn RecordAdapter;

    /// Access to tables.
    fn for_table(&self) -> &dyn TableAdapter;
}

/// Shared adapter handle.
pub type AdapterRef = Rc<dyn Adapter>;

/// Finds an adapter by name.
///
/// # Errors
///
/// Returns `UnresolvedModule` for unknown names.
pub fn resolve(name: &str) -> Result<AdapterRef> {
    match name {
        JsonAdapter::NAME => Ok(Rc::new(JsonAdapter)),
        SbisAdapter::NAME => Ok(Rc::new(SbisAdapter)),
        other => {
            warn!(adapter = other, "unknown adapter");
            Err(Error::unresolved_module(format!("adapter {other}")))
        }
    }
}

/// Default adapter.
#[must_use]
pub fn default_adapter() -> AdapterRef {
    Rc::new(JsonAdapter)
}

fn infer_format(
    fields: Vec<Arc<str>>,
    field_format: impl Fn(&str) -> Option<FieldDescriptor>,
) -> Format {
    let mut format = Format::new();
    for name in fields {
        let field = field_format(&name)
            .unwrap_or_else(|| FieldDescriptor::new(name.clone(), quire_foundation::Type::Any));
        // Raw data may repeat a name; the first occurrence wins
        let _ = format.add(field, None);
    }
    format
}
