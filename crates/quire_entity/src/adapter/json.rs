//! Plain JSON dialect: a record is an object, a table is an array of objects.

use std::sync::Arc;

use quire_foundation::{Array, Error, Map, Result, Type, Value};

use super::{Adapter, RecordAdapter, TableAdapter};
use crate::format::{FieldDescriptor, Format};

/// Adapter for plain JSON objects and arrays of objects.
///
/// Types are inferred from the values themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonAdapter;

impl JsonAdapter {
    /// Adapter name.
    pub const NAME: &'static str = "json";
}

fn object_mut(raw: &mut Value) -> Result<&mut Map> {
    if raw.is_nullish() {
        *raw = Value::Object(Map::new());
    }
    match raw {
        Value::Object(map) => Ok(map),
        other => Err(Error::type_mismatch(Type::Object, other.describe())),
    }
}

fn rows_mut(raw: &mut Value) -> Result<&mut Array> {
    if raw.is_nullish() {
        *raw = Value::Array(Array::new());
    }
    match raw {
        Value::Array(rows) => Ok(rows),
        other => Err(Error::type_mismatch(Type::array(Type::Object), other.describe())),
    }
}

fn infer(name: &str, value: Option<&Value>) -> FieldDescriptor {
    FieldDescriptor::new(name, value.map_or(Type::Any, Type::of))
}

impl RecordAdapter for JsonAdapter {
    fn empty(&self) -> Value {
        Value::Object(Map::new())
    }

    fn has(&self, raw: &Value, name: &str) -> bool {
        raw.as_object().is_some_and(|map| map.contains_key(name))
    }

    fn get(&self, raw: &Value, name: &str) -> Value {
        raw.get(name).cloned().unwrap_or(Value::Undefined)
    }

    fn set(&self, raw: &mut Value, name: &str, value: Value) -> Result<()> {
        object_mut(raw)?.insert(name, value);
        Ok(())
    }

    fn fields(&self, raw: &Value) -> Vec<Arc<str>> {
        raw.as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn field_format(&self, raw: &Value, name: &str) -> Option<FieldDescriptor> {
        let value = raw.get(name)?;
        Some(infer(name, Some(value)))
    }

    fn add_field(&self, raw: &mut Value, field: &FieldDescriptor, at: Option<usize>) -> Result<()> {
        let map = object_mut(raw)?;
        if map.contains_key(&field.name) {
            return Err(Error::duplicate_field(field.name.to_string()));
        }
        let index = at.unwrap_or(map.len());
        map.insert_at(index, field.name.clone(), field.default_value());
        Ok(())
    }

    fn remove_field(&self, raw: &mut Value, name: &str) -> Result<()> {
        object_mut(raw)?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::field_not_found(name))
    }
}

impl TableAdapter for JsonAdapter {
    fn empty(&self, _format: &Format) -> Value {
        Value::Array(Array::new())
    }

    fn count(&self, raw: &Value) -> usize {
        raw.as_array().map_or(0, Array::len)
    }

    fn at(&self, raw: &Value, index: usize) -> Option<Value> {
        raw.as_array()?.get(index).cloned()
    }

    fn add(&self, raw: &mut Value, row: Value, at: Option<usize>) -> Result<()> {
        let rows = rows_mut(raw)?;
        match at {
            Some(index) if index > rows.len() => {
                return Err(Error::index_out_of_bounds(index, rows.len()));
            }
            Some(index) => rows.insert(index, row),
            None => rows.push(row),
        }
        Ok(())
    }

    fn remove(&self, raw: &mut Value, index: usize) -> Result<()> {
        let rows = rows_mut(raw)?;
        let length = rows.len();
        rows.remove(index)
            .map(|_| ())
            .ok_or_else(|| Error::index_out_of_bounds(index, length))
    }

    fn replace(&self, raw: &mut Value, row: Value, index: usize) -> Result<()> {
        let rows = rows_mut(raw)?;
        let length = rows.len();
        rows.set(index, row)
            .map(|_| ())
            .ok_or_else(|| Error::index_out_of_bounds(index, length))
    }

    fn fields(&self, raw: &Value) -> Vec<Arc<str>> {
        raw.as_array()
            .and_then(|rows| rows.get(0))
            .map(|row| RecordAdapter::fields(self, row))
            .unwrap_or_default()
    }

    fn field_format(&self, raw: &Value, name: &str) -> Option<FieldDescriptor> {
        let rows = raw.as_array()?;
        if !rows.iter().any(|row| row.get(name).is_some()) {
            return None;
        }
        // The first non-null value tells the type
        let sample = rows
            .iter()
            .filter_map(|row| row.get(name))
            .find(|value| !value.is_nullish());
        Some(infer(name, sample))
    }

    fn add_field(&self, raw: &mut Value, field: &FieldDescriptor, at: Option<usize>) -> Result<()> {
        if TableAdapter::fields(self, raw).contains(&field.name) {
            return Err(Error::duplicate_field(field.name.to_string()));
        }
        for index in 0..self.count(raw) {
            if let Some(row) = rows_mut(raw)?.get_mut(index) {
                RecordAdapter::add_field(self, row, field, at)?;
            }
        }
        Ok(())
    }

    fn remove_field(&self, raw: &mut Value, name: &str) -> Result<()> {
        if !TableAdapter::fields(self, raw).iter().any(|f| &**f == name) {
            return Err(Error::field_not_found(name));
        }
        for index in 0..self.count(raw) {
            if let Some(row) = rows_mut(raw)?.get_mut(index) {
                let _ = RecordAdapter::remove_field(self, row, name);
            }
        }
        Ok(())
    }
}

impl Adapter for JsonAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn for_record(&self) -> &dyn RecordAdapter {
        self
    }

    fn for_table(&self) -> &dyn TableAdapter {
        self
    }
}
