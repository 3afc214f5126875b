//! Business-logic dialect: values in `d`, columns with their types in `s`.
//!
//! ```text
//! record:    {"_type": "record",    "d": [1, "A"],          "s": [{"n": "id", "t": "integer"}, ..]}
//! recordset: {"_type": "recordset", "d": [[1, "A"], [2, "B"]], "s": [..]}
//! ```
//!
//! A column type is either a type name or an object carrying the name in
//! `n` and the dictionary (`s`) or precision (`p`) of the field.

use std::sync::Arc;

use quire_foundation::{Array, Error, Map, Result, Type, Value, object};

use super::{Adapter, RecordAdapter, TableAdapter};
use crate::format::{FieldDescriptor, Format};

const TYPE_KEY: &str = "_type";
const DATA_KEY: &str = "d";
const SCHEME_KEY: &str = "s";
const NAME_KEY: &str = "n";
const COLUMN_TYPE_KEY: &str = "t";
const PRECISION_KEY: &str = "p";

const RECORD_TYPE: &str = "record";
const RECORDSET_TYPE: &str = "recordset";

/// Adapter for the `d`/`s` dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct SbisAdapter;

impl SbisAdapter {
    /// Adapter name.
    pub const NAME: &'static str = "sbis";
}

fn shell(kind: &str, data: Array, scheme: Array) -> Value {
    object! {
        TYPE_KEY => kind,
        DATA_KEY => data,
        SCHEME_KEY => scheme,
    }
}

/// Encodes a field descriptor as a column.
fn column(field: &FieldDescriptor) -> Value {
    let ty = if field.dictionary.is_some() || field.precision.is_some() {
        let mut map = Map::new();
        map.insert(NAME_KEY, Value::from(field.ty.to_string()));
        if let Some(dictionary) = &field.dictionary {
            map.insert(
                SCHEME_KEY,
                dictionary.iter().cloned().map(Value::from).collect::<Array>().into(),
            );
        }
        if let Some(precision) = field.precision {
            map.insert(PRECISION_KEY, Value::Int(i64::from(precision)));
        }
        Value::Object(map)
    } else {
        Value::from(field.ty.to_string())
    };
    object! { NAME_KEY => field.name.clone(), COLUMN_TYPE_KEY => ty }
}

/// Decodes a column into a field descriptor.
fn descriptor(column: &Value) -> Option<FieldDescriptor> {
    let name = column.get(NAME_KEY)?.as_str()?;
    let Some(ty) = column.get(COLUMN_TYPE_KEY) else {
        return Some(FieldDescriptor::new(name, Type::Any));
    };
    let type_name = match ty {
        Value::String(type_name) => &**type_name,
        Value::Object(_) => ty.get(NAME_KEY).and_then(Value::as_str).unwrap_or("any"),
        _ => "any",
    };
    let mut field = FieldDescriptor::new(name, type_name.parse().unwrap_or(Type::Any));
    if let Some(dictionary) = ty.get(SCHEME_KEY).and_then(Value::as_array) {
        field = field.with_dictionary(dictionary.iter().filter_map(Value::as_str).map(Arc::<str>::from));
    }
    if let Some(precision) = ty
        .get(PRECISION_KEY)
        .and_then(Value::as_int)
        .and_then(|p| u32::try_from(p).ok())
    {
        field = field.with_precision(precision);
    }
    Some(field)
}

fn scheme(raw: &Value) -> Option<&Array> {
    raw.get(SCHEME_KEY)?.as_array()
}

fn names(raw: &Value) -> Vec<Arc<str>> {
    scheme(raw)
        .map(|columns| {
            columns
                .iter()
                .filter_map(|column| column.get(NAME_KEY)?.as_str().map(Arc::from))
                .collect()
        })
        .unwrap_or_default()
}

fn position(raw: &Value, name: &str) -> Option<usize> {
    scheme(raw)?
        .iter()
        .position(|column| column.get(NAME_KEY).and_then(Value::as_str) == Some(name))
}

fn field_format(raw: &Value, name: &str) -> Option<FieldDescriptor> {
    let index = position(raw, name)?;
    descriptor(scheme(raw)?.get(index)?)
}

/// Makes sure raw data is a shell of the given kind and returns its parts.
fn parts_mut<'a>(raw: &'a mut Value, kind: &str) -> Result<(&'a mut Array, &'a mut Array)> {
    if raw.is_nullish() {
        *raw = shell(kind, Array::new(), Array::new());
    }
    if !matches!(raw, Value::Object(_)) {
        return Err(Error::type_mismatch(Type::Object, raw.describe()));
    }
    let Value::Object(map) = raw else {
        return Err(Error::internal("record shell is not an object"));
    };
    for key in [DATA_KEY, SCHEME_KEY] {
        if !matches!(map.get(key), Some(Value::Array(_))) {
            map.insert(key, Value::Array(Array::new()));
        }
    }
    let mut data = None;
    let mut columns = None;
    for (key, value) in map.iter_mut() {
        match (&**key, value) {
            (DATA_KEY, Value::Array(items)) => data = Some(items),
            (SCHEME_KEY, Value::Array(items)) => columns = Some(items),
            _ => {}
        }
    }
    data.zip(columns)
        .ok_or_else(|| Error::internal("malformed record shell"))
}

/// Reads the value of a named column out of a row given in any dialect.
fn row_value(row: &Value, name: &str) -> Value {
    match row.get(DATA_KEY) {
        Some(Value::Array(data)) => position(row, name)
            .and_then(|index| data.get(index).cloned())
            .unwrap_or_default(),
        _ => row.get(name).cloned().unwrap_or_default(),
    }
}

/// Aligns a row to the columns of a table.
fn align(row: &Value, columns: &[Arc<str>]) -> Array {
    columns.iter().map(|name| row_value(row, name)).collect()
}

/// Gives a table without columns the columns of its first row.
fn adopt_columns(raw: &mut Value, row: &Value) -> Result<()> {
    let adopted: Array = match scheme(row) {
        Some(columns) => columns.clone(),
        None => row
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(name, value)| column(&FieldDescriptor::new(name.clone(), Type::of(value))))
                    .collect()
            })
            .unwrap_or_default(),
    };
    let (_, columns) = parts_mut(raw, RECORDSET_TYPE)?;
    *columns = adopted;
    Ok(())
}

impl RecordAdapter for SbisAdapter {
    fn empty(&self) -> Value {
        shell(RECORD_TYPE, Array::new(), Array::new())
    }

    fn has(&self, raw: &Value, name: &str) -> bool {
        position(raw, name).is_some()
    }

    fn get(&self, raw: &Value, name: &str) -> Value {
        let Some(index) = position(raw, name) else {
            return Value::Undefined;
        };
        raw.get(DATA_KEY)
            .and_then(Value::as_array)
            .and_then(|data| data.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, raw: &mut Value, name: &str, value: Value) -> Result<()> {
        let index = position(raw, name).ok_or_else(|| Error::field_not_found(name))?;
        let (data, _) = parts_mut(raw, RECORD_TYPE)?;
        while data.len() <= index {
            data.push(Value::Null);
        }
        data.set(index, value);
        Ok(())
    }

    fn fields(&self, raw: &Value) -> Vec<Arc<str>> {
        names(raw)
    }

    fn field_format(&self, raw: &Value, name: &str) -> Option<FieldDescriptor> {
        field_format(raw, name)
    }

    fn add_field(&self, raw: &mut Value, field: &FieldDescriptor, at: Option<usize>) -> Result<()> {
        if position(raw, &field.name).is_some() {
            return Err(Error::duplicate_field(field.name.to_string()));
        }
        let (data, columns) = parts_mut(raw, RECORD_TYPE)?;
        let index = at.unwrap_or(columns.len()).min(columns.len());
        while data.len() < columns.len() {
            data.push(Value::Null);
        }
        columns.insert(index, column(field));
        data.insert(index, field.default_value());
        Ok(())
    }

    fn remove_field(&self, raw: &mut Value, name: &str) -> Result<()> {
        let index = position(raw, name).ok_or_else(|| Error::field_not_found(name))?;
        let (data, columns) = parts_mut(raw, RECORD_TYPE)?;
        columns.remove(index);
        data.remove(index);
        Ok(())
    }
}

impl TableAdapter for SbisAdapter {
    fn empty(&self, format: &Format) -> Value {
        shell(
            RECORDSET_TYPE,
            Array::new(),
            format.iter().map(column).collect(),
        )
    }

    fn count(&self, raw: &Value) -> usize {
        raw.get(DATA_KEY).and_then(Value::as_array).map_or(0, Array::len)
    }

    fn at(&self, raw: &Value, index: usize) -> Option<Value> {
        let row = raw.get(DATA_KEY)?.as_array()?.get(index)?.clone();
        let columns = scheme(raw).cloned().unwrap_or_default();
        let Value::Array(data) = row else {
            return None;
        };
        Some(shell(RECORD_TYPE, data, columns))
    }

    fn add(&self, raw: &mut Value, row: Value, at: Option<usize>) -> Result<()> {
        if names(raw).is_empty() {
            adopt_columns(raw, &row)?;
        }
        let columns = names(raw);
        let (rows, _) = parts_mut(raw, RECORDSET_TYPE)?;
        match at {
            Some(index) if index > rows.len() => {
                return Err(Error::index_out_of_bounds(index, rows.len()));
            }
            Some(index) => rows.insert(index, align(&row, &columns).into()),
            None => rows.push(align(&row, &columns).into()),
        }
        Ok(())
    }

    fn remove(&self, raw: &mut Value, index: usize) -> Result<()> {
        let (rows, _) = parts_mut(raw, RECORDSET_TYPE)?;
        let length = rows.len();
        rows.remove(index)
            .map(|_| ())
            .ok_or_else(|| Error::index_out_of_bounds(index, length))
    }

    fn replace(&self, raw: &mut Value, row: Value, index: usize) -> Result<()> {
        let columns = names(raw);
        let (rows, _) = parts_mut(raw, RECORDSET_TYPE)?;
        let length = rows.len();
        rows.set(index, align(&row, &columns).into())
            .map(|_| ())
            .ok_or_else(|| Error::index_out_of_bounds(index, length))
    }

    fn fields(&self, raw: &Value) -> Vec<Arc<str>> {
        names(raw)
    }

    fn field_format(&self, raw: &Value, name: &str) -> Option<FieldDescriptor> {
        field_format(raw, name)
    }

    fn add_field(&self, raw: &mut Value, field: &FieldDescriptor, at: Option<usize>) -> Result<()> {
        if position(raw, &field.name).is_some() {
            return Err(Error::duplicate_field(field.name.to_string()));
        }
        let (rows, columns) = parts_mut(raw, RECORDSET_TYPE)?;
        let index = at.unwrap_or(columns.len()).min(columns.len());
        columns.insert(index, column(field));
        let default = field.default_value();
        for row in 0..rows.len() {
            if let Some(Value::Array(data)) = rows.get_mut(row) {
                data.insert(index, default.clone());
            }
        }
        Ok(())
    }

    fn remove_field(&self, raw: &mut Value, name: &str) -> Result<()> {
        let index = position(raw, name).ok_or_else(|| Error::field_not_found(name))?;
        let (rows, columns) = parts_mut(raw, RECORDSET_TYPE)?;
        columns.remove(index);
        for row in 0..rows.len() {
            if let Some(Value::Array(data)) = rows.get_mut(row) {
                data.remove(index);
            }
        }
        Ok(())
    }
}

impl Adapter for SbisAdapter {
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
