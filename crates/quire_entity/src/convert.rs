//! Conversion between raw values and typed field values.

use quire_foundation::{Array, Error, Instance, Result, Type, Value};
use tracing::warn;

use crate::adapter::AdapterRef;
use crate::enumeration::{Dictionary, Enum, index_value, value_index};
use crate::flags::Flags;
use crate::format::FieldDescriptor;
use crate::nested::Nested;
use crate::record::{Record, RecordOptions};
use crate::recordset::{RecordSet, RecordSetOptions};

/// Turns a raw value into the value of a field.
///
/// Scalars are coerced to the field type where that is lossless enough;
/// values that do not fit are returned as they are. Complex types become
/// live instances sharing the owner's adapter.
///
/// # Errors
///
/// Returns an error if a complex value cannot be built from the raw value.
pub fn cast(raw: &Value, field: &FieldDescriptor, adapter: &AdapterRef) -> Result<Value> {
    if raw.is_instance() {
        return Ok(raw.clone());
    }
    let value = match &field.ty {
        Type::Enum => Value::Instance(Instance::new(Enum::from_raw(
            Dictionary::from(field.dictionary()),
            raw,
        )?)),
        Type::Flags => Value::Instance(Instance::new(Flags::from_raw(
            Dictionary::from(field.dictionary()),
            raw,
        )?)),
        _ if raw.is_nullish() => Value::Null,
        Type::Record => Value::Instance(Instance::new(Record::with_options(
            RecordOptions::new()
                .with_adapter(adapter.clone())
                .with_raw_data(raw.clone()),
        )?)),
        Type::RecordSet => Value::Instance(Instance::new(RecordSet::with_options(
            RecordSetOptions::new()
                .with_adapter(adapter.clone())
                .with_raw_data(raw.clone()),
        )?)),
        ty => scalar(raw, ty).unwrap_or_else(|| {
            warn!(field = %field.name, expected = %ty, actual = %raw.describe(), "raw value kept as is");
            raw.clone()
        }),
    };
    Ok(value)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn scalar(raw: &Value, ty: &Type) -> Option<Value> {
    Some(match (ty, raw) {
        (Type::Any | Type::Object, _) => raw.clone(),
        (Type::Boolean, Value::Bool(_))
        | (Type::Integer | Type::Identity, Value::Int(_))
        | (Type::Real | Type::Money, Value::Float(_)) => raw.clone(),
        (Type::Boolean, Value::Int(n)) => Value::Bool(*n != 0),
        (Type::Boolean, Value::String(s)) => Value::Bool(s.parse().ok()?),
        (Type::Integer | Type::Identity, Value::Float(n)) if n.fract() == 0.0 => Value::Int(*n as i64),
        (Type::Integer | Type::Identity, Value::String(s)) => Value::Int(s.trim().parse().ok()?),
        (Type::Real | Type::Money, Value::Int(n)) => Value::Float(*n as f64),
        (Type::Real | Type::Money, Value::String(s)) => Value::Float(s.trim().parse().ok()?),
        (ty, Value::String(_)) if ty.is_textual() => raw.clone(),
        (ty, Value::Int(_) | Value::Float(_) | Value::Bool(_)) if ty.is_textual() => {
            Value::from(format!("{raw:?}"))
        }
        (Type::Array(element), Value::Array(items)) => items
            .iter()
            .map(|item| scalar(item, element).unwrap_or_else(|| item.clone()))
            .collect::<Array>()
            .into(),
        _ => return None,
    })
}

/// Turns the value of a field into its raw form.
///
/// # Errors
///
/// Returns `TypeMismatch` if the value does not fit the field type,
/// `InvalidValue` for null in a non-nullable field, and the errors of the
/// enum and flags checks for values outside their dictionary.
#[allow(clippy::cast_precision_loss)]
pub fn serialize(value: &Value, field: &FieldDescriptor) -> Result<Value> {
    if value.is_nullish() {
        if !field.nullable {
            return Err(Error::invalid_value(
                format!("field {}", field.name),
                "null",
            ));
        }
        return Ok(Value::Null);
    }
    if let Some(instance) = value.as_instance() {
        return serialize_instance(value, instance, field);
    }
    match (&field.ty, value) {
        (Type::Enum, Value::Int(_)) => {
            let dictionary = Dictionary::from(field.dictionary());
            let index = value_index(value)
                .ok_or_else(|| Error::invalid_value("enum ordinal", value.describe()))?;
            dictionary.check(index)?;
            Ok(value.clone())
        }
        (Type::Enum, Value::String(entry)) => {
            let dictionary = Dictionary::from(field.dictionary());
            let index = dictionary
                .index_of(entry)
                .ok_or_else(|| Error::unknown_entry("enum value", entry.to_string()))?;
            Ok(index_value(Some(index)))
        }
        (Type::Flags, Value::Array(_)) => {
            let flags = Flags::from_raw(Dictionary::from(field.dictionary()), value)?;
            Ok(flags.to_value())
        }
        (Type::Record | Type::RecordSet, Value::Object(_) | Value::Array(_)) => Ok(value.clone()),
        (Type::Real | Type::Money, Value::Int(n)) => Ok(Value::Float(*n as f64)),
        (Type::Array(element), Value::Array(items)) => {
            if let Some(bad) = items.iter().find(|item| !element.accepts(item)) {
                return Err(Error::type_mismatch((**element).clone(), bad.describe()));
            }
            Ok(value.clone())
        }
        (ty, _) if ty.accepts(value) && !ty.is_complex() => Ok(value.clone()),
        (ty, _) => Err(Error::type_mismatch(ty.clone(), value.describe())),
    }
}

fn serialize_instance(value: &Value, instance: &Instance, field: &FieldDescriptor) -> Result<Value> {
    let Some(nested) = Nested::of_instance(instance) else {
        // Foreign instances only fit untyped fields
        return match field.ty {
            Type::Any | Type::Object => Ok(value.clone()),
            _ => Err(Error::type_mismatch(field.ty.clone(), value.describe())),
        };
    };
    let fits = matches!(
        (&field.ty, &nested),
        (Type::Any | Type::Object, _)
            | (Type::Record, Nested::Record(_) | Nested::Model(_))
            | (Type::RecordSet, Nested::Set(_))
            | (Type::Enum, Nested::Enum(_))
            | (Type::Flags, Nested::Flags(_))
    );
    if !fits {
        return Err(Error::type_mismatch(field.ty.clone(), value.describe()));
    }
    Ok(nested.raw())
}

/// Describes a new field from the first value written to it.
#[must_use]
pub fn infer_field(name: &str, value: &Value) -> FieldDescriptor {
    let Some(nested) = Nested::of(value) else {
        return FieldDescriptor::new(name, Type::of(value));
    };
    match nested {
        Nested::Record(_) | Nested::Model(_) => FieldDescriptor::new(name, Type::Record),
        Nested::Set(_) => FieldDescriptor::new(name, Type::RecordSet),
        Nested::Enum(value) => {
            FieldDescriptor::enumeration(name, value.dictionary().iter().cloned())
        }
        Nested::Flags(flags) => FieldDescriptor::flags(name, flags.dictionary().iter().cloned()),
    }
}

/// Returns true if two field values are the same for change tracking.
///
/// Instances are the same only if they are the same object; anything else
/// compares by its raw form.
pub(crate) fn same_value(old: &Value, new: &Value, field: &FieldDescriptor) -> bool {
    match (old, new) {
        (Value::Instance(a), Value::Instance(b)) => a.ptr_eq(b),
        (_, Value::Instance(_)) => false,
        _ => raw_form(old, field).deep_equal(&raw_form(new, field)),
    }
}

/// Raw form of a value, or the value itself if it has none.
pub(crate) fn raw_form(value: &Value, field: &FieldDescriptor) -> Value {
    serialize(value, field).unwrap_or_else(|_| value.clone())
}
