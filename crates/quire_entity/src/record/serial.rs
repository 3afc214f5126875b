use std::rc::Rc;
use std::sync::Arc;

use quire_foundation::{
    Array, Error, ErrorKind, Instance, Map, PathSegment, Result, Serializable, Value, display_path,
    object,
};

use super::{ChangedField, Record, RecordOptions};
use crate::adapter::{self, JsonAdapter};
use crate::format::FormatDeclaration;
use crate::nested::Nested;
use crate::state::RecordState;

/// Module name records are serialized under.
pub const RECORD_MODULE: &str = "entity.Record";

pub(crate) fn declaration_to_value(declared: Option<FormatDeclaration>) -> Result<Value> {
    let Some(declared) = declared else {
        return Ok(Value::Null);
    };
    serde_json::to_value(declared)
        .map(Value::from)
        .map_err(|error| Error::serialization(error.to_string()))
}

pub(crate) fn declaration_from_value(value: Option<&Value>) -> Result<Option<FormatDeclaration>> {
    match value {
        Some(value) if !value.is_nullish() => serde_json::from_value(value.to_json()?)
            .map(Some)
            .map_err(|error| Error::serialization(error.to_string())),
        _ => Ok(None),
    }
}

pub(crate) fn adapter_of(state: &Value) -> Result<adapter::AdapterRef> {
    adapter::resolve(
        state
            .get("adapter")
            .and_then(Value::as_str)
            .unwrap_or(JsonAdapter::NAME),
    )
}

fn state_of(state: &Value, key: &str) -> Result<Option<RecordState>> {
    state
        .get(key)
        .and_then(Value::as_str)
        .map(str::parse)
        .transpose()
}

impl Record {
    /// Rebuilds a record from its serialized state.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedModule` for an unknown adapter and
    /// `SerializationError` for a malformed format or state.
    pub fn from_state(state: &Value) -> Result<Rc<Self>> {
        let mut options = RecordOptions::new()
            .with_adapter(adapter_of(state)?)
            .with_raw_data(state.get("rawData").cloned().unwrap_or(Value::Null));
        options.format = declaration_from_value(state.get("format"))?;
        options.key_property = state
            .get("keyProperty")
            .and_then(Value::as_str)
            .map(Arc::from);
        if let Some(current) = state_of(state, "state")? {
            options.state = current;
        }
        let record = Self::with_options(options)?;
        record.restore_changes(state)?;
        Ok(record)
    }

    /// Accepted state and change markers, as written by [`Self::changes_state`].
    pub(crate) fn restore_changes(&self, state: &Value) -> Result<()> {
        if let Some(accepted) = state_of(state, "acceptedState")? {
            self.accepted_state.set(accepted);
        }
        if let Some(changed) = state.get("changed").and_then(Value::as_object) {
            for (name, entry) in changed.iter() {
                let original = entry
                    .as_array()
                    .and_then(|pair| pair.get(0))
                    .cloned()
                    .unwrap_or(Value::Null);
                let by_reference = entry
                    .as_array()
                    .and_then(|pair| pair.get(1))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                self.restore_marker(name.clone(), original, by_reference);
            }
        }
        Ok(())
    }

    /// Record state, accepted state and the changed fields with their originals.
    pub(crate) fn changes_state(&self) -> Value {
        let changed: Map = self
            .changed
            .borrow()
            .iter()
            .map(|entry| {
                let pair: Array = [entry.original.clone(), Value::Bool(entry.by_reference)]
                    .into_iter()
                    .collect();
                (entry.name.clone(), Value::Array(pair))
            })
            .collect();
        object! {
            "state" => self.state.get().name(),
            "acceptedState" => self.accepted_state.get().name(),
            "changed" => Value::Object(changed),
        }
    }

    pub(super) fn restore_marker(&self, name: Arc<str>, original: Value, by_reference: bool) {
        if by_reference && Nested::of(&original).is_some() {
            self.cache.borrow_mut().insert(name.clone(), original.clone());
            self.link(&original, &name);
        }
        let mut changed = self.changed.borrow_mut();
        changed.retain(|entry| entry.name != name);
        changed.push(ChangedField {
            name,
            original,
            by_reference,
        });
    }
}

impl Serializable for Record {
    fn module_name(&self) -> Option<&str> {
        Some(RECORD_MODULE)
    }

    fn serializable_state(&self) -> Result<Value> {
        let changes = self.changes_state();
        let part = |key: &str| changes.get(key).cloned().unwrap_or(Value::Null);
        Ok(object! {
            "rawData" => self.data.raw_data(),
            "adapter" => self.data.adapter().name(),
            "format" => declaration_to_value(self.data.declared())?,
            "state" => part("state"),
            "acceptedState" => part("acceptedState"),
            "changed" => part("changed"),
            "keyProperty" => self.key_property(),
        })
    }

    /// Originals of changed fields may be instances revived later.
    fn restore_link(&self, path: &[PathSegment], target: Value) -> Result<()> {
        let [PathSegment::Key(changed), PathSegment::Key(name), PathSegment::Index(0)] = path else {
            return Err(Error::new(ErrorKind::UnresolvedLink(display_path(path))));
        };
        if changed.as_ref() != "changed" {
            return Err(Error::new(ErrorKind::UnresolvedLink(display_path(path))));
        }
        let by_reference = self
            .changed
            .borrow()
            .iter()
            .find(|entry| entry.name == *name)
            .is_some_and(|entry| entry.by_reference);
        self.restore_marker(name.clone(), target, by_reference);
        Ok(())
    }

    fn is_equal(&self, other: &Instance) -> bool {
        other
            .downcast::<Self>()
            .is_some_and(|other| Record::is_equal(self, &other))
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}
