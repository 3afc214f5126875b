use std::sync::Arc;

use quire_foundation::Value;
use quire_relation::{ChangeData, child_changed};
use tracing::warn;

use super::{ChangedField, Record};
use crate::convert;
use crate::format::FieldDescriptor;
use crate::nested::Nested;
use crate::state::RecordState;

impl Record {
    /// Names of the changed fields, in the order they first changed.
    #[must_use]
    pub fn get_changed(&self) -> Vec<Arc<str>> {
        self.changed
            .borrow()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Returns true if any field changed since the last accept.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.changed.borrow().is_empty()
    }

    /// Returns true if the field changed since the last accept.
    #[must_use]
    pub fn is_field_changed(&self, name: &str) -> bool {
        self.changed.borrow().iter().any(|entry| &*entry.name == name)
    }

    /// Value the field had when changes were last accepted.
    #[must_use]
    pub fn get_original(&self, name: &str) -> Value {
        let original = self
            .changed
            .borrow()
            .iter()
            .find(|entry| &*entry.name == name)
            .map(|entry| entry.original.clone());
        original.unwrap_or_else(|| self.get(name))
    }

    /// Makes the current values the accepted ones.
    ///
    /// With `fields`, only those fields are accepted. Nested enums and flags
    /// are always accepted with their field; nested records and recordsets
    /// only with `cascade`. With `spread` the owners are told.
    pub fn accept_changes(&self, fields: Option<&[&str]>, spread: bool, cascade: bool) {
        {
            let mut changed = self.changed.borrow_mut();
            match fields {
                None => changed.clear(),
                Some(names) => changed.retain(|entry| !names.contains(&&*entry.name)),
            }
        }
        for nested in self.nested_values(fields) {
            nested.accept(cascade);
        }

        let before = self.state.get();
        if !self.is_changed() {
            let state = before.accepted();
            self.state.set(state);
            self.accepted_state.set(state);
        }
        self.notify_state(before);

        if spread {
            self.spread(ChangeData::Accept);
        }
    }

    /// Restores the accepted values.
    ///
    /// Takes the same arguments as [`Self::accept_changes`].
    pub fn reject_changes(&self, fields: Option<&[&str]>, spread: bool, cascade: bool) {
        let targets: Vec<ChangedField> = self
            .changed
            .borrow()
            .iter()
            .filter(|entry| fields.is_none_or(|names| names.contains(&&*entry.name)))
            .cloned()
            .collect();

        let version = self.core.version();
        let outer = !version.is_locked();
        version.lock();
        let before = self.state.get();

        let mut restores = Vec::new();
        for entry in targets {
            if entry.by_reference {
                if let Some(nested) = Nested::of(&entry.original) {
                    nested.reject(cascade);
                }
                self.forget(&entry.name);
            } else {
                restores.push((entry.name, entry.original));
            }
        }
        if let Err(error) = self.set_many(restores.iter().cloned()) {
            warn!(%error, "cannot restore every original value");
        }
        for (name, original) in &restores {
            self.forget(name);
            if let Some(nested) = Nested::of(original) {
                nested.reject(cascade);
            }
        }
        for (name, nested) in self.cached_nested(fields) {
            if !self.is_field_changed(&name) {
                nested.reject(cascade);
            }
        }

        if !self.is_changed() {
            self.state.set(self.accepted_state.get());
        }
        self.notify_state(before);
        if outer {
            version.unlock(true);
        }

        if spread {
            self.spread(ChangeData::Reject);
        }
    }

    /// Records a change of a field, or drops the record if the field is back
    /// to its original value.
    pub(super) fn track(&self, name: &Arc<str>, old: Value, raw: &Value, field: &FieldDescriptor) {
        let mut changed = self.changed.borrow_mut();
        let Some(index) = changed.iter().position(|entry| entry.name == *name) else {
            changed.push(ChangedField {
                name: name.clone(),
                original: old,
                by_reference: false,
            });
            return;
        };
        let entry = &mut changed[index];
        if entry.by_reference {
            entry.by_reference = false;
            return;
        }
        if convert::raw_form(&entry.original, field).deep_equal(raw) {
            changed.remove(index);
        }
    }

    /// Marks a field whose nested entity changed inside.
    pub(super) fn mark_reference(&self, name: &Arc<str>, child: &Value) {
        let mut changed = self.changed.borrow_mut();
        if changed.iter().any(|entry| entry.name == *name) {
            return;
        }
        changed.push(ChangedField {
            name: name.clone(),
            original: child.clone(),
            by_reference: true,
        });
    }

    /// Unmarks a field whose nested entity is no longer changed.
    pub(super) fn unmark_reference(&self, name: &str) {
        self.changed
            .borrow_mut()
            .retain(|entry| !(entry.by_reference && &*entry.name == name));
    }

    fn forget(&self, name: &str) {
        self.changed.borrow_mut().retain(|entry| &*entry.name != name);
    }

    /// Moves between `Unchanged` and `Changed` as markers come and go.
    pub(super) fn sync_state(&self) {
        let changed = self.is_changed();
        let state = self.state.get();
        let next = match state {
            RecordState::Unchanged if changed => RecordState::Changed,
            RecordState::Changed if !changed => self.accepted_state.get(),
            other => other,
        };
        self.state.set(next);
    }

    fn nested_values(&self, fields: Option<&[&str]>) -> Vec<Nested> {
        self.cached_nested(fields)
            .into_iter()
            .map(|(_, nested)| nested)
            .collect()
    }

    fn cached_nested(&self, fields: Option<&[&str]>) -> Vec<(Arc<str>, Nested)> {
        self.cache
            .borrow()
            .iter()
            .filter(|(name, _)| fields.is_none_or(|names| names.contains(&&***name)))
            .filter_map(|(name, value)| Some((name.clone(), Nested::of(value)?)))
            .collect()
    }

    fn spread(&self, data: ChangeData) {
        if let Some(this) = self.participant() {
            child_changed(&this, data);
        }
    }
}
