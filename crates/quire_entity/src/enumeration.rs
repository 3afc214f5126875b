//! Dictionaries and single-choice enum values.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use quire_foundation::{
    Error, Instance, InstanceId, Result, Serializable, Type, Value, object,
};
use quire_relation::{
    ChangeData, Mediator, Participant, ParticipantRef, VersionTracked, Version, bump_version,
    child_changed, destroy_cascade,
};
use serde::{Deserialize, Serialize};

use crate::base::EntityCore;
use crate::observable::{Event, ON_CHANGE, SubscriptionId};

/// Module name enums are registered under.
pub const ENUM_MODULE: &str = "entity.Enum";

/// Ordered value space of enums and flags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary(Vec<Arc<str>>);

impl Dictionary {
    /// Creates a dictionary.
    #[must_use]
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self(entries.into_iter().map(Into::into).collect())
    }

    /// Reads a dictionary from an array of strings. Other entries are skipped.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        value
            .as_array()
            .map(|items| Self::new(items.iter().filter_map(Value::as_str)))
            .unwrap_or_default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry at an ordinal.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<str>> {
        self.0.get(index)
    }

    /// Ordinal of an entry.
    #[must_use]
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.0.iter().position(|entry| &**entry == value)
    }

    /// Iterates over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<str>> {
        self.0.iter()
    }

    /// The entries as an array value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from(self.0.clone())
    }

    pub(crate) fn check(&self, index: usize) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(Error::index_out_of_bounds(index, self.len()))
        }
    }
}

impl From<&[Arc<str>]> for Dictionary {
    fn from(entries: &[Arc<str>]) -> Self {
        Self(entries.to_vec())
    }
}

impl<S: Into<Arc<str>>> FromIterator<S> for Dictionary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

pub(crate) fn index_value(index: Option<usize>) -> Value {
    index.map_or(Value::Null, |i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
}

pub(crate) fn value_index(value: &Value) -> Option<usize> {
    value.as_int().and_then(|i| usize::try_from(i).ok())
}

/// One selected entry of a dictionary, or none.
///
/// Setting a new value marks the enum changed. Setting the accepted value
/// back while changed rejects the changes and notifies the owners.
pub struct Enum {
    self_ref: Weak<Enum>,
    core: EntityCore,
    dictionary: Dictionary,
    current: Cell<Option<usize>>,
    accepted: Cell<Option<usize>>,
}

impl Enum {
    /// Creates an enum.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `index` is outside the dictionary.
    pub fn new(dictionary: impl Into<Dictionary>, index: Option<usize>) -> Result<Rc<Self>> {
        let dictionary = dictionary.into();
        if let Some(index) = index {
            dictionary.check(index)?;
        }
        Ok(Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            core: EntityCore::new(),
            dictionary,
            current: Cell::new(index),
            accepted: Cell::new(index),
        }))
    }

    /// Creates an enum from a raw value: an ordinal, an entry or null.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for other values, `IndexOutOfBounds` for bad
    /// ordinals and `UnknownEntry` for unknown entries.
    pub fn from_raw(dictionary: impl Into<Dictionary>, raw: &Value) -> Result<Rc<Self>> {
        let dictionary = dictionary.into();
        let index = match raw {
            Value::Null | Value::Undefined => None,
            Value::Int(_) => Some(
                value_index(raw).ok_or_else(|| Error::invalid_value("enum ordinal", raw.describe()))?,
            ),
            Value::String(entry) => Some(
                dictionary
                    .index_of(entry)
                    .ok_or_else(|| Error::unknown_entry("enum value", entry.to_string()))?,
            ),
            other => return Err(Error::type_mismatch(Type::Enum, other.describe())),
        };
        Self::new(dictionary, index)
    }

    /// The dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Selected ordinal.
    #[must_use]
    pub fn get(&self) -> Option<usize> {
        self.current.get()
    }

    /// Selects an ordinal.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `index` is outside the dictionary.
    pub fn set(&self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            self.dictionary.check(index)?;
        }
        if index == self.current.get() {
            return Ok(());
        }
        if self.is_changed() && index == self.accepted.get() {
            self.reject_changes(true);
            return Ok(());
        }
        self.current.set(index);
        self.changed();
        Ok(())
    }

    /// Selected entry.
    #[must_use]
    pub fn get_as_value(&self) -> Option<Arc<str>> {
        self.current
            .get()
            .and_then(|index| self.dictionary.get(index).cloned())
    }

    /// Selects an entry.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntry` if the entry is not in the dictionary.
    pub fn set_by_value(&self, value: &str) -> Result<()> {
        let index = self
            .dictionary
            .index_of(value)
            .ok_or_else(|| Error::unknown_entry("enum value", value))?;
        self.set(Some(index))
    }

    /// Returns true if the selection differs from the accepted one.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.current.get() != self.accepted.get()
    }

    /// Accepted ordinal.
    #[must_use]
    pub fn get_original(&self) -> Option<usize> {
        self.accepted.get()
    }

    /// Makes the current selection the accepted one.
    pub fn accept_changes(&self, spread: bool) {
        self.accepted.set(self.current.get());
        if spread {
            self.spread(ChangeData::Accept);
        }
    }

    /// Restores the accepted selection.
    pub fn reject_changes(&self, spread: bool) {
        if self.is_changed() {
            self.current.set(self.accepted.get());
            self.changed();
        }
        if spread {
            self.spread(ChangeData::Reject);
        }
    }

    /// Independent copy with the same selection and accepted ordinal.
    #[must_use]
    pub fn clone_enum(&self) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            core: EntityCore::new(),
            dictionary: self.dictionary.clone(),
            current: Cell::new(self.current.get()),
            accepted: Cell::new(self.accepted.get()),
        })
    }

    /// Same dictionary and same selection.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.dictionary == other.dictionary && self.current.get() == other.current.get()
    }

    /// Version counter value.
    #[must_use]
    pub fn get_version(&self) -> u64 {
        self.core.version().get()
    }

    /// Subscribes to an event.
    pub fn subscribe(&self, event: &str, handler: impl Fn(&Event) + 'static) -> SubscriptionId {
        self.core.subscribe(event, handler)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.unsubscribe(id)
    }

    /// Switches event raising.
    pub fn set_event_raising(&self, enabled: bool) {
        self.core.notifier().set_event_raising(enabled);
    }

    /// Rebuilds an enum from its serialized state.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if a stored ordinal is outside the dictionary.
    pub fn from_state(state: &Value) -> Result<Rc<Self>> {
        let dictionary = state
            .get("dictionary")
            .map(Dictionary::from_value)
            .unwrap_or_default();
        let this = Self::new(dictionary, state.get("value").and_then(value_index))?;
        let accepted = state.get("accepted").and_then(value_index);
        if let Some(index) = accepted {
            this.dictionary.check(index)?;
        }
        this.accepted.set(accepted);
        Ok(this)
    }

    fn participant(&self) -> Option<ParticipantRef> {
        self.self_ref.upgrade().map(|this| this as ParticipantRef)
    }

    fn spread(&self, data: ChangeData) {
        if let Some(this) = self.participant() {
            child_changed(&this, data);
        }
    }

    fn changed(&self) {
        bump_version(self);
        let index = index_value(self.current.get());
        let entry = Value::from(self.get_as_value());
        self.core.notify(ON_CHANGE, vec![index.clone(), entry]);
        self.spread(ChangeData::field("value", index));
    }
}

impl std::fmt::Debug for Enum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enum")
            .field("id", &self.core.id())
            .field("value", &self.get_as_value())
            .field("changed", &self.is_changed())
            .finish()
    }
}

impl Participant for Enum {
    fn instance_id(&self) -> InstanceId {
        self.core.id()
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }

    fn mediator(&self) -> Option<Mediator> {
        self.core.mediator()
    }

    fn adopt_mediator(&self, mediator: Mediator) {
        self.core.adopt(mediator);
    }

    fn versioned(&self) -> Option<&dyn VersionTracked> {
        Some(self)
    }

    fn destroy(&self) {
        self.core.mark_destroyed();
        destroy_cascade(self);
    }
}

impl VersionTracked for Enum {
    fn version(&self) -> &Version {
        self.core.version()
    }
}

impl Serializable for Enum {
    fn module_name(&self) -> Option<&str> {
        Some(ENUM_MODULE)
    }

    fn serializable_state(&self) -> Result<Value> {
        Ok(object! {
            "dictionary" => self.dictionary.to_value(),
            "value" => index_value(self.current.get()),
            "accepted" => index_value(self.accepted.get()),
        })
    }

    fn is_equal(&self, other: &Instance) -> bool {
        other
            .downcast::<Self>()
            .is_some_and(|other| Enum::is_equal(self, &other))
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}
