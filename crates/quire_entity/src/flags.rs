//! Sets of tri-state flags over a dictionary.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use quire_foundation::{Array, Error, Instance, InstanceId, Result, Serializable, Type, Value, object};
use quire_relation::{
    ChangeData, Mediator, Participant, ParticipantRef, Version, VersionTracked, bump_version,
    child_changed, destroy_cascade,
};

use crate::base::EntityCore;
use crate::enumeration::{Dictionary, index_value, value_index};
use crate::observable::{Event, ON_CHANGE, SubscriptionId};

/// Module name flags are registered under.
pub const FLAGS_MODULE: &str = "entity.Flags";

fn flag_value(flag: Option<bool>) -> Value {
    Value::from(flag)
}

fn value_flag(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null | Value::Undefined => Ok(None),
        Value::Bool(flag) => Ok(Some(*flag)),
        other => Err(Error::type_mismatch(Type::Boolean, other.describe())),
    }
}

/// One true, false or null flag per dictionary entry.
///
/// Every flag tracks its own original value; a flag set back to its
/// original is no longer changed.
pub struct Flags {
    self_ref: Weak<Flags>,
    core: EntityCore,
    dictionary: Dictionary,
    values: RefCell<Vec<Option<bool>>>,
    changed: RefCell<BTreeMap<usize, Option<bool>>>,
}

impl Flags {
    /// Creates flags, all null.
    #[must_use]
    pub fn new(dictionary: impl Into<Dictionary>) -> Rc<Self> {
        let dictionary = dictionary.into();
        let values = vec![None; dictionary.len()];
        Self::build(dictionary, values)
    }

    /// Creates flags from values aligned to the dictionary.
    ///
    /// Missing values are null; extra values are dropped.
    #[must_use]
    pub fn with_values(dictionary: impl Into<Dictionary>, values: &[Option<bool>]) -> Rc<Self> {
        let dictionary = dictionary.into();
        let mut aligned = values.to_vec();
        aligned.resize(dictionary.len(), None);
        Self::build(dictionary, aligned)
    }

    /// Creates flags from a raw array of booleans and nulls.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the raw value is not such an array.
    pub fn from_raw(dictionary: impl Into<Dictionary>, raw: &Value) -> Result<Rc<Self>> {
        let values = match raw {
            Value::Null | Value::Undefined => Vec::new(),
            Value::Array(items) => items.iter().map(value_flag).collect::<Result<_>>()?,
            other => return Err(Error::type_mismatch(Type::Flags, other.describe())),
        };
        Ok(Self::with_values(dictionary, &values))
    }

    fn build(dictionary: Dictionary, values: Vec<Option<bool>>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            core: EntityCore::new(),
            dictionary,
            values: RefCell::new(values),
            changed: RefCell::new(BTreeMap::new()),
        })
    }

    /// The dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Flag of an entry.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntry` for names outside the dictionary.
    pub fn get(&self, name: &str) -> Result<Option<bool>> {
        let index = self.index_of(name)?;
        Ok(self.values.borrow()[index])
    }

    /// Sets the flag of an entry.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntry` for names outside the dictionary.
    pub fn set(&self, name: &str, flag: Option<bool>) -> Result<()> {
        let index = self.index_of(name)?;
        if self.apply(index, flag) {
            self.changed(vec![Value::from(name), flag_value(flag)]);
        }
        Ok(())
    }

    /// Flag at an ordinal.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<Option<bool>> {
        self.values.borrow().get(index).copied()
    }

    /// Sets the flag at an ordinal.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` for ordinals outside the dictionary.
    pub fn set_by_index(&self, index: usize, flag: Option<bool>) -> Result<()> {
        self.dictionary.check(index)?;
        if self.apply(index, flag) {
            let name = Value::from(self.dictionary.get(index).cloned());
            self.changed(vec![name, flag_value(flag)]);
        }
        Ok(())
    }

    /// Sets every flag to true.
    pub fn set_true_all(&self) {
        self.set_all(Some(true));
    }

    /// Sets every flag to false.
    pub fn set_false_all(&self) {
        self.set_all(Some(false));
    }

    /// Sets every flag to null.
    pub fn set_null_all(&self) {
        self.set_all(None);
    }

    /// Replaces all flags at once, raising a single event.
    ///
    /// Missing values are null; extra values are dropped.
    pub fn from_array(&self, values: &[Option<bool>]) {
        let mut any = false;
        for index in 0..self.dictionary.len() {
            let flag = values.get(index).copied().flatten();
            any |= self.apply(index, flag);
        }
        if any {
            self.changed(vec![self.to_value()]);
        }
    }

    /// All flags in dictionary order.
    #[must_use]
    pub fn to_array(&self) -> Vec<Option<bool>> {
        self.values.borrow().clone()
    }

    /// Calls `f` with every entry and its flag.
    pub fn each(&self, mut f: impl FnMut(&Arc<str>, Option<bool>)) {
        let values = self.to_array();
        for (name, flag) in self.dictionary.iter().zip(values) {
            f(name, flag);
        }
    }

    /// Returns true if any flag differs from its original.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.changed.borrow().is_empty()
    }

    /// Original flag of an entry, or the current one if it did not change.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntry` for names outside the dictionary.
    pub fn get_original(&self, name: &str) -> Result<Option<bool>> {
        let index = self.index_of(name)?;
        match self.changed.borrow().get(&index) {
            Some(original) => Ok(*original),
            None => Ok(self.values.borrow()[index]),
        }
    }

    /// Forgets the originals.
    pub fn accept_changes(&self, spread: bool) {
        self.changed.borrow_mut().clear();
        if spread {
            self.spread(ChangeData::Accept);
        }
    }

    /// Restores the originals.
    pub fn reject_changes(&self, spread: bool) {
        let originals = std::mem::take(&mut *self.changed.borrow_mut());
        if !originals.is_empty() {
            {
                let mut values = self.values.borrow_mut();
                for (index, original) in originals {
                    values[index] = original;
                }
            }
            self.changed(vec![self.to_value()]);
        }
        if spread {
            self.spread(ChangeData::Reject);
        }
    }

    /// Independent copy with the same flags and originals.
    #[must_use]
    pub fn clone_flags(&self) -> Rc<Self> {
        let copy = Self::build(self.dictionary.clone(), self.values.borrow().clone());
        copy.changed.borrow_mut().clone_from(&self.changed.borrow());
        copy
    }

    /// Same dictionary and same flags.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.dictionary == other.dictionary && *self.values.borrow() == *other.values.borrow()
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

    /// The flags as an array value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.values
            .borrow()
            .iter()
            .copied()
            .map(flag_value)
            .collect::<Array>()
            .into()
    }

    /// Rebuilds flags from their serialized state.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if stored values are not booleans or nulls.
    pub fn from_state(state: &Value) -> Result<Rc<Self>> {
        let dictionary = state
            .get("dictionary")
            .map(Dictionary::from_value)
            .unwrap_or_default();
        let this = Self::from_raw(dictionary, state.get("values").unwrap_or(&Value::Null))?;
        if let Some(changed) = state.get("changed").and_then(Value::as_array) {
            let mut originals = this.changed.borrow_mut();
            for entry in changed.iter() {
                let index = entry.as_array().and_then(|pair| pair.get(0)).and_then(value_index);
                let original = entry.as_array().and_then(|pair| pair.get(1));
                if let (Some(index), Some(original)) = (index, original) {
                    this.dictionary.check(index)?;
                    originals.insert(index, value_flag(original)?);
                }
            }
        }
        Ok(this)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.dictionary
            .index_of(name)
            .ok_or_else(|| Error::unknown_entry("flag", name))
    }

    fn set_all(&self, flag: Option<bool>) {
        self.from_array(&vec![flag; self.dictionary.len()]);
    }

    /// Writes one flag and updates its original. Returns false if nothing changed.
    fn apply(&self, index: usize, flag: Option<bool>) -> bool {
        let previous = {
            let mut values = self.values.borrow_mut();
            let previous = values[index];
            if previous == flag {
                return false;
            }
            values[index] = flag;
            previous
        };
        let mut changed = self.changed.borrow_mut();
        match changed.get(&index) {
            Some(original) if *original == flag => {
                changed.remove(&index);
            }
            Some(_) => {}
            None => {
                changed.insert(index, previous);
            }
        }
        true
    }

    fn participant(&self) -> Option<ParticipantRef> {
        self.self_ref.upgrade().map(|this| this as ParticipantRef)
    }

    fn spread(&self, data: ChangeData) {
        if let Some(this) = self.participant() {
            child_changed(&this, data);
        }
    }

    fn changed(&self, args: Vec<Value>) {
        bump_version(self);
        self.core.notify(ON_CHANGE, args);
        self.spread(ChangeData::field("values", self.to_value()));
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flags")
            .field("id", &self.core.id())
            .field("values", &self.values.borrow())
            .field("changed", &self.is_changed())
            .finish()
    }
}

impl Participant for Flags {
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

impl VersionTracked for Flags {
    fn version(&self) -> &Version {
        self.core.version()
    }
}

impl Serializable for Flags {
    fn module_name(&self) -> Option<&str> {
        Some(FLAGS_MODULE)
    }

    fn serializable_state(&self) -> Result<Value> {
        let changed: Array = self
            .changed
            .borrow()
            .iter()
            .map(|(index, original)| {
                Value::from(vec![index_value(Some(*index)), flag_value(*original)])
            })
            .collect();
        Ok(object! {
            "dictionary" => self.dictionary.to_value(),
            "values" => self.to_value(),
            "changed" => changed,
        })
    }

    fn is_equal(&self, other: &Instance) -> bool {
        other
            .downcast::<Self>()
            .is_some_and(|other| Flags::is_equal(self, &other))
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}
