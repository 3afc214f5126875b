//! Entities stored as field values.

use std::rc::Rc;

use quire_foundation::{Instance, Value};
use quire_relation::ParticipantRef;

use crate::enumeration::{Enum, index_value};
use crate::flags::Flags;
use crate::model::Model;
use crate::record::Record;
use crate::recordset::RecordSet;

/// A field value that is itself a change-tracked entity.
#[derive(Clone)]
pub(crate) enum Nested {
    Record(Rc<Record>),
    Model(Rc<Model>),
    Set(Rc<RecordSet>),
    Enum(Rc<Enum>),
    Flags(Rc<Flags>),
}

impl Nested {
    pub(crate) fn of(value: &Value) -> Option<Self> {
        Self::of_instance(value.as_instance()?)
    }

    pub(crate) fn of_instance(instance: &Instance) -> Option<Self> {
        if let Some(record) = instance.downcast::<Record>() {
            return Some(Self::Record(record));
        }
        if let Some(model) = instance.downcast::<Model>() {
            return Some(Self::Model(model));
        }
        if let Some(set) = instance.downcast::<RecordSet>() {
            return Some(Self::Set(set));
        }
        if let Some(value) = instance.downcast::<Enum>() {
            return Some(Self::Enum(value));
        }
        instance.downcast::<Flags>().map(Self::Flags)
    }

    /// The participant linked into the owner's mediator.
    pub(crate) fn participant(&self) -> ParticipantRef {
        match self {
            Self::Record(record) => record.clone(),
            Self::Model(model) => model.record().clone(),
            Self::Set(set) => set.clone(),
            Self::Enum(value) => value.clone(),
            Self::Flags(flags) => flags.clone(),
        }
    }

    pub(crate) fn is_changed(&self) -> bool {
        match self {
            Self::Record(record) => record.is_changed(),
            Self::Model(model) => model.is_changed(),
            Self::Set(set) => set.is_changed(),
            Self::Enum(value) => value.is_changed(),
            Self::Flags(flags) => flags.is_changed(),
        }
    }

    /// Accepts nested changes. Enums and flags always follow their owner;
    /// records and recordsets only when cascading.
    pub(crate) fn accept(&self, cascade: bool) {
        match self {
            Self::Record(record) if cascade => record.accept_changes(None, false, true),
            Self::Model(model) if cascade => model.accept_changes(None, false, true),
            Self::Set(set) if cascade => set.accept_changes(false),
            Self::Enum(value) => value.accept_changes(false),
            Self::Flags(flags) => flags.accept_changes(false),
            _ => {}
        }
    }

    /// Rejects nested changes, with the same rules as [`Self::accept`].
    pub(crate) fn reject(&self, cascade: bool) {
        match self {
            Self::Record(record) if cascade => record.reject_changes(None, false, true),
            Self::Model(model) if cascade => model.reject_changes(None, false, true),
            Self::Set(set) if cascade => set.reject_changes(false),
            Self::Enum(value) => value.reject_changes(false),
            Self::Flags(flags) => flags.reject_changes(false),
            _ => {}
        }
    }

    /// Independent copy with the same data and changes.
    pub(crate) fn deep_clone(&self) -> Value {
        let instance = match self {
            Self::Record(record) => Instance::new(record.clone_record()),
            Self::Model(model) => Instance::new(model.clone_model()),
            Self::Set(set) => Instance::new(set.clone_set()),
            Self::Enum(value) => Instance::new(value.clone_enum()),
            Self::Flags(flags) => Instance::new(flags.clone_flags()),
        };
        Value::Instance(instance)
    }

    /// Raw form written into the owner's raw data.
    pub(crate) fn raw(&self) -> Value {
        match self {
            Self::Record(record) => record.get_raw_data(),
            Self::Model(model) => model.record().get_raw_data(),
            Self::Set(set) => set.get_raw_data(),
            Self::Enum(value) => index_value(value.get()),
            Self::Flags(flags) => flags.to_value(),
        }
    }
}
