//! Records: one row of raw data with typed field access and change tracking.
//!
//! A record reads and writes its raw data through an adapter. Complex field
//! values (nested records, recordsets, enums and flags) are built on first
//! read, cached, and linked below the record so their changes reach it.

mod changes;
mod relation;
pub(crate) mod serial;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use quire_foundation::{Error, ErrorKind, Instance, InstanceId, Map, Result, Type, Value};
use quire_relation::{ChangeData, ParticipantRef, bump_version, child_changed, destroy_cascade};
use tracing::{debug, warn};

use crate::adapter::{AdapterRef, default_adapter};
use crate::base::EntityCore;
use crate::convert;
use crate::format::{FieldDescriptor, Format, FormatDeclaration};
use crate::formattable::{Formattable, Shape};
use crate::nested::Nested;
use crate::observable::{Event, ON_PROPERTY_CHANGE, ON_STATE_CHANGE, SubscriptionId};
use crate::state::RecordState;

pub use serial::RECORD_MODULE;

/// Receives the names of fields whose values changed.
pub(crate) trait FieldListener {
    fn fields_changed(&self, names: &[Arc<str>]);
}

/// Options for building a [`Record`].
#[derive(Clone, Debug)]
pub struct RecordOptions {
    /// Adapter reading the raw data.
    pub adapter: AdapterRef,
    /// Raw data; null becomes an empty record.
    pub raw_data: Value,
    /// Declared format.
    pub format: Option<FormatDeclaration>,
    /// Field holding the record key.
    pub key_property: Option<Arc<str>>,
    /// Initial state.
    pub state: RecordState,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            raw_data: Value::Null,
            format: None,
            key_property: None,
            state: RecordState::Detached,
        }
    }
}

impl RecordOptions {
    /// Default options: JSON adapter, no data, detached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the adapter.
    #[must_use]
    pub fn with_adapter(mut self, adapter: AdapterRef) -> Self {
        self.adapter = adapter;
        self
    }

    /// Sets the raw data.
    #[must_use]
    pub fn with_raw_data(mut self, raw: Value) -> Self {
        self.raw_data = raw;
        self
    }

    /// Declares the format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<FormatDeclaration>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets the key field.
    #[must_use]
    pub fn with_key_property(mut self, name: impl Into<Arc<str>>) -> Self {
        self.key_property = Some(name.into());
        self
    }

    /// Sets the initial state.
    #[must_use]
    pub fn with_state(mut self, state: RecordState) -> Self {
        self.state = state;
        self
    }
}

/// A changed field and the value it had when changes were last accepted.
#[derive(Clone, Debug)]
struct ChangedField {
    name: Arc<str>,
    original: Value,
    /// The field still holds the same nested entity, which changed inside.
    by_reference: bool,
}

/// One row of raw data with typed field access.
pub struct Record {
    self_ref: Weak<Record>,
    core: EntityCore,
    data: Formattable,
    state: Cell<RecordState>,
    accepted_state: Cell<RecordState>,
    changed: RefCell<Vec<ChangedField>>,
    cache: RefCell<HashMap<Arc<str>, Value>>,
    format_locked: Cell<bool>,
    key_property: RefCell<Option<Arc<str>>>,
    listener: RefCell<Option<Weak<dyn FieldListener>>>,
}

impl Record {
    /// Creates a detached record over JSON raw data.
    #[must_use]
    pub fn new(raw: Value) -> Rc<Self> {
        let adapter = default_adapter();
        let raw = if raw.is_nullish() {
            adapter.for_record().empty()
        } else {
            raw
        };
        Self::build(
            Formattable::inferred_from(raw, adapter, Shape::Record),
            RecordState::Detached,
            None,
        )
    }

    /// Creates a record from options.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if a partial format declaration names a
    /// field twice.
    pub fn with_options(options: RecordOptions) -> Result<Rc<Self>> {
        let RecordOptions {
            adapter,
            raw_data,
            format,
            key_property,
            state,
        } = options;
        let raw = if raw_data.is_nullish() {
            adapter.for_record().empty()
        } else {
            raw_data
        };
        let data = Formattable::new(raw, adapter, Shape::Record, format)?;
        Ok(Self::build(data, state, key_property))
    }

    /// Creates a record and wraps it as an instance.
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_options`].
    pub fn produce_instance(options: RecordOptions) -> Result<Instance> {
        Self::with_options(options).map(Instance::new)
    }

    /// Creates a record holding the entries of an object.
    ///
    /// Field types are inferred from the values, which may be entities.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while writing a value.
    pub fn from_object(object: &Map) -> Result<Rc<Self>> {
        let record = Self::new(Value::Null);
        record.set_many(object.iter().map(|(name, value)| (name.clone(), value.clone())))?;
        record.accept_changes(None, false, false);
        Ok(record)
    }

    fn build(data: Formattable, state: RecordState, key_property: Option<Arc<str>>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            core: EntityCore::new(),
            data,
            state: Cell::new(state),
            accepted_state: Cell::new(state),
            changed: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
            format_locked: Cell::new(false),
            key_property: RefCell::new(key_property),
            listener: RefCell::new(None),
        })
    }

    /// Identity of this record.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.core.id()
    }

    /// The adapter reading the raw data.
    #[must_use]
    pub fn adapter(&self) -> &AdapterRef {
        self.data.adapter()
    }

    /// Checks if the raw data holds a field.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        let adapter = self.data.adapter().clone();
        self.data.with_raw(|raw| adapter.for_record().has(raw, name))
    }

    /// Value of a field, `Undefined` if there is no such field.
    ///
    /// Complex values are built once and then returned from the cache.
    #[must_use]
    pub fn get(&self, name: &str) -> Value {
        if let Some(value) = self.cache.borrow().get(name) {
            return value.clone();
        }
        let adapter = self.data.adapter().clone();
        let raw = self.data.with_raw(|raw| adapter.for_record().get(raw, name));
        if matches!(raw, Value::Undefined) {
            return raw;
        }
        let Some(field) = self.data.field_format(name) else {
            return raw;
        };
        match convert::cast(&raw, &field, &adapter) {
            Ok(value) => {
                if value.is_instance() {
                    self.cache.borrow_mut().insert(field.name.clone(), value.clone());
                    self.link(&value, &field.name);
                }
                value
            }
            Err(error) => {
                warn!(field = name, %error, "field value kept raw");
                raw
            }
        }
    }

    /// Value of a field.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if there is no such field.
    pub fn try_get(&self, name: &str) -> Result<Value> {
        if !self.has(name) {
            return Err(Error::field_not_found(name));
        }
        Ok(self.get(name))
    }

    /// Calls `f` with every field name and value, in format order.
    pub fn each(&self, mut f: impl FnMut(&Arc<str>, Value)) {
        for name in self.data.fields() {
            let value = self.get(&name);
            f(&name, value);
        }
    }

    /// Writes one field.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_many`].
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_many([(name, value.into())])
    }

    /// Writes several fields as one change.
    ///
    /// Every field is attempted. Fields that are new are added to the format
    /// unless it is locked. The version moves once and one property-change
    /// event lists every field that actually changed.
    ///
    /// # Errors
    ///
    /// If some fields fail, returns the most specific of their errors after
    /// the others were written: `ReadOnlyFormat` for new fields of a locked
    /// format, `TypeMismatch` or `InvalidValue` for values that do not fit.
    pub fn set_many<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Arc<str>>,
    {
        let version = self.core.version();
        let outer = !version.is_locked();
        version.lock();

        let before = self.state.get();
        let mut applied = Vec::new();
        let mut errors = Vec::new();
        for (name, value) in entries {
            let name = name.into();
            match self.apply(&name, value) {
                Ok(Some(value)) => applied.push((name, value)),
                Ok(None) => {}
                Err(error) => {
                    debug!(field = %name, %error, "field not written");
                    errors.push(error);
                }
            }
        }
        if !applied.is_empty() {
            self.changed_fields(applied, before);
        }

        if outer {
            version.unlock(true);
        }
        match errors.into_iter().min_by_key(Error::rank) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Writes one field without events. Returns the value if it changed.
    fn apply(&self, name: &Arc<str>, value: Value) -> Result<Option<Value>> {
        let adapter = self.data.adapter().clone();
        if !self.has(name) {
            if self.format_locked.get() {
                return Err(Error::new(ErrorKind::ReadOnlyFormat(name.to_string())));
            }
            match self.data.field_format(name) {
                Some(field) => {
                    self.data
                        .with_raw_mut(|raw| adapter.for_record().add_field(raw, &field, None))?;
                    self.data.reset_format();
                }
                None => self.data.add_field(convert::infer_field(name, &value), None)?,
            }
        }
        let field = self
            .data
            .field_format(name)
            .unwrap_or_else(|| FieldDescriptor::new(name.clone(), Type::Any));

        let old = self.get(name);
        if convert::same_value(&old, &value, &field) {
            return Ok(None);
        }
        let raw_value = convert::serialize(&value, &field)?;
        self.data
            .with_raw_mut(|raw| adapter.for_record().set(raw, name, raw_value.clone()))?;

        self.replace_cached(name, &value);
        self.track(name, old, &raw_value, &field);
        Ok(Some(value))
    }

    /// Swaps the cached value of a field and its link.
    fn replace_cached(&self, name: &Arc<str>, value: &Value) {
        let previous = self.cache.borrow_mut().remove(name);
        if let Some(previous) = previous {
            let same = matches!((&previous, value), (Value::Instance(a), Value::Instance(b)) if a.ptr_eq(b));
            if !same {
                self.unlink(&previous);
            }
        }
        if Nested::of(value).is_some() {
            self.cache.borrow_mut().insert(name.clone(), value.clone());
            self.link(value, name);
        }
    }

    /// Events and propagation after fields were written.
    fn changed_fields(&self, applied: Vec<(Arc<str>, Value)>, before: RecordState) {
        self.sync_state();
        bump_version(self);

        let names: Vec<Arc<str>> = applied.iter().map(|(name, _)| name.clone()).collect();
        let args: Map = applied.iter().cloned().collect();
        self.core.notify(ON_PROPERTY_CHANGE, vec![Value::Object(args)]);
        self.notify_state(before);
        self.notify_listener(&names);

        if let Some(this) = self.participant() {
            child_changed(&this, ChangeData::Fields(applied));
        }
    }

    fn notify_state(&self, before: RecordState) {
        let state = self.state.get();
        if state != before {
            self.core.notify(ON_STATE_CHANGE, vec![Value::from(state.name())]);
        }
    }

    fn notify_listener(&self, names: &[Arc<str>]) {
        let listener = self.listener.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.fields_changed(names);
        }
    }

    /// Adds a field.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnlyFormat` if the format is locked and `DuplicateField`
    /// if the field exists.
    pub fn add_field(&self, field: FieldDescriptor, at: Option<usize>) -> Result<()> {
        self.check_format_unlocked(&field.name)?;
        let name = field.name.clone();
        self.data.add_field(field, at)?;
        self.format_changed(name);
        Ok(())
    }

    /// Removes a field and forgets its changes.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnlyFormat` if the format is locked and `FieldNotFound`
    /// if there is no such field.
    pub fn remove_field(&self, name: &str) -> Result<()> {
        self.check_format_unlocked(name)?;
        self.data.remove_field(name)?;
        self.field_removed(name);
        Ok(())
    }

    /// Removes a field by position.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such position, otherwise the
    /// errors of [`Self::remove_field`].
    pub fn remove_field_at(&self, index: usize) -> Result<()> {
        if let Some(field) = self.data.format().at(index) {
            self.check_format_unlocked(&field.name)?;
        }
        let name = self.data.remove_field_at(index)?;
        self.field_removed(&name);
        Ok(())
    }

    fn field_removed(&self, name: &str) {
        let cached = self.cache.borrow_mut().remove(name);
        if let Some(value) = cached {
            self.unlink(&value);
        }
        self.changed.borrow_mut().retain(|entry| &*entry.name != name);
        self.format_changed(Arc::from(name));
    }

    fn check_format_unlocked(&self, name: &str) -> Result<()> {
        if self.format_locked.get() {
            return Err(Error::new(ErrorKind::ReadOnlyFormat(name.to_string())));
        }
        Ok(())
    }

    fn format_changed(&self, name: Arc<str>) {
        let before = self.state.get();
        self.sync_state();
        bump_version(self);
        self.notify_state(before);
        if let Some(this) = self.participant() {
            let value = self.get(&name);
            child_changed(&this, ChangeData::field(name, value));
        }
    }

    /// The effective format.
    #[must_use]
    pub fn get_format(&self) -> Format {
        self.data.format()
    }

    /// Returns true if fields cannot be added or removed.
    #[must_use]
    pub fn is_format_locked(&self) -> bool {
        self.format_locked.get()
    }

    pub(crate) fn lock_format(&self, locked: bool) {
        self.format_locked.set(locked);
    }

    /// Copy of the raw data.
    #[must_use]
    pub fn get_raw_data(&self) -> Value {
        self.data.raw_data()
    }

    /// Replaces the raw data and forgets every change.
    pub fn set_raw_data(&self, raw: Value) {
        let before = self.state.get();
        self.rebind(raw, self.data.declared());
        self.changed.borrow_mut().clear();
        self.sync_state();
        bump_version(self);

        let names = self.data.fields();
        let args: Map = names.iter().map(|name| (name.clone(), self.get(name))).collect();
        self.core.notify(ON_PROPERTY_CHANGE, vec![Value::Object(args.clone())]);
        self.notify_state(before);
        self.notify_listener(&names);
        if let Some(this) = self.participant() {
            child_changed(
                &this,
                ChangeData::Fields(args.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            );
        }
    }

    /// Swaps raw data and declaration without events. Changes are kept.
    pub(crate) fn rebind(&self, raw: Value, declared: Option<FormatDeclaration>) {
        let cached: Vec<Value> = self.cache.borrow_mut().drain().map(|(_, v)| v).collect();
        for value in &cached {
            self.unlink(value);
        }
        let raw = if raw.is_nullish() {
            self.data.adapter().for_record().empty()
        } else {
            raw
        };
        if declared != self.data.declared() {
            self.data.declare(declared);
        }
        self.data.set_raw_data(raw);
    }

    /// The declared format, if any.
    #[must_use]
    pub fn declared_format(&self) -> Option<FormatDeclaration> {
        self.data.declared()
    }

    /// Current state.
    #[must_use]
    pub fn get_state(&self) -> RecordState {
        self.state.get()
    }

    /// Sets the state. It also becomes the state restored by rejecting.
    pub fn set_state(&self, state: RecordState) {
        let before = self.state.get();
        self.state.set(state);
        self.accepted_state.set(state);
        self.notify_state(before);
    }

    /// Field holding the key.
    #[must_use]
    pub fn key_property(&self) -> Option<Arc<str>> {
        self.key_property.borrow().clone()
    }

    /// Sets the field holding the key.
    pub fn set_key_property(&self, name: Option<Arc<str>>) {
        *self.key_property.borrow_mut() = name;
    }

    /// Key value: the key field, else the first identity field.
    #[must_use]
    pub fn get_key(&self) -> Option<Value> {
        let name = self.key_property().or_else(|| {
            self.data
                .format()
                .iter()
                .find(|field| field.ty == Type::Identity)
                .map(|field| field.name.clone())
        })?;
        Some(self.get(&name))
    }

    /// Independent copy with the same data, format, state and changes.
    #[must_use]
    pub fn clone_record(&self) -> Rc<Self> {
        let data = Formattable::inferred_from(
            self.data.raw_data(),
            self.data.adapter().clone(),
            Shape::Record,
        );
        data.declare(self.data.declared());
        let copy = Self::build(data, self.state.get(), self.key_property());
        copy.copy_changes_from(self);
        copy
    }

    /// Takes over the states and change markers of `source`. Nested
    /// originals are copied, so the two records share no entities.
    pub(crate) fn copy_changes_from(&self, source: &Self) {
        self.state.set(source.state.get());
        self.accepted_state.set(source.accepted_state.get());
        let markers = source.changed.borrow().clone();
        for entry in markers {
            let original = match Nested::of(&entry.original) {
                Some(nested) => nested.deep_clone(),
                None => entry.original,
            };
            self.restore_marker(entry.name, original, entry.by_reference);
        }
    }

    /// Same raw data.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.data.with_raw(|mine| other.data.with_raw(|theirs| mine.deep_equal(theirs)))
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

    /// Returns true once destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }

    /// Destroys the record and the nested entities only it owned.
    pub fn destroy(&self) {
        if self.core.is_destroyed() {
            return;
        }
        self.core.mark_destroyed();
        destroy_cascade(self);
        self.cache.borrow_mut().clear();
    }

    /// Builds a row of a recordset: the table's format, locked.
    pub(crate) fn row(raw: Value, adapter: AdapterRef, format: Format, state: RecordState) -> Rc<Self> {
        let raw = if raw.is_nullish() {
            adapter.for_record().empty()
        } else {
            raw
        };
        let data = Formattable::inferred_from(raw, adapter, Shape::Record);
        data.declare(Some(FormatDeclaration::Complete(format)));
        let row = Self::build(data, state, None);
        row.lock_format(true);
        row
    }

    /// Writes the raw form of a value without tracking or events.
    pub(crate) fn write_raw(&self, name: &str, value: &Value) -> Result<()> {
        let field = self
            .data
            .field_format(name)
            .ok_or_else(|| Error::field_not_found(name))?;
        let raw_value = convert::serialize(value, &field)?;
        let adapter = self.data.adapter().clone();
        self.data
            .with_raw_mut(|raw| adapter.for_record().set(raw, name, raw_value))?;
        let cached = self.cache.borrow_mut().remove(name);
        if let Some(cached) = cached {
            self.unlink(&cached);
        }
        Ok(())
    }

    /// Changes the state without touching the state restored by rejecting.
    pub(crate) fn mark_state(&self, state: RecordState) {
        let before = self.state.replace(state);
        self.notify_state(before);
    }

    pub(crate) fn notify(&self, event: &str, args: Vec<Value>) {
        self.core.notify(event, args);
    }

    pub(crate) fn set_listener(&self, listener: Weak<dyn FieldListener>) {
        *self.listener.borrow_mut() = Some(listener);
    }

    pub(crate) fn participant(&self) -> Option<ParticipantRef> {
        self.self_ref.upgrade().map(|this| this as ParticipantRef)
    }

    pub(crate) fn cached(&self, name: &str) -> Option<Value> {
        self.cache.borrow().get(name).cloned()
    }

    fn link(&self, value: &Value, name: &str) {
        if let (Some(nested), Some(this)) = (Nested::of(value), self.participant()) {
            self.core.add_child(&this, &nested.participant(), name);
        }
    }

    fn unlink(&self, value: &Value) {
        if let (Some(nested), Some(this)) = (Nested::of(value), self.participant()) {
            self.core.remove_child(&this, &nested.participant());
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.core.id())
            .field("state", &self.state.get())
            .field("changed", &self.get_changed())
            .field("raw", &self.data.raw_data())
            .finish()
    }
}
