//! Recordsets: ordered tables of rows.
//!
//! Rows are records owned by the set. Each row holds a copy of its part of
//! the table; when a row changes, the set writes it back into the table.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use quire_foundation::{
    Array, Error, ErrorKind, Instance, InstanceId, PathSegment, Result, Serializable, Value,
    display_path, object,
};
use quire_relation::{
    ChangeData, EdgeName, Mediator, Participant, ParticipantRef, RelationReceiver, Version,
    VersionTracked, Which, bump_version, child_changed, destroy_cascade, parent_changed,
};
use tracing::{debug, warn};

use crate::adapter::{AdapterRef, default_adapter};
use crate::base::EntityCore;
use crate::format::{FieldDescriptor, Format, FormatDeclaration};
use crate::formattable::{Formattable, Shape};
use crate::observable::{Event, ON_COLLECTION_CHANGE, SubscriptionId};
use crate::record::serial::{adapter_of, declaration_from_value, declaration_to_value};
use crate::record::Record;
use crate::state::RecordState;

/// Module name recordsets are serialized under.
pub const RECORDSET_MODULE: &str = "entity.RecordSet";

/// Options for building a [`RecordSet`].
#[derive(Clone, Debug)]
pub struct RecordSetOptions {
    /// Adapter reading the raw data.
    pub adapter: AdapterRef,
    /// Raw table; null becomes an empty table.
    pub raw_data: Value,
    /// Declared format.
    pub format: Option<FormatDeclaration>,
    /// Field holding the row keys.
    pub key_property: Option<Arc<str>>,
}

impl Default for RecordSetOptions {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            raw_data: Value::Null,
            format: None,
            key_property: None,
        }
    }
}

impl RecordSetOptions {
    /// Default options: JSON adapter, no rows.
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

    /// Sets the raw table.
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
}

fn edge(row: &Record) -> String {
    row.id().to_string()
}

/// An ordered table of records.
pub struct RecordSet {
    self_ref: Weak<RecordSet>,
    core: EntityCore,
    data: Formattable,
    rows: RefCell<Vec<Rc<Record>>>,
    key_property: RefCell<Option<Arc<str>>>,
}

impl RecordSet {
    /// Creates a recordset over a JSON array of objects.
    #[must_use]
    pub fn new(raw: Value) -> Rc<Self> {
        let adapter = default_adapter();
        let raw = if raw.is_nullish() {
            adapter.for_table().empty(&Format::new())
        } else {
            raw
        };
        Self::build(Formattable::inferred_from(raw, adapter, Shape::Table), None)
    }

    /// Creates a recordset from options.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if a partial format declaration names a
    /// field twice.
    pub fn with_options(options: RecordSetOptions) -> Result<Rc<Self>> {
        let RecordSetOptions {
            adapter,
            raw_data,
            format,
            key_property,
        } = options;
        let raw = if raw_data.is_nullish() {
            match &format {
                Some(FormatDeclaration::Complete(format)) => adapter.for_table().empty(format),
                _ => adapter.for_table().empty(&Format::new()),
            }
        } else {
            raw_data
        };
        let data = Formattable::new(raw, adapter, Shape::Table, format)?;
        Ok(Self::build(data, key_property))
    }

    /// Creates a recordset and wraps it as an instance.
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_options`].
    pub fn produce_instance(options: RecordSetOptions) -> Result<Instance> {
        Self::with_options(options).map(Instance::new)
    }

    fn build(data: Formattable, key_property: Option<Arc<str>>) -> Rc<Self> {
        let this = Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            core: EntityCore::new(),
            data,
            rows: RefCell::new(Vec::new()),
            key_property: RefCell::new(key_property),
        });
        this.load_rows();
        this
    }

    /// Rebuilds every row from the table.
    fn load_rows(&self) {
        let old = self.rows.take();
        for row in &old {
            self.release(row);
        }
        let adapter = self.data.adapter().clone();
        let format = self.data.format();
        let count = self.data.with_raw(|raw| adapter.for_table().count(raw));
        let rows: Vec<Rc<Record>> = (0..count)
            .map(|index| {
                let raw = self
                    .data
                    .with_raw(|raw| adapter.for_table().at(raw, index))
                    .unwrap_or(Value::Null);
                Record::row(raw, adapter.clone(), format.clone(), RecordState::Unchanged)
            })
            .collect();
        for row in &rows {
            self.adopt(row);
        }
        *self.rows.borrow_mut() = rows;
    }

    fn adopt(&self, row: &Rc<Record>) {
        if let Some(this) = self.participant() {
            let child: ParticipantRef = row.clone();
            self.core.add_child(&this, &child, &edge(row));
        }
    }

    fn release(&self, row: &Rc<Record>) {
        if let Some(this) = self.participant() {
            let child: ParticipantRef = row.clone();
            self.core.remove_child(&this, &child);
        }
        row.lock_format(false);
    }

    /// Identity of this recordset.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.core.id()
    }

    /// The adapter reading the raw data.
    #[must_use]
    pub fn adapter(&self) -> &AdapterRef {
        self.data.adapter()
    }

    /// Number of rows, including rows marked deleted.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.borrow().len()
    }

    /// Row at a position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Rc<Record>> {
        self.rows.borrow().get(index).cloned()
    }

    /// Calls `f` with every row and its position.
    pub fn each(&self, mut f: impl FnMut(&Rc<Record>, usize)) {
        let rows = self.rows.borrow().clone();
        for (index, row) in rows.iter().enumerate() {
            f(row, index);
        }
    }

    /// Position of a row of this set.
    #[must_use]
    pub fn index_of(&self, row: &Record) -> Option<usize> {
        self.rows.borrow().iter().position(|own| own.id() == row.id())
    }

    /// Position of the first row whose field holds `value`.
    #[must_use]
    pub fn get_index_by_value(&self, name: &str, value: &Value) -> Option<usize> {
        let rows = self.rows.borrow().clone();
        rows.iter().position(|row| row.get(name).deep_equal(value))
    }

    /// Row whose key equals `key`.
    #[must_use]
    pub fn get_record_by_key(&self, key: &Value) -> Option<Rc<Record>> {
        let rows = self.rows.borrow().clone();
        rows.into_iter()
            .find(|row| row.get_key().is_some_and(|own| own.deep_equal(key)))
    }

    /// Adds a copy of `record` as a new row, at `at` or at the end.
    ///
    /// An empty set without a declared format takes the record's format.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `at` is past the end, or an error if a
    /// value of the record does not fit the set's format.
    pub fn add(&self, record: &Record, at: Option<usize>) -> Result<Rc<Record>> {
        let count = self.count();
        let index = at.unwrap_or(count);
        if index > count {
            return Err(Error::index_out_of_bounds(index, count));
        }
        if count == 0 && !self.data.has_declared_format() && self.data.format().is_empty() {
            debug!(set = %self.core.id(), "format taken from the first record");
            self.data
                .declare(Some(FormatDeclaration::Complete(record.get_format())));
        }
        let row = self.copy_row(record, RecordState::Added)?;
        let adapter = self.data.adapter().clone();
        self.data
            .with_raw_mut(|raw| adapter.for_table().add(raw, row.get_raw_data(), Some(index)))?;
        self.adopt(&row);
        self.rows.borrow_mut().insert(index, row.clone());
        self.collection_changed("add", index);
        Ok(row)
    }

    /// Replaces the row at `index` by a copy of `record`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such row, or an error if a
    /// value of the record does not fit the set's format.
    pub fn replace(&self, record: &Record, index: usize) -> Result<Rc<Record>> {
        let old = self
            .at(index)
            .ok_or_else(|| Error::index_out_of_bounds(index, self.count()))?;
        let row = self.copy_row(record, RecordState::Changed)?;
        let adapter = self.data.adapter().clone();
        self.data
            .with_raw_mut(|raw| adapter.for_table().replace(raw, row.get_raw_data(), index))?;
        self.release(&old);
        old.mark_state(RecordState::Detached);
        self.adopt(&row);
        self.rows.borrow_mut()[index] = row.clone();
        self.collection_changed("replace", index);
        Ok(old)
    }

    /// Removes the row at `index` and detaches it.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such row.
    pub fn remove_at(&self, index: usize) -> Result<Rc<Record>> {
        let row = self.take_row(index)?;
        row.set_state(RecordState::Detached);
        self.collection_changed("remove", index);
        Ok(row)
    }

    /// Marks the row at `index` deleted. It leaves the set on accept.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if there is no such row.
    pub fn delete_at(&self, index: usize) -> Result<()> {
        let row = self
            .at(index)
            .ok_or_else(|| Error::index_out_of_bounds(index, self.count()))?;
        row.mark_state(RecordState::Deleted);
        bump_version(self);
        self.spread(ChangeData::Custom(Value::from("delete")));
        Ok(())
    }

    fn take_row(&self, index: usize) -> Result<Rc<Record>> {
        let count = self.count();
        if index >= count {
            return Err(Error::index_out_of_bounds(index, count));
        }
        let adapter = self.data.adapter().clone();
        self.data
            .with_raw_mut(|raw| adapter.for_table().remove(raw, index))?;
        let row = self.rows.borrow_mut().remove(index);
        self.release(&row);
        Ok(row)
    }

    fn copy_row(&self, record: &Record, state: RecordState) -> Result<Rc<Record>> {
        let format = self.data.format();
        let row = Record::row(Value::Null, self.data.adapter().clone(), format.clone(), state);
        for field in format.iter() {
            let value = record.get(&field.name);
            if matches!(value, Value::Undefined) {
                continue;
            }
            row.write_raw(&field.name, &value)?;
        }
        Ok(row)
    }

    fn collection_changed(&self, action: &str, index: usize) {
        bump_version(self);
        let position = i64::try_from(index).unwrap_or(i64::MAX);
        self.core.notify(
            ON_COLLECTION_CHANGE,
            vec![Value::from(action), Value::Int(position)],
        );
        self.spread(ChangeData::Custom(Value::from(action)));
    }

    /// The effective format.
    #[must_use]
    pub fn get_format(&self) -> Format {
        self.data.format()
    }

    /// Adds a field to every row.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if the field exists.
    pub fn add_field(&self, field: FieldDescriptor, at: Option<usize>) -> Result<()> {
        self.data.add_field(field, at)?;
        self.format_changed();
        Ok(())
    }

    /// Removes a field from every row.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if there is no such field.
    pub fn remove_field(&self, name: &str) -> Result<()> {
        self.data.remove_field(name)?;
        self.format_changed();
        Ok(())
    }

    fn format_changed(&self) {
        let adapter = self.data.adapter().clone();
        let declared = Some(FormatDeclaration::Complete(self.data.format()));
        let rows = self.rows.borrow().clone();
        for (index, row) in rows.iter().enumerate() {
            let raw = self
                .data
                .with_raw(|raw| adapter.for_table().at(raw, index))
                .unwrap_or(Value::Null);
            row.rebind(raw, declared.clone());
        }
        parent_changed(self, &ChangeData::Format);
        bump_version(self);
        self.spread(ChangeData::Custom(Value::from("format")));
    }

    /// Accepts every row. Rows marked deleted leave the set.
    pub fn accept_changes(&self, spread: bool) {
        let deleted: Vec<usize> = self
            .rows
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get_state() == RecordState::Deleted)
            .map(|(index, _)| index)
            .collect();
        for index in deleted.into_iter().rev() {
            match self.take_row(index) {
                Ok(row) => row.set_state(RecordState::Detached),
                Err(error) => warn!(index, %error, "cannot drop deleted row"),
            }
        }
        parent_changed(self, &ChangeData::Accept);
        if spread {
            self.spread(ChangeData::Accept);
        }
    }

    /// Rejects every row. Rows added since the last accept leave the set.
    pub fn reject_changes(&self, spread: bool) {
        let added: Vec<usize> = self
            .rows
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get_state() == RecordState::Added)
            .map(|(index, _)| index)
            .collect();
        for index in added.into_iter().rev() {
            match self.take_row(index) {
                Ok(row) => row.set_state(RecordState::Detached),
                Err(error) => warn!(index, %error, "cannot drop added row"),
            }
        }
        parent_changed(self, &ChangeData::Reject);
        if spread {
            self.spread(ChangeData::Reject);
        }
    }

    /// Returns true if a row was added, deleted or changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.rows.borrow().iter().any(|row| {
            row.is_changed()
                || matches!(
                    row.get_state(),
                    RecordState::Added | RecordState::Changed | RecordState::Deleted
                )
        })
    }

    /// Copy of the raw table.
    #[must_use]
    pub fn get_raw_data(&self) -> Value {
        self.data.raw_data()
    }

    /// Replaces the raw table and rebuilds every row.
    pub fn set_raw_data(&self, raw: Value) {
        let raw = if raw.is_nullish() {
            self.data.adapter().for_table().empty(&self.data.format())
        } else {
            raw
        };
        self.data.set_raw_data(raw);
        self.load_rows();
        self.collection_changed("reset", 0);
    }

    /// Field holding the row keys.
    #[must_use]
    pub fn key_property(&self) -> Option<Arc<str>> {
        self.key_property.borrow().clone()
    }

    /// Independent copy with the same table, format, row states and row changes.
    #[must_use]
    pub fn clone_set(&self) -> Rc<Self> {
        let data = Formattable::inferred_from(
            self.data.raw_data(),
            self.data.adapter().clone(),
            Shape::Table,
        );
        data.declare(self.data.declared());
        let copy = Self::build(data, self.key_property());
        let rows = copy.rows.borrow().clone();
        for (row, source) in rows.iter().zip(self.rows.borrow().iter()) {
            row.copy_changes_from(source);
        }
        copy
    }

    fn states(&self) -> Vec<RecordState> {
        self.rows.borrow().iter().map(|row| row.get_state()).collect()
    }

    fn restore_rows(&self, entries: &Array) -> Result<()> {
        let rows = self.rows.borrow().clone();
        for (row, entry) in rows.iter().zip(entries.iter()) {
            if let Some(state) = entry.get("state").and_then(Value::as_str) {
                row.mark_state(state.parse()?);
            }
            row.restore_changes(entry)?;
        }
        Ok(())
    }

    /// Same raw table.
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

    /// Destroys the set and its rows.
    pub fn destroy(&self) {
        if self.core.is_destroyed() {
            return;
        }
        self.core.mark_destroyed();
        destroy_cascade(self);
        self.rows.borrow_mut().clear();
    }

    /// Rebuilds a recordset from its serialized state.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedModule` for an unknown adapter and
    /// `SerializationError` for a malformed format or state.
    pub fn from_state(state: &Value) -> Result<Rc<Self>> {
        let mut options = RecordSetOptions::new()
            .with_adapter(adapter_of(state)?)
            .with_raw_data(state.get("rawData").cloned().unwrap_or(Value::Null));
        options.format = declaration_from_value(state.get("format"))?;
        options.key_property = state
            .get("keyProperty")
            .and_then(Value::as_str)
            .map(Arc::from);
        let set = Self::with_options(options)?;
        if let Some(rows) = state.get("rows").and_then(Value::as_array) {
            set.restore_rows(rows)?;
        }
        Ok(set)
    }

    fn participant(&self) -> Option<ParticipantRef> {
        self.self_ref.upgrade().map(|this| this as ParticipantRef)
    }

    fn spread(&self, data: ChangeData) {
        if let Some(this) = self.participant() {
            child_changed(&this, data);
        }
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSet")
            .field("id", &self.core.id())
            .field("count", &self.count())
            .field("states", &self.states())
            .finish()
    }
}

impl Participant for RecordSet {
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

    fn receiver(&self) -> Option<&dyn RelationReceiver> {
        Some(self)
    }

    fn versioned(&self) -> Option<&dyn VersionTracked> {
        Some(self)
    }

    fn destroy(&self) {
        RecordSet::destroy(self);
    }
}

impl VersionTracked for RecordSet {
    fn version(&self) -> &Version {
        self.core.version()
    }
}

impl RelationReceiver for RecordSet {
    /// Writes a changed row back into the table.
    fn relation_changed(&self, which: &Which, route: &[EdgeName]) -> Option<ChangeData> {
        if matches!(which.data, ChangeData::Format) {
            return None;
        }
        let name = route.first().cloned().flatten()?;
        let (index, row) = self
            .rows
            .borrow()
            .iter()
            .enumerate()
            .find(|(_, row)| *edge(row) == *name)
            .map(|(index, row)| (index, row.clone()))?;
        let adapter = self.data.adapter().clone();
        if let Err(error) = self
            .data
            .with_raw_mut(|raw| adapter.for_table().replace(raw, row.get_raw_data(), index))
        {
            warn!(index, %error, "cannot write row back");
        }
        None
    }
}

impl Serializable for RecordSet {
    fn module_name(&self) -> Option<&str> {
        Some(RECORDSET_MODULE)
    }

    fn serializable_state(&self) -> Result<Value> {
        let rows: Array = self.rows.borrow().iter().map(|row| row.changes_state()).collect();
        Ok(object! {
            "rawData" => self.data.raw_data(),
            "adapter" => self.data.adapter().name(),
            "format" => declaration_to_value(self.data.declared())?,
            "rows" => rows,
            "keyProperty" => self.key_property(),
        })
    }

    /// Originals of changed row fields may be instances revived later.
    fn restore_link(&self, path: &[PathSegment], target: Value) -> Result<()> {
        let [PathSegment::Key(rows), PathSegment::Index(index), rest @ ..] = path else {
            return Err(Error::new(ErrorKind::UnresolvedLink(display_path(path))));
        };
        if rows.as_ref() != "rows" {
            return Err(Error::new(ErrorKind::UnresolvedLink(display_path(path))));
        }
        let row = self
            .at(*index)
            .ok_or_else(|| Error::new(ErrorKind::UnresolvedLink(display_path(path))))?;
        row.restore_link(rest, target)
    }

    fn is_equal(&self, other: &Instance) -> bool {
        other
            .downcast::<Self>()
            .is_some_and(|other| RecordSet::is_equal(self, &other))
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}
