//! Models: records with computed and virtual properties.
//!
//! A property may have a getter, a setter and a default. Getters run lazily
//! and their results are cached. While a plain getter runs, every property or
//! field it reads through the model is recorded as one of its dependencies;
//! a `Compute` getter declares its dependencies instead. Writing anything
//! invalidates every property depending on it, transitively.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use quire_foundation::{
    Error, ErrorKind, Instance, Map, PathSegment, Result, Serializable, Value,
};
use quire_relation::{ChangeData, bump_version, child_changed};
use quire_serialize::ClassRegistry;
use tracing::{trace, warn};

use crate::format::FormatDeclaration;
use crate::observable::{Event, ON_PROPERTY_CHANGE, SubscriptionId};
use crate::record::{FieldListener, Record, RecordOptions};
use crate::state::RecordState;
use crate::adapter::AdapterRef;

/// Module name of models without their own.
pub const MODEL_MODULE: &str = "entity.Model";

/// Property getter.
pub type GetFn = Rc<dyn Fn(&Model) -> Result<Value>>;

/// Property setter. Returning a value writes it to the field of the same name.
pub type SetFn = Rc<dyn Fn(&Model, Value) -> Result<Option<Value>>>;

/// How a property is read.
#[derive(Clone)]
pub enum Getter {
    /// Dependencies are gathered while the getter runs.
    Plain(GetFn),
    /// Dependencies are declared up front.
    Compute {
        /// Properties and fields the value depends on.
        deps: Vec<Arc<str>>,
        /// The getter.
        get: GetFn,
    },
}

/// How a property is written.
#[derive(Clone)]
pub enum Setter {
    /// Writes without change tracking.
    Plain(SetFn),
    /// Records the value before the first write so it counts as a change.
    Track(SetFn),
}

/// A virtual property of a model.
#[derive(Clone, Default)]
pub struct Property {
    /// Getter; without one the field of the same name is read.
    pub get: Option<Getter>,
    /// Setter; without one the field of the same name is written, unless
    /// there is a getter, which makes the property read-only.
    pub set: Option<Setter>,
    /// Value read while the field does not exist.
    pub def: Option<Value>,
}

impl Property {
    /// A property with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a getter whose dependencies are gathered.
    #[must_use]
    pub fn with_get(mut self, get: impl Fn(&Model) -> Result<Value> + 'static) -> Self {
        self.get = Some(Getter::Plain(Rc::new(get)));
        self
    }

    /// Sets a getter with declared dependencies.
    #[must_use]
    pub fn with_compute<I, S>(mut self, deps: I, get: impl Fn(&Model) -> Result<Value> + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.get = Some(Getter::Compute {
            deps: deps.into_iter().map(Into::into).collect(),
            get: Rc::new(get),
        });
        self
    }

    /// Sets an untracked setter.
    #[must_use]
    pub fn with_set(
        mut self,
        set: impl Fn(&Model, Value) -> Result<Option<Value>> + 'static,
    ) -> Self {
        self.set = Some(Setter::Plain(Rc::new(set)));
        self
    }

    /// Sets a tracked setter.
    #[must_use]
    pub fn with_track(
        mut self,
        set: impl Fn(&Model, Value) -> Result<Option<Value>> + 'static,
    ) -> Self {
        self.set = Some(Setter::Track(Rc::new(set)));
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, def: impl Into<Value>) -> Self {
        self.def = Some(def.into());
        self
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("get", &self.get.as_ref().map(|get| matches!(get, Getter::Compute { .. })))
            .field("set", &self.set.as_ref().map(|set| matches!(set, Setter::Track(_))))
            .field("def", &self.def)
            .finish()
    }
}

/// Ordered table of properties.
#[derive(Clone, Debug, Default)]
pub struct Properties(Vec<(Arc<str>, Property)>);

impl Properties {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a property.
    #[must_use]
    pub fn with(mut self, name: impl Into<Arc<str>>, property: Property) -> Self {
        let name = name.into();
        self.0.retain(|(existing, _)| *existing != name);
        self.0.push((name, property));
        self
    }

    /// A property by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.0
            .iter()
            .find(|(existing, _)| &**existing == name)
            .map(|(_, property)| property)
    }

    /// Property names in order.
    #[must_use]
    pub fn names(&self) -> Vec<Arc<str>> {
        self.0.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Options for building a [`Model`].
#[derive(Clone, Debug)]
pub struct ModelOptions {
    /// Options of the underlying record.
    pub record: RecordOptions,
    /// Virtual properties.
    pub properties: Properties,
    /// Module name the model is serialized under.
    pub module: Arc<str>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            record: RecordOptions::default(),
            properties: Properties::default(),
            module: Arc::from(MODEL_MODULE),
        }
    }
}

impl ModelOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the properties.
    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the module name.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = module.into();
        self
    }

    /// Sets the adapter.
    #[must_use]
    pub fn with_adapter(mut self, adapter: AdapterRef) -> Self {
        self.record = self.record.with_adapter(adapter);
        self
    }

    /// Sets the raw data.
    #[must_use]
    pub fn with_raw_data(mut self, raw: Value) -> Self {
        self.record = self.record.with_raw_data(raw);
        self
    }

    /// Declares the format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<FormatDeclaration>) -> Self {
        self.record = self.record.with_format(format);
        self
    }

    /// Sets the key field.
    #[must_use]
    pub fn with_key_property(mut self, name: impl Into<Arc<str>>) -> Self {
        self.record = self.record.with_key_property(name);
        self
    }

    /// Sets the initial state.
    #[must_use]
    pub fn with_state(mut self, state: RecordState) -> Self {
        self.record = self.record.with_state(state);
        self
    }
}

/// A record with virtual properties.
pub struct Model {
    record: Rc<Record>,
    properties: Rc<Properties>,
    module: Arc<str>,
    cache: RefCell<HashMap<Arc<str>, Value>>,
    /// For each name, the properties computed from it.
    dependents: RefCell<HashMap<Arc<str>, BTreeSet<Arc<str>>>>,
    /// Properties being computed; `None` for getters with declared dependencies.
    gathering: RefCell<Vec<Option<Arc<str>>>>,
    computing: RefCell<HashSet<Arc<str>>>,
    setting: RefCell<HashSet<Arc<str>>>,
    tracked: RefCell<Vec<(Arc<str>, Value)>>,
}

impl Model {
    /// Creates a model over JSON raw data.
    #[must_use]
    pub fn new(properties: Properties, raw: Value) -> Rc<Self> {
        Self::wrap(Record::new(raw), Rc::new(properties), Arc::from(MODEL_MODULE))
    }

    /// Creates a model from options.
    ///
    /// # Errors
    ///
    /// Same as [`Record::with_options`].
    pub fn with_options(options: ModelOptions) -> Result<Rc<Self>> {
        let record = Record::with_options(options.record)?;
        Ok(Self::wrap(record, Rc::new(options.properties), options.module))
    }

    fn wrap(record: Rc<Record>, properties: Rc<Properties>, module: Arc<str>) -> Rc<Self> {
        let model = Rc::new(Self {
            record,
            properties,
            module,
            cache: RefCell::new(HashMap::new()),
            dependents: RefCell::new(HashMap::new()),
            gathering: RefCell::new(Vec::new()),
            computing: RefCell::new(HashSet::new()),
            setting: RefCell::new(HashSet::new()),
            tracked: RefCell::new(Vec::new()),
        });
        let weak: Weak<Model> = Rc::downgrade(&model);
        let listener: Weak<dyn FieldListener> = weak;
        model.record.set_listener(listener);
        model
    }

    /// The underlying record.
    #[must_use]
    pub fn record(&self) -> &Rc<Record> {
        &self.record
    }

    /// The properties.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Module name the model is serialized under.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Checks if a property or field exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.properties.get(name).is_some() || self.record.has(name)
    }

    /// Value of a property or field.
    ///
    /// # Errors
    ///
    /// Returns `RecursiveProperty` if a getter needs its own value, and the
    /// errors of the getters involved.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.note_dependency(name);
        let Some(property) = self.properties.get(name) else {
            return Ok(self.record.get(name));
        };
        if let Some(getter) = &property.get {
            if let Some(value) = self.cache.borrow().get(name) {
                return Ok(value.clone());
            }
            let value = self.compute(name, getter)?;
            self.cache
                .borrow_mut()
                .insert(Arc::from(name), value.clone());
            return Ok(value);
        }
        if let Some(def) = &property.def {
            if !self.record.has(name) {
                return Ok(def.clone());
            }
        }
        Ok(self.record.get(name))
    }

    fn note_dependency(&self, name: &str) {
        let dependent = self.gathering.borrow().last().cloned().flatten();
        if let Some(dependent) = dependent {
            if &*dependent != name {
                self.dependents
                    .borrow_mut()
                    .entry(Arc::from(name))
                    .or_default()
                    .insert(dependent);
            }
        }
    }

    fn compute(&self, name: &str, getter: &Getter) -> Result<Value> {
        if !self.computing.borrow_mut().insert(Arc::from(name)) {
            return Err(Error::new(ErrorKind::RecursiveProperty(name.to_string())));
        }
        trace!(property = name, "computing");
        let (frame, get) = match getter {
            Getter::Plain(get) => (Some(Arc::from(name)), get),
            Getter::Compute { deps, get } => {
                let mut dependents = self.dependents.borrow_mut();
                for dep in deps {
                    dependents.entry(dep.clone()).or_default().insert(Arc::from(name));
                }
                (None, get)
            }
        };
        self.gathering.borrow_mut().push(frame);
        let result = get(self);
        self.gathering.borrow_mut().pop();
        self.computing.borrow_mut().remove(name);
        result
    }

    /// Writes a property or field.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnlyProperty` for properties with a getter and no
    /// setter, `RecursiveProperty` if a setter writes itself, and the errors
    /// of the setter or of [`Record::set`].
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let Some(property) = self.properties.get(name) else {
            return self.record.set(name, value);
        };
        match (&property.set, &property.get) {
            (Some(setter), _) => {
                if !self.setting.borrow_mut().insert(Arc::from(name)) {
                    return Err(Error::new(ErrorKind::RecursiveProperty(name.to_string())));
                }
                let result = self.run_setter(name, setter, value);
                self.setting.borrow_mut().remove(name);
                result
            }
            (None, Some(_)) => Err(Error::new(ErrorKind::ReadOnlyProperty(name.to_string()))),
            (None, None) => self.record.set(name, value),
        }
    }

    /// Writes several properties or fields; every one is attempted.
    ///
    /// # Errors
    ///
    /// Returns the most specific of the errors raised.
    pub fn set_many<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let errors: Vec<Error> = entries
            .into_iter()
            .filter_map(|(name, value)| self.set(name.as_ref(), value).err())
            .collect();
        match errors.into_iter().min_by_key(Error::rank) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn run_setter(&self, name: &str, setter: &Setter, value: Value) -> Result<()> {
        match setter {
            Setter::Plain(set) => {
                if let Some(raw) = set(self, value)? {
                    self.record.set(name, raw)?;
                }
                self.invalidate(name);
                Ok(())
            }
            Setter::Track(set) => {
                let old = self.get(name)?;
                if let Some(raw) = set(self, value)? {
                    self.record.set(name, raw)?;
                }
                self.invalidate(name);
                let new = self.get(name)?;
                if old.deep_equal(&new) {
                    return Ok(());
                }
                self.track(name, old, &new);
                bump_version(self.record.as_ref());
                let args: Map = [(Arc::<str>::from(name), new.clone())].into_iter().collect();
                self.record
                    .notify(ON_PROPERTY_CHANGE, vec![Value::Object(args)]);
                if let Some(this) = self.record.participant() {
                    child_changed(&this, ChangeData::field(name, new));
                }
                Ok(())
            }
        }
    }

    fn track(&self, name: &str, old: Value, new: &Value) {
        let mut tracked = self.tracked.borrow_mut();
        match tracked.iter().position(|(existing, _)| &**existing == name) {
            Some(index) => {
                if tracked[index].1.deep_equal(new) {
                    tracked.remove(index);
                }
            }
            None => tracked.push((Arc::from(name), old)),
        }
    }

    /// Drops the cached value of `name` and of everything computed from it.
    pub fn invalidate(&self, name: &str) {
        let mut pending = vec![Arc::<str>::from(name)];
        let mut seen = HashSet::new();
        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            self.cache.borrow_mut().remove(&next);
            if let Some(dependents) = self.dependents.borrow().get(&next) {
                pending.extend(dependents.iter().cloned());
            }
        }
    }

    /// Calls `f` with every field, then every property that is not a field.
    ///
    /// # Errors
    ///
    /// Returns the first getter error.
    pub fn each(&self, mut f: impl FnMut(&Arc<str>, Value)) -> Result<()> {
        let fields = self.record.get_format().names();
        for name in &fields {
            f(name, self.get(name)?);
        }
        for name in self.properties.names() {
            if !fields.contains(&name) {
                f(&name, self.get(&name)?);
            }
        }
        Ok(())
    }

    /// Changed fields and tracked properties.
    #[must_use]
    pub fn get_changed(&self) -> Vec<Arc<str>> {
        let mut changed = self.record.get_changed();
        for (name, _) in self.tracked.borrow().iter() {
            if !changed.contains(name) {
                changed.push(name.clone());
            }
        }
        changed
    }

    /// Returns true if a field or tracked property changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.record.is_changed() || !self.tracked.borrow().is_empty()
    }

    /// Value a field or tracked property had when changes were last accepted.
    ///
    /// # Errors
    ///
    /// Returns the getter error for unchanged properties.
    pub fn get_original(&self, name: &str) -> Result<Value> {
        let tracked = self
            .tracked
            .borrow()
            .iter()
            .find(|(existing, _)| &**existing == name)
            .map(|(_, original)| original.clone());
        match tracked {
            Some(original) => Ok(original),
            None if self.record.is_field_changed(name) => Ok(self.record.get_original(name)),
            None => self.get(name),
        }
    }

    /// Accepts changes of fields and tracked properties.
    pub fn accept_changes(&self, fields: Option<&[&str]>, spread: bool, cascade: bool) {
        self.tracked
            .borrow_mut()
            .retain(|(name, _)| fields.is_some_and(|names| !names.contains(&&**name)));
        self.record.accept_changes(fields, spread, cascade);
    }

    /// Rejects changes of fields and tracked properties.
    ///
    /// Tracked properties are restored through their setters.
    pub fn reject_changes(&self, fields: Option<&[&str]>, spread: bool, cascade: bool) {
        let targets: Vec<(Arc<str>, Value)> = self
            .tracked
            .borrow()
            .iter()
            .filter(|(name, _)| fields.is_none_or(|names| names.contains(&&**name)))
            .cloned()
            .collect();
        for (name, original) in &targets {
            let setter = self.properties.get(name).and_then(|property| property.set.clone());
            if let Some(Setter::Track(set) | Setter::Plain(set)) = setter {
                let restored = set(self, original.clone())
                    .and_then(|raw| raw.map_or(Ok(()), |raw| self.record.set(name, raw)));
                if let Err(error) = restored {
                    warn!(property = %name, %error, "cannot restore property");
                }
            }
            self.invalidate(name);
        }
        self.tracked
            .borrow_mut()
            .retain(|(name, _)| !targets.iter().any(|(target, _)| target == name));
        self.record.reject_changes(fields, spread, cascade);
    }

    /// Current state.
    #[must_use]
    pub fn get_state(&self) -> RecordState {
        self.record.get_state()
    }

    /// Sets the state.
    pub fn set_state(&self, state: RecordState) {
        self.record.set_state(state);
    }

    /// Copy of the raw data.
    #[must_use]
    pub fn get_raw_data(&self) -> Value {
        self.record.get_raw_data()
    }

    /// Replaces the raw data and forgets every change and cached value.
    pub fn set_raw_data(&self, raw: Value) {
        self.tracked.borrow_mut().clear();
        self.record.set_raw_data(raw);
        self.cache.borrow_mut().clear();
    }

    /// Independent copy.
    #[must_use]
    pub fn clone_model(&self) -> Rc<Self> {
        let copy = Self::wrap(
            self.record.clone_record(),
            self.properties.clone(),
            self.module.clone(),
        );
        copy.tracked.borrow_mut().clone_from(&self.tracked.borrow());
        copy
    }

    /// Same raw data.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.record.is_equal(&other.record)
    }

    /// Version counter value.
    #[must_use]
    pub fn get_version(&self) -> u64 {
        self.record.get_version()
    }

    /// Subscribes to an event of the underlying record.
    pub fn subscribe(&self, event: &str, handler: impl Fn(&Event) + 'static) -> SubscriptionId {
        self.record.subscribe(event, handler)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.record.unsubscribe(id)
    }

    /// Destroys the underlying record.
    pub fn destroy(&self) {
        self.record.destroy();
    }

    /// Rebuilds a model from its serialized state.
    ///
    /// # Errors
    ///
    /// Same as [`Record::from_state`].
    pub fn from_state(
        module: impl Into<Arc<str>>,
        properties: Rc<Properties>,
        state: &Value,
    ) -> Result<Rc<Self>> {
        let record = Record::from_state(state)?;
        let model = Self::wrap(record, properties, module.into());
        if let Some(tracked) = state.get("tracked").and_then(Value::as_object) {
            model
                .tracked
                .borrow_mut()
                .extend(tracked.iter().map(|(name, original)| (name.clone(), original.clone())));
        }
        Ok(model)
    }
}

impl FieldListener for Model {
    fn fields_changed(&self, names: &[Arc<str>]) {
        for name in names {
            self.invalidate(name);
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("module", &self.module)
            .field("record", &self.record)
            .field("properties", &self.properties.names())
            .finish()
    }
}

impl Serializable for Model {
    fn module_name(&self) -> Option<&str> {
        Some(&self.module)
    }

    fn serializable_state(&self) -> Result<Value> {
        let mut state = self.record.serializable_state()?;
        let tracked: Map = self.tracked.borrow().iter().cloned().collect();
        if let Some(object) = state.as_object_mut() {
            object.insert("tracked", Value::Object(tracked));
        }
        Ok(state)
    }

    fn restore_link(&self, path: &[PathSegment], target: Value) -> Result<()> {
        if let [PathSegment::Key(section), PathSegment::Key(name)] = path {
            if &**section == "tracked" {
                let mut tracked = self.tracked.borrow_mut();
                tracked.retain(|(existing, _)| existing != name);
                tracked.push((name.clone(), target));
                return Ok(());
            }
        }
        self.record.restore_link(path, target)
    }

    fn is_equal(&self, other: &Instance) -> bool {
        other
            .downcast::<Self>()
            .is_some_and(|other| Model::is_equal(self, &other))
    }

    fn is_destroyed(&self) -> bool {
        self.record.is_destroyed()
    }
}

/// Registers a model class for revival under its module name.
pub fn register_model(registry: &mut ClassRegistry, module: &str, properties: Properties) {
    let properties = Rc::new(properties);
    let name: Arc<str> = Arc::from(module);
    registry.register_class(module, move |state| {
        Model::from_state(name.clone(), properties.clone(), &state).map(Instance::new)
    });
}
