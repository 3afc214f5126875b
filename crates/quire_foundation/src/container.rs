//! Service container (dependency injection registry).
//!
//! Maps aliases to factories or ready values. Used to resolve adapters,
//! field types and, during deserialization, classes by module name.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type Factory = Rc<dyn Fn() -> Rc<dyn Any>>;

/// How a registered alias produces its value.
#[derive(Clone)]
enum Provider {
    /// A ready value.
    Value(Rc<dyn Any>),
    /// A factory invoked on resolution.
    Factory(Factory),
}

/// Registration options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Invoke the factory on resolution (otherwise the factory itself is the value).
    pub instantiate: bool,
    /// Keep the first produced value and return it on every resolution.
    pub single: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            instantiate: true,
            single: false,
        }
    }
}

impl RegisterOptions {
    /// Options for a singleton.
    #[must_use]
    pub fn single() -> Self {
        Self {
            instantiate: true,
            single: true,
        }
    }
}

struct Registration {
    provider: Provider,
    options: RegisterOptions,
    instance: RefCell<Option<Rc<dyn Any>>>,
}

/// Alias to value registry.
#[derive(Default)]
pub struct Container {
    entries: HashMap<String, Registration>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready value under an alias, replacing any previous one.
    pub fn register_value<T: Any>(&mut self, alias: impl Into<String>, value: T) {
        self.entries.insert(
            alias.into(),
            Registration {
                provider: Provider::Value(Rc::new(value)),
                options: RegisterOptions::default(),
                instance: RefCell::new(None),
            },
        );
    }

    /// Registers a factory under an alias, replacing any previous one.
    ///
    /// With `instantiate` unset the factory is never called and resolution
    /// returns nothing typed other than the factory itself, which callers
    /// obtain through [`Self::resolve_factory`].
    pub fn register_factory<T: Any>(
        &mut self,
        alias: impl Into<String>,
        factory: impl Fn() -> T + 'static,
        options: RegisterOptions,
    ) {
        let factory: Factory = Rc::new(move || Rc::new(factory()) as Rc<dyn Any>);
        self.entries.insert(
            alias.into(),
            Registration {
                provider: Provider::Factory(factory),
                options,
                instance: RefCell::new(None),
            },
        );
    }

    /// Removes an alias.
    pub fn unregister(&mut self, alias: &str) -> bool {
        self.entries.remove(alias).is_some()
    }

    /// Checks if an alias is registered.
    #[must_use]
    pub fn is_registered(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Resolves an alias to a value of type `T`.
    ///
    /// Returns `None` if the alias is unknown, if it is registered with a value
    /// of another type, or if it is a factory that must not be instantiated.
    #[must_use]
    pub fn resolve<T: Any>(&self, alias: &str) -> Option<Rc<T>> {
        self.resolve_any(alias)?.downcast::<T>().ok()
    }

    /// Resolves an alias without a type expectation.
    #[must_use]
    pub fn resolve_any(&self, alias: &str) -> Option<Rc<dyn Any>> {
        let entry = self.entries.get(alias)?;
        match &entry.provider {
            Provider::Value(value) => Some(value.clone()),
            Provider::Factory(factory) => {
                if !entry.options.instantiate {
                    return None;
                }
                if entry.options.single {
                    if let Some(existing) = entry.instance.borrow().as_ref() {
                        return Some(existing.clone());
                    }
                    let produced = factory();
                    *entry.instance.borrow_mut() = Some(produced.clone());
                    return Some(produced);
                }
                Some(factory())
            }
        }
    }

    /// Returns the raw factory of an alias registered without instantiation.
    #[must_use]
    pub fn resolve_factory(&self, alias: &str) -> Option<Rc<dyn Fn() -> Rc<dyn Any>>> {
        match &self.entries.get(alias)?.provider {
            Provider::Factory(factory) => Some(factory.clone()),
            Provider::Value(_) => None,
        }
    }

    /// Returns the registered aliases, sorted.
    #[must_use]
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<_> = self.entries.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("aliases", &self.aliases())
            .finish()
    }
}
