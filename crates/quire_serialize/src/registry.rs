//! Resolution of module names to classes and functions during revival.

use std::fmt;
use std::rc::Rc;

use quire_foundation::{Callable, Container, Error, ErrorKind, Instance, Result, Value};
use tracing::trace;

/// Builds an instance from its revived state.
///
/// Every nested instance inside the state has already been revived, except
/// references closing a cycle, which arrive as `null` and are restored later
/// through [`quire_foundation::Serializable::restore_link`].
pub type Class = Rc<dyn Fn(Value) -> Result<Instance>>;

/// Fallback lookup for modules the container does not know.
pub trait ModuleLoader {
    /// Loads the class registered under `module`.
    fn load_class(&self, module: &str) -> Option<Class>;

    /// Loads the function registered under `module`.
    fn load_function(&self, module: &str) -> Option<Callable> {
        let _ = module;
        None
    }
}

/// Maps module names to classes and named functions.
///
/// The service container is consulted first; loaders are tried in the
/// order they were added.
#[derive(Default)]
pub struct ClassRegistry {
    container: Container,
    loaders: Vec<Box<dyn ModuleLoader>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry on top of an existing container.
    #[must_use]
    pub fn with_container(container: Container) -> Self {
        Self {
            container,
            loaders: Vec::new(),
        }
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Mutable access to the underlying container.
    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Registers a class under a module name.
    pub fn register_class(
        &mut self,
        module: impl Into<String>,
        from_json: impl Fn(Value) -> Result<Instance> + 'static,
    ) {
        let class: Class = Rc::new(from_json);
        self.container.register_value(module, class);
    }

    /// Registers a named function. Its module name is the alias.
    pub fn register_function(&mut self, function: Callable) {
        if let Some(module) = function.module.clone() {
            self.container.register_value(module.to_string(), function);
        }
    }

    /// Adds a fallback loader.
    pub fn add_loader(&mut self, loader: impl ModuleLoader + 'static) {
        self.loaders.push(Box::new(loader));
    }

    /// Checks if a module resolves to a class.
    #[must_use]
    pub fn has_class(&self, module: &str) -> bool {
        self.class(module).is_ok()
    }

    /// Resolves a module name to a class.
    ///
    /// # Errors
    ///
    /// Returns `MissingFromJson` if the alias is registered with something
    /// other than a class, and `UnresolvedModule` if nothing knows it.
    pub fn class(&self, module: &str) -> Result<Class> {
        if let Some(class) = self.container.resolve::<Class>(module) {
            return Ok(Rc::clone(&*class));
        }
        if self.container.is_registered(module) {
            return Err(Error::new(ErrorKind::MissingFromJson(module.to_string())));
        }
        for loader in &self.loaders {
            if let Some(class) = loader.load_class(module) {
                trace!(module, "class resolved by loader");
                return Ok(class);
            }
        }
        Err(Error::unresolved_module(module))
    }

    /// Resolves a module name to a function.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFunction` if the function is unknown.
    pub fn function(&self, module: &str) -> Result<Callable> {
        if let Some(function) = self.container.resolve::<Callable>(module) {
            return Ok((*function).clone());
        }
        self.loaders
            .iter()
            .find_map(|loader| loader.load_function(module))
            .ok_or_else(|| Error::new(ErrorKind::UnsupportedFunction(module.to_string())))
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("container", &self.container)
            .field("loaders", &self.loaders.len())
            .finish()
    }
}
