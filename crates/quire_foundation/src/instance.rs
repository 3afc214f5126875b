//! Live object handles stored inside values.
//!
//! An [`Instance`] is a shared reference to any type implementing the
//! [`Serializable`] capability. Identity is pointer identity: two handles are
//! the same instance if they point to the same allocation.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;

/// A position inside a value tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key.
    Key(Arc<str>),
    /// Array index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Formats a path for diagnostics.
#[must_use]
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Capability of objects that can travel through the object graph serializer.
///
/// The serializer asks an instance for its module name (used to find the
/// class again on revival) and for its serializable state, which may itself
/// contain further instances.
pub trait Serializable: Any {
    /// Module name the class is registered under, if any.
    fn module_name(&self) -> Option<&str>;

    /// Returns the state needed to rebuild this instance.
    ///
    /// # Errors
    ///
    /// Returns an error if part of the state cannot be captured.
    fn serializable_state(&self) -> Result<Value>;

    /// Restores a reference that could not be provided at construction time
    /// because it closes a cycle.
    ///
    /// `path` is relative to the state returned by [`Self::serializable_state`].
    ///
    /// # Errors
    ///
    /// The default implementation refuses every path.
    fn restore_link(&self, path: &[PathSegment], target: Value) -> Result<()> {
        let _ = target;
        Err(Error::new(ErrorKind::UnresolvedLink(display_path(path))))
    }

    /// Value-level equality with another instance.
    fn is_equal(&self, other: &Instance) -> bool {
        let _ = other;
        false
    }

    /// Returns true once the instance has been destroyed.
    fn is_destroyed(&self) -> bool {
        false
    }
}

/// Shared handle to a live instance.
#[derive(Clone)]
pub struct Instance {
    object: Rc<dyn Serializable>,
    any: Rc<dyn Any>,
}

impl Instance {
    /// Wraps a shared object.
    #[must_use]
    pub fn new<T: Serializable>(object: Rc<T>) -> Self {
        Self {
            any: object.clone(),
            object,
        }
    }

    /// Returns the serializable capability.
    #[must_use]
    pub fn object(&self) -> &dyn Serializable {
        &*self.object
    }

    /// Downcasts to a concrete type.
    #[must_use]
    pub fn downcast<T: Serializable>(&self) -> Option<Rc<T>> {
        self.any.clone().downcast::<T>().ok()
    }

    /// Checks whether the instance is of a concrete type.
    #[must_use]
    pub fn is<T: Serializable>(&self) -> bool {
        self.any.is::<T>()
    }

    /// Returns true if both handles point to the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    /// Returns the allocation address, used as identity within one pass.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.any).cast::<()>() as usize
    }

    /// Returns the module name of the underlying object.
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        self.object.module_name()
    }

    /// Identity first, then value-level equality.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.object.is_equal(other)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.module_name() {
            Some(module) => write!(f, "<{module} @{:#x}>", self.addr()),
            None => write!(f, "<instance @{:#x}>", self.addr()),
        }
    }
}

/// Function value.
///
/// Named functions serialize by module name; anonymous ones can only travel
/// through a side table.
#[derive(Clone)]
pub struct Callable {
    /// Module name the function is registered under.
    pub module: Option<Arc<str>>,
    /// The function itself.
    pub func: Rc<dyn Fn(&[Value]) -> Result<Value>>,
}

impl Callable {
    /// Creates an anonymous function value.
    pub fn new(func: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        Self {
            module: None,
            func: Rc::new(func),
        }
    }

    /// Creates a function value registered under a module name.
    pub fn named(
        module: impl Into<Arc<str>>,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            module: Some(module.into()),
            func: Rc::new(func),
        }
    }

    /// Calls the function.
    ///
    /// # Errors
    ///
    /// Propagates the function's own error.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    /// Returns true if both handles share the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "<fn {module}>"),
            None => write!(f, "<fn>"),
        }
    }
}
