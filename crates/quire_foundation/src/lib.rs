//! Core values, type descriptors, errors and the service container for Quire.
//!
//! This crate provides:
//! - [`Value`] - The value type for raw data and typed field values
//! - [`Array`] and [`Map`] - Persistent, copy-on-write composites
//! - [`Type`] - Field type descriptors
//! - [`Instance`] and [`Serializable`] - Shared live objects and their serialization capability
//! - [`InstanceId`] - Process-unique identities
//! - [`Container`] - Alias based service registry
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod container;
pub mod error;
pub mod id;
pub mod instance;
#[cfg(feature = "serde")]
pub mod json;
pub mod types;
pub mod value;

pub use collections::{Array, Map};
pub use container::{Container, RegisterOptions};
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use id::InstanceId;
pub use instance::{Callable, Instance, PathSegment, Serializable, display_path};
pub use types::Type;
pub use value::Value;
