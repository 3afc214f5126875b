//! Cycle-safe object graph serialization for Quire.
//!
//! This crate provides:
//! - [`Serializer`] - Depth-first encoder emitting signature JSON, with links for repeated instances
//! - [`Reviver`] - Two-pass decoder rebuilding instances and restoring cyclic references
//! - [`ClassRegistry`] - Module name to class resolution on top of the service container
//! - [`signature`] - The stable wire shapes (`$serialized$` objects)
//!
//! Both JSON text and `MessagePack` bytes carry the same signature document.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod registry;
pub mod reviver;
pub mod serializer;
pub mod signature;

pub use config::SerializerConfig;
pub use registry::{Class, ClassRegistry, ModuleLoader};
pub use reviver::{Document, InstanceEntry, Node, Reviver, from_str};
pub use serializer::{Serializer, to_string};
pub use signature::Tag;
