//! Quire - Change-tracked entities and a cycle-safe object graph serializer
//!
//! This crate re-exports all layers of Quire for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: quire_entity     - Records, models, recordsets, enums, flags, adapters
//! Layer 2: quire_serialize  - Signature JSON serializer and reviver, class registry
//! Layer 1: quire_relation   - Mediator, change propagation, versions
//! Layer 0: quire_foundation - Core types (Value, Instance, Error, service container)
//! ```

pub use quire_entity as entity;
pub use quire_foundation as foundation;
pub use quire_relation as relation;
pub use quire_serialize as serialize;
