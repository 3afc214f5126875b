//! Relationship mediator, change propagation and versioning for Quire.
//!
//! This crate provides:
//! - [`Mediator`] - Shared many-to-many store of master/slave edges
//! - [`Participant`] - Capability of objects linked through a mediator
//! - [`RelationReceiver`] - Capability of masters reacting to slave changes
//! - [`propagate`] - Upward and downward change notification
//! - [`Version`] - Lockable version counters bumped along the master graph
//!
//! Edges are weak on both sides: the mediator never keeps an entity alive,
//! and destroyed entities are skipped until [`Mediator::compact`] drops them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod mediator;
pub mod participant;
pub mod propagate;
pub mod version;

pub use mediator::{Clear, ManyToMany, Mediator};
pub use participant::{
    ChangeData, EdgeName, Participant, ParticipantRef, RelationReceiver, VersionTracked, Which,
};
pub use propagate::{child_changed, destroy_cascade, parent_changed};
pub use version::{Version, bump_version};
