//! Change-tracked entities for Quire.
//!
//! This crate provides:
//! - [`Record`] - A row of fields over raw data, with change markers and states
//! - [`Model`] - A record with computed and virtual properties
//! - [`RecordSet`] - An ordered list of records over one raw table
//! - [`Enum`] and [`Flags`] - Change-tracked values over a dictionary
//! - [`adapter`] - JSON and SBIS access to raw records and tables
//! - [`format`] - Field descriptors and declared formats
//!
//! Entities owning other entities are linked through a mediator, so changes
//! deep in a graph reach every owner and bump their versions.
//!
//! # Example
//!
//! ```
//! use quire_entity::{Record, RecordState};
//! use quire_foundation::{Value, object};
//!
//! let record = Record::new(object! { "name" => "Ann" });
//! record.set("name", "Bob").unwrap();
//! assert!(record.is_changed());
//! assert_eq!(record.get_original("name"), Value::from("Ann"));
//!
//! record.reject_changes(None, false, false);
//! assert_eq!(record.get("name"), Value::from("Ann"));
//! assert_ne!(record.get_state(), RecordState::Changed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
mod base;
pub mod classes;
pub mod convert;
pub mod enumeration;
pub mod flags;
pub mod format;
mod formattable;
pub mod model;
mod nested;
pub mod observable;
pub mod record;
pub mod recordset;
pub mod state;

pub use adapter::{Adapter, AdapterRef, JsonAdapter, SbisAdapter};
pub use classes::{register_classes, registry};
pub use enumeration::{Dictionary, ENUM_MODULE, Enum};
pub use flags::{FLAGS_MODULE, Flags};
pub use format::{FieldDeclaration, FieldDescriptor, Format, FormatDeclaration};
pub use model::{MODEL_MODULE, Model, ModelOptions, Properties, Property, register_model};
pub use observable::{
    Event, ON_CHANGE, ON_COLLECTION_CHANGE, ON_EVENT_RAISING_CHANGE, ON_PROPERTY_CHANGE,
    ON_STATE_CHANGE, SubscriptionId,
};
pub use record::{RECORD_MODULE, Record, RecordOptions};
pub use recordset::{RECORDSET_MODULE, RecordSet, RecordSetOptions};
pub use state::RecordState;
