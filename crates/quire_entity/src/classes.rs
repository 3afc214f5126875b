//! Registration of the entity classes for revival.

use quire_foundation::Instance;
use quire_serialize::ClassRegistry;

use crate::enumeration::{ENUM_MODULE, Enum};
use crate::flags::{FLAGS_MODULE, Flags};
use crate::model::{MODEL_MODULE, Properties, register_model};
use crate::record::{RECORD_MODULE, Record};
use crate::recordset::{RECORDSET_MODULE, RecordSet};

/// Registers records, recordsets, enums, flags and property-less models.
pub fn register_classes(registry: &mut ClassRegistry) {
    registry.register_class(RECORD_MODULE, |state| Record::from_state(&state).map(Instance::new));
    registry.register_class(RECORDSET_MODULE, |state| {
        RecordSet::from_state(&state).map(Instance::new)
    });
    registry.register_class(ENUM_MODULE, |state| Enum::from_state(&state).map(Instance::new));
    registry.register_class(FLAGS_MODULE, |state| Flags::from_state(&state).map(Instance::new));
    register_model(registry, MODEL_MODULE, Properties::new());
}

/// A registry with the entity classes.
#[must_use]
pub fn registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    register_classes(&mut registry);
    registry
}
