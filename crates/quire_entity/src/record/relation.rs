use quire_foundation::{InstanceId, Map, Value};
use quire_relation::{
    ChangeData, EdgeName, Mediator, Participant, RelationReceiver, Version, VersionTracked, Which,
};
use tracing::{trace, warn};

use super::Record;
use crate::nested::Nested;
use crate::observable::ON_PROPERTY_CHANGE;

impl Participant for Record {
    fn instance_id(&self) -> InstanceId {
        self.core.id()
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }

    fn mediator(&self) -> Option<Mediator> {
        self.core.mediator()
    }

    fn adopt_mediator(&self, mediator: Mediator) {
        self.core.adopt(mediator);
    }

    fn receiver(&self) -> Option<&dyn RelationReceiver> {
        Some(self)
    }

    fn versioned(&self) -> Option<&dyn VersionTracked> {
        Some(self)
    }

    fn destroy(&self) {
        Record::destroy(self);
    }
}

impl VersionTracked for Record {
    fn version(&self) -> &Version {
        self.core.version()
    }
}

impl RelationReceiver for Record {
    /// A nested entity below field `route[0]` changed.
    ///
    /// The field's raw data is rewritten from the entity, and the field is
    /// marked changed for as long as the entity reports changes.
    fn relation_changed(&self, which: &Which, route: &[EdgeName]) -> Option<ChangeData> {
        let name = route.first().cloned().flatten()?;
        let child = self.cached(&name)?;
        let nested = Nested::of(&child)?;
        trace!(record = %self.core.id(), field = %name, "nested value changed");

        let before = self.state.get();
        match which.data {
            ChangeData::Accept | ChangeData::Reject => {
                if !nested.is_changed() {
                    self.unmark_reference(&name);
                }
                self.sync_state();
                self.notify_state(before);
                None
            }
            ChangeData::Format => None,
            _ => {
                let adapter = self.data.adapter().clone();
                let raw_value = nested.raw();
                if let Err(error) = self
                    .data
                    .with_raw_mut(|raw| adapter.for_record().set(raw, &name, raw_value))
                {
                    warn!(field = %name, %error, "cannot write nested value back");
                }
                if nested.is_changed() {
                    self.mark_reference(&name, &child);
                } else {
                    self.unmark_reference(&name);
                }
                self.sync_state();

                let args: Map = [(name.clone(), child.clone())].into_iter().collect();
                self.core.notify(ON_PROPERTY_CHANGE, vec![Value::Object(args)]);
                self.notify_state(before);
                self.notify_listener(std::slice::from_ref(&name));
                Some(ChangeData::field(name, child))
            }
        }
    }

    /// Owners ask rows to accept or reject, and announce format changes.
    fn parent_changed(&self, data: &ChangeData, _name: Option<&str>) {
        match data {
            ChangeData::Accept => self.accept_changes(None, false, true),
            ChangeData::Reject => self.reject_changes(None, false, true),
            ChangeData::Format => self.data.reset_format(),
            _ => {}
        }
    }
}
