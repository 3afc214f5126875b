//! Plumbing shared by every entity: identity, mediator, version and events.

use std::cell::{Cell, RefCell};

use quire_foundation::{InstanceId, Value};
use quire_relation::{Mediator, ParticipantRef, Version};

use crate::observable::{Event, Notifier, SubscriptionId};

/// Identity, relationships, version counter and notifier of one entity.
#[derive(Debug)]
pub(crate) struct EntityCore {
    id: InstanceId,
    mediator: RefCell<Option<Mediator>>,
    version: Version,
    notifier: Notifier,
    destroyed: Cell<bool>,
}

impl Default for EntityCore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCore {
    /// Creates the core of a new entity.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            id: InstanceId::next(),
            mediator: RefCell::new(None),
            version: Version::new(),
            notifier: Notifier::new(),
            destroyed: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn mediator(&self) -> Option<Mediator> {
        self.mediator.borrow().clone()
    }

    pub(crate) fn adopt(&self, mediator: Mediator) {
        *self.mediator.borrow_mut() = Some(mediator);
    }

    pub(crate) fn version(&self) -> &Version {
        &self.version
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }

    /// Links `child` below `this`, creating a mediator on first use.
    pub(crate) fn add_child(&self, this: &ParticipantRef, child: &ParticipantRef, name: &str) {
        let mediator = self
            .mediator
            .borrow_mut()
            .get_or_insert_with(Mediator::new)
            .clone();
        mediator.add_relationship(this, child, Some(name));
    }

    /// Unlinks `child` from `this`.
    pub(crate) fn remove_child(&self, this: &ParticipantRef, child: &ParticipantRef) {
        if let Some(mediator) = self.mediator() {
            mediator.remove_relationship(this.as_ref(), child.as_ref());
        }
    }

    pub(crate) fn notify(&self, name: &str, args: Vec<Value>) {
        self.notifier.notify(name, args);
    }

    pub(crate) fn subscribe(
        &self,
        name: &str,
        handler: impl Fn(&Event) + 'static,
    ) -> SubscriptionId {
        self.notifier.channel().subscribe(name, handler)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.channel().unsubscribe(id)
    }
}
