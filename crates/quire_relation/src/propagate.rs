//! Change propagation along mediator edges.
//!
//! Changes travel upward from a slave to every master above it, and
//! structural notifications travel downward one level from a master to its
//! direct slaves.

use std::collections::HashSet;
use std::sync::Arc;

use quire_foundation::InstanceId;
use tracing::{debug, trace};

use crate::mediator::Clear;
use crate::participant::{ChangeData, EdgeName, Participant, ParticipantRef, Which};

/// Notifies every master above `child` that it changed.
///
/// Each master implementing [`crate::RelationReceiver`] sees the change with
/// the route of edge names from itself down to `child`. A master returning
/// new data replaces the payload for the masters above it. Every master is
/// visited at most once.
pub fn child_changed(child: &ParticipantRef, data: ChangeData) {
    let mut visited = HashSet::from([child.instance_id()]);
    let original = data.clone();
    walk_up(child.as_ref(), child, &data, &original, &[], &mut visited);
}

fn walk_up(
    current: &dyn Participant,
    target: &ParticipantRef,
    data: &ChangeData,
    original: &ChangeData,
    below: &[EdgeName],
    visited: &mut HashSet<InstanceId>,
) {
    let Some(mediator) = current.mediator() else {
        return;
    };
    let mut masters = Vec::new();
    mediator.belongs_to(current, |master, name| {
        masters.push((master, name.map(Arc::<str>::from)));
    });

    for (master, name) in masters {
        if !visited.insert(master.instance_id()) {
            continue;
        }
        let mut route = Vec::with_capacity(below.len() + 1);
        route.push(name);
        route.extend_from_slice(below);

        trace!(master = %master.instance_id(), depth = route.len(), "child changed");
        let next = master
            .receiver()
            .and_then(|receiver| {
                receiver.relation_changed(
                    &Which {
                        target: target.clone(),
                        data: data.clone(),
                        original: original.clone(),
                    },
                    &route,
                )
            })
            .unwrap_or_else(|| data.clone());

        walk_up(master.as_ref(), target, &next, original, &route, visited);
    }
}

/// Notifies the direct slaves of `parent`.
pub fn parent_changed(parent: &dyn Participant, data: &ChangeData) {
    let Some(mediator) = parent.mediator() else {
        return;
    };
    let mut slaves = Vec::new();
    mediator.has_many(parent, |slave, name| {
        slaves.push((slave, name.map(str::to_string)));
    });
    for (slave, name) in slaves {
        if let Some(receiver) = slave.receiver() {
            receiver.parent_changed(data, name.as_deref());
        }
    }
}

/// Unlinks a destroyed participant and destroys the slaves it owned alone.
///
/// The caller marks `entity` destroyed before calling this. Slaves that still
/// have another live master stay alive.
pub fn destroy_cascade(entity: &dyn Participant) {
    let Some(mediator) = entity.mediator() else {
        return;
    };
    let mut slaves = Vec::new();
    mediator.has_many(entity, |slave, _| slaves.push(slave));
    mediator.clear(entity, Clear::All);

    for slave in slaves {
        if mediator.has_masters(slave.as_ref()) {
            continue;
        }
        debug!(slave = %slave.instance_id(), "destroying orphaned slave");
        slave.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediator::Mediator;
    use crate::participant::RelationReceiver;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Participant that records what it receives.
    struct Probe {
        id: InstanceId,
        mediator: RefCell<Option<Mediator>>,
        destroyed: Cell<bool>,
        routes: RefCell<Vec<Vec<Option<String>>>>,
        fields: RefCell<Vec<String>>,
        parent_events: RefCell<Vec<Option<String>>>,
        rewrite: Option<&'static str>,
    }

    impl Probe {
        fn new() -> Rc<Self> {
            Self::rewriting(None)
        }

        fn rewriting(rewrite: Option<&'static str>) -> Rc<Self> {
            Rc::new(Self {
                id: InstanceId::next(),
                mediator: RefCell::new(None),
                destroyed: Cell::new(false),
                routes: RefCell::new(Vec::new()),
                fields: RefCell::new(Vec::new()),
                parent_events: RefCell::new(Vec::new()),
                rewrite,
            })
        }
    }

    impl Participant for Probe {
        fn instance_id(&self) -> InstanceId {
            self.id
        }

        fn is_destroyed(&self) -> bool {
            self.destroyed.get()
        }

        fn mediator(&self) -> Option<Mediator> {
            self.mediator.borrow().clone()
        }

        fn adopt_mediator(&self, mediator: Mediator) {
            *self.mediator.borrow_mut() = Some(mediator);
        }

        fn receiver(&self) -> Option<&dyn RelationReceiver> {
            Some(self)
        }

        fn destroy(&self) {
            if !self.destroyed.replace(true) {
                destroy_cascade(self);
            }
        }
    }

    impl RelationReceiver for Probe {
        fn relation_changed(&self, which: &Which, route: &[EdgeName]) -> Option<ChangeData> {
            self.routes
                .borrow_mut()
                .push(route.iter().map(|n| n.as_deref().map(str::to_string)).collect());
            if let ChangeData::Fields(fields) = &which.data {
                self.fields
                    .borrow_mut()
                    .extend(fields.iter().map(|(name, _)| name.to_string()));
            }
            self.rewrite.map(|name| ChangeData::field(name, 1.into()))
        }

        fn parent_changed(&self, _data: &ChangeData, name: Option<&str>) {
            self.parent_events.borrow_mut().push(name.map(str::to_string));
        }
    }

    fn link(mediator: &Mediator, master: &Rc<Probe>, slave: &Rc<Probe>, name: &str) {
        let master: ParticipantRef = master.clone();
        let slave: ParticipantRef = slave.clone();
        mediator.add_relationship(&master, &slave, Some(name));
    }

    fn owned(probe: &Rc<Probe>) -> Rc<Probe> {
        let mediator = Mediator::new();
        probe.adopt_mediator(mediator);
        probe.clone()
    }

    #[test]
    fn routes_accumulate_upward() {
        let top = owned(&Probe::new());
        let middle = Probe::new();
        let bottom = Probe::new();
        let mediator = top.mediator().unwrap();
        link(&mediator, &top, &middle, "middle");
        link(&mediator, &middle, &bottom, "bottom");

        let target: ParticipantRef = bottom.clone();
        child_changed(&target, ChangeData::field("x", 2.into()));

        assert_eq!(*middle.routes.borrow(), vec![vec![Some("bottom".to_string())]]);
        assert_eq!(
            *top.routes.borrow(),
            vec![vec![Some("middle".to_string()), Some("bottom".to_string())]]
        );
    }

    #[test]
    fn cycles_visit_each_master_once() {
        let a = owned(&Probe::new());
        let b = Probe::new();
        let mediator = a.mediator().unwrap();
        link(&mediator, &a, &b, "b");
        link(&mediator, &b, &a, "a");

        let target: ParticipantRef = a.clone();
        child_changed(&target, ChangeData::Accept);

        assert_eq!(b.routes.borrow().len(), 1);
        assert!(a.routes.borrow().is_empty());
    }

    #[test]
    fn receivers_can_replace_data() {
        let top = owned(&Probe::new());
        let middle = Probe::rewriting(Some("rewritten"));
        let bottom = Probe::new();
        let mediator = top.mediator().unwrap();
        link(&mediator, &top, &middle, "middle");
        link(&mediator, &middle, &bottom, "bottom");

        let target: ParticipantRef = bottom.clone();
        child_changed(&target, ChangeData::field("x", 2.into()));

        assert_eq!(*middle.fields.borrow(), vec!["x".to_string()]);
        assert_eq!(*top.fields.borrow(), vec!["rewritten".to_string()]);
    }

    #[test]
    fn parent_changed_reaches_direct_slaves_only() {
        let top = owned(&Probe::new());
        let middle = Probe::new();
        let bottom = Probe::new();
        let mediator = top.mediator().unwrap();
        link(&mediator, &top, &middle, "middle");
        link(&mediator, &middle, &bottom, "bottom");

        parent_changed(top.as_ref(), &ChangeData::Format);

        assert_eq!(*middle.parent_events.borrow(), vec![Some("middle".to_string())]);
        assert!(bottom.parent_events.borrow().is_empty());
    }

    #[test]
    fn destroy_spares_shared_slaves() {
        let first = owned(&Probe::new());
        let second = Probe::new();
        let exclusive = Probe::new();
        let shared = Probe::new();
        let mediator = first.mediator().unwrap();
        second.adopt_mediator(mediator.clone());
        link(&mediator, &first, &exclusive, "exclusive");
        link(&mediator, &first, &shared, "shared");
        link(&mediator, &second, &shared, "shared");

        first.destroy();

        assert!(exclusive.is_destroyed());
        assert!(!shared.is_destroyed());
        assert!(mediator.has_masters(shared.as_ref()));
    }
}
