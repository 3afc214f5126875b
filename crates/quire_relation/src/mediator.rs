//! Many-to-many relationship storage with bidirectional indices.
//!
//! Edges connect a master to a slave under an optional name. Both directions
//! are indexed so traversal is O(1) per hop:
//! - `has_many`: master -> slave -> name
//! - `belongs_to`: slave -> master -> name
//!
//! Edges hold weak references only. A side that is dropped or destroyed is
//! skipped during traversal and pruned lazily.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use quire_foundation::InstanceId;
use tracing::trace;

use crate::participant::{EdgeName, Participant, ParticipantRef};

/// Which side of an entity's edges to clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Clear {
    /// Edges in both directions.
    All,
    /// Edges to the entity's masters.
    Masters,
    /// Edges to the entity's slaves.
    Slaves,
}

#[derive(Clone)]
struct Edge {
    other: Weak<dyn Participant>,
    name: EdgeName,
}

impl Edge {
    fn live(&self) -> Option<ParticipantRef> {
        self.other.upgrade().filter(|p| !p.is_destroyed())
    }
}

/// Stores relationship edges between participants.
#[derive(Default)]
pub struct ManyToMany {
    /// Forward index: master -> slave -> edge.
    has_many: HashMap<InstanceId, BTreeMap<InstanceId, Edge>>,
    /// Reverse index: slave -> master -> edge.
    belongs_to: HashMap<InstanceId, BTreeMap<InstanceId, Edge>>,
}

impl ManyToMany {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge. Re-adding an existing edge only updates its name.
    pub fn insert(&mut self, master: &ParticipantRef, slave: &ParticipantRef, name: EdgeName) {
        let master_id = master.instance_id();
        let slave_id = slave.instance_id();
        self.has_many.entry(master_id).or_default().insert(
            slave_id,
            Edge {
                other: Rc::downgrade(slave),
                name: name.clone(),
            },
        );
        self.belongs_to.entry(slave_id).or_default().insert(
            master_id,
            Edge {
                other: Rc::downgrade(master),
                name,
            },
        );
    }

    /// Removes an edge. Removing a missing edge is a no-op.
    pub fn remove(&mut self, master: InstanceId, slave: InstanceId) {
        if let Some(slaves) = self.has_many.get_mut(&master) {
            slaves.remove(&slave);
            if slaves.is_empty() {
                self.has_many.remove(&master);
            }
        }
        if let Some(masters) = self.belongs_to.get_mut(&slave) {
            masters.remove(&master);
            if masters.is_empty() {
                self.belongs_to.remove(&slave);
            }
        }
    }

    /// Checks if a specific edge exists, live or not.
    #[must_use]
    pub fn has_edge(&self, master: InstanceId, slave: InstanceId) -> bool {
        self.has_many
            .get(&master)
            .is_some_and(|slaves| slaves.contains_key(&slave))
    }

    /// Returns the name of an edge.
    #[must_use]
    pub fn edge_name(&self, master: InstanceId, slave: InstanceId) -> Option<EdgeName> {
        self.has_many
            .get(&master)
            .and_then(|slaves| slaves.get(&slave))
            .map(|edge| edge.name.clone())
    }

    /// Removes edges of an entity in the requested direction(s), fixing up the
    /// opposite index of every removed edge.
    pub fn clear(&mut self, entity: InstanceId, which: Clear) {
        if matches!(which, Clear::All | Clear::Slaves) {
            if let Some(slaves) = self.has_many.remove(&entity) {
                for slave in slaves.keys() {
                    if let Some(masters) = self.belongs_to.get_mut(slave) {
                        masters.remove(&entity);
                        if masters.is_empty() {
                            self.belongs_to.remove(slave);
                        }
                    }
                }
            }
        }
        if matches!(which, Clear::All | Clear::Masters) {
            if let Some(masters) = self.belongs_to.remove(&entity) {
                for master in masters.keys() {
                    if let Some(slaves) = self.has_many.get_mut(master) {
                        slaves.remove(&entity);
                        if slaves.is_empty() {
                            self.has_many.remove(master);
                        }
                    }
                }
            }
        }
    }

    /// Drops every edge whose other side is gone or destroyed.
    pub fn compact(&mut self) {
        let dead: Vec<(InstanceId, InstanceId)> = self
            .has_many
            .iter()
            .flat_map(|(master, slaves)| {
                slaves
                    .iter()
                    .filter(|(_, edge)| edge.live().is_none())
                    .map(move |(slave, _)| (*master, *slave))
            })
            .chain(self.belongs_to.iter().flat_map(|(slave, masters)| {
                masters
                    .iter()
                    .filter(|(_, edge)| edge.live().is_none())
                    .map(move |(master, _)| (*master, *slave))
            }))
            .collect();
        for (master, slave) in dead {
            self.remove(master, slave);
        }
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.has_many.values().map(BTreeMap::len).sum()
    }

    /// Returns true if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.has_many.is_empty()
    }

    fn slaves_of(&self, master: InstanceId) -> Vec<Edge> {
        self.has_many
            .get(&master)
            .map(|slaves| slaves.values().cloned().collect())
            .unwrap_or_default()
    }

    fn masters_of(&self, slave: InstanceId) -> Vec<Edge> {
        self.belongs_to
            .get(&slave)
            .map(|masters| masters.values().cloned().collect())
            .unwrap_or_default()
    }

    fn copy_edges_of(&self, entity: InstanceId, into: &mut Self) {
        if let Some(slaves) = self.has_many.get(&entity) {
            for (slave_id, edge) in slaves {
                let Some(back) = self
                    .belongs_to
                    .get(slave_id)
                    .and_then(|masters| masters.get(&entity))
                else {
                    continue;
                };
                into.has_many
                    .entry(entity)
                    .or_default()
                    .insert(*slave_id, edge.clone());
                into.belongs_to
                    .entry(*slave_id)
                    .or_default()
                    .insert(entity, back.clone());
            }
        }
        if let Some(masters) = self.belongs_to.get(&entity) {
            for (master_id, edge) in masters {
                let Some(forward) = self
                    .has_many
                    .get(master_id)
                    .and_then(|slaves| slaves.get(&entity))
                else {
                    continue;
                };
                into.belongs_to
                    .entry(entity)
                    .or_default()
                    .insert(*master_id, edge.clone());
                into.has_many
                    .entry(*master_id)
                    .or_default()
                    .insert(entity, forward.clone());
            }
        }
    }
}

impl fmt::Debug for ManyToMany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyToMany")
            .field("edges", &self.len())
            .finish()
    }
}

/// Shared handle to a relationship store.
///
/// Cloning the handle shares the store. The store is never borrowed while
/// traversal callbacks run, so callbacks may add or remove edges.
#[derive(Clone, Default)]
pub struct Mediator(Rc<RefCell<ManyToMany>>);

impl Mediator {
    /// Creates a mediator with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if both handles share the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Links a master to a slave.
    ///
    /// Idempotent. A slave that holds a different mediator adopts this one;
    /// its existing edges are copied over so the subtree below it stays
    /// reachable.
    pub fn add_relationship(
        &self,
        master: &ParticipantRef,
        slave: &ParticipantRef,
        name: Option<&str>,
    ) {
        let name: EdgeName = name.map(Arc::from);
        self.0.borrow_mut().insert(master, slave, name);

        match slave.mediator() {
            Some(current) if current.ptr_eq(self) => {}
            Some(current) => {
                trace!(slave = %slave.instance_id(), "slave adopts master mediator");
                current
                    .0
                    .borrow()
                    .copy_edges_of(slave.instance_id(), &mut self.0.borrow_mut());
                slave.adopt_mediator(self.clone());
            }
            None => slave.adopt_mediator(self.clone()),
        }
    }

    /// Unlinks a master from a slave.
    pub fn remove_relationship(&self, master: &dyn Participant, slave: &dyn Participant) {
        self.0
            .borrow_mut()
            .remove(master.instance_id(), slave.instance_id());
    }

    /// Checks if an edge exists between two participants.
    #[must_use]
    pub fn has_relationship(&self, master: &dyn Participant, slave: &dyn Participant) -> bool {
        self.0
            .borrow()
            .has_edge(master.instance_id(), slave.instance_id())
    }

    /// Calls `f` once per live slave of `master` with the edge name.
    pub fn has_many(&self, master: &dyn Participant, mut f: impl FnMut(ParticipantRef, Option<&str>)) {
        let edges = self.0.borrow().slaves_of(master.instance_id());
        for edge in edges {
            if let Some(slave) = edge.live() {
                f(slave, edge.name.as_deref());
            }
        }
    }

    /// Calls `f` once per live master of `slave` with the edge name.
    pub fn belongs_to(&self, slave: &dyn Participant, mut f: impl FnMut(ParticipantRef, Option<&str>)) {
        let edges = self.0.borrow().masters_of(slave.instance_id());
        for edge in edges {
            if let Some(master) = edge.live() {
                f(master, edge.name.as_deref());
            }
        }
    }

    /// Returns true if `slave` has at least one live master.
    #[must_use]
    pub fn has_masters(&self, slave: &dyn Participant) -> bool {
        let edges = self.0.borrow().masters_of(slave.instance_id());
        edges.iter().any(|edge| edge.live().is_some())
    }

    /// Removes edges of an entity in the requested direction(s).
    pub fn clear(&self, entity: &dyn Participant, which: Clear) {
        self.0.borrow_mut().clear(entity.instance_id(), which);
    }

    /// Drops edges to dropped or destroyed participants.
    pub fn compact(&self) {
        self.0.borrow_mut().compact();
    }

    /// Returns the number of stored edges, including tombstoned ones.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.0.borrow().len()
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mediator({:?})", self.0.borrow())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Minimal participant used by the tests of this crate.
    pub(crate) struct Node {
        id: InstanceId,
        mediator: RefCell<Option<Mediator>>,
        destroyed: Cell<bool>,
    }

    impl Node {
        pub(crate) fn new() -> Rc<Self> {
            Rc::new(Self {
                id: InstanceId::next(),
                mediator: RefCell::new(None),
                destroyed: Cell::new(false),
            })
        }
    }

    impl Participant for Node {
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

        fn destroy(&self) {
            self.destroyed.set(true);
        }
    }

    fn as_ref(node: &Rc<Node>) -> ParticipantRef {
        node.clone()
    }

    fn slaves(mediator: &Mediator, node: &Rc<Node>) -> Vec<(InstanceId, Option<String>)> {
        let mut out = Vec::new();
        mediator.has_many(node.as_ref(), |p, name| {
            out.push((p.instance_id(), name.map(str::to_string)));
        });
        out
    }

    fn masters(mediator: &Mediator, node: &Rc<Node>) -> Vec<(InstanceId, Option<String>)> {
        let mut out = Vec::new();
        mediator.belongs_to(node.as_ref(), |p, name| {
            out.push((p.instance_id(), name.map(str::to_string)));
        });
        out
    }

    #[test]
    fn add_and_traverse_both_directions() {
        let mediator = Mediator::new();
        let master = Node::new();
        let slave = Node::new();

        mediator.add_relationship(&as_ref(&master), &as_ref(&slave), Some("child"));

        assert_eq!(
            slaves(&mediator, &master),
            vec![(slave.id, Some("child".to_string()))]
        );
        assert_eq!(
            masters(&mediator, &slave),
            vec![(master.id, Some("child".to_string()))]
        );
        assert!(slave.mediator().unwrap().ptr_eq(&mediator));
    }

    #[test]
    fn add_is_idempotent() {
        let mediator = Mediator::new();
        let master = Node::new();
        let slave = Node::new();

        mediator.add_relationship(&as_ref(&master), &as_ref(&slave), None);
        mediator.add_relationship(&as_ref(&master), &as_ref(&slave), None);

        assert_eq!(mediator.edge_count(), 1);
    }

    #[test]
    fn remove_relationship_is_symmetric() {
        let mediator = Mediator::new();
        let master = Node::new();
        let slave = Node::new();

        mediator.add_relationship(&as_ref(&master), &as_ref(&slave), None);
        mediator.remove_relationship(master.as_ref(), slave.as_ref());

        assert!(slaves(&mediator, &master).is_empty());
        assert!(masters(&mediator, &slave).is_empty());
        // Removing again is a no-op
        mediator.remove_relationship(master.as_ref(), slave.as_ref());
    }

    #[test]
    fn destroyed_participants_are_skipped() {
        let mediator = Mediator::new();
        let master = Node::new();
        let slave = Node::new();

        mediator.add_relationship(&as_ref(&master), &as_ref(&slave), None);
        slave.destroy();

        assert!(slaves(&mediator, &master).is_empty());
        // Tombstone stays until compaction
        assert_eq!(mediator.edge_count(), 1);
        mediator.compact();
        assert_eq!(mediator.edge_count(), 0);
    }

    #[test]
    fn dropped_participants_are_skipped() {
        let mediator = Mediator::new();
        let master = Node::new();
        {
            let slave = Node::new();
            mediator.add_relationship(&as_ref(&master), &as_ref(&slave), None);
        }
        assert!(slaves(&mediator, &master).is_empty());
    }

    #[test]
    fn clear_directions() {
        let mediator = Mediator::new();
        let top = Node::new();
        let middle = Node::new();
        let bottom = Node::new();

        mediator.add_relationship(&as_ref(&top), &as_ref(&middle), None);
        mediator.add_relationship(&as_ref(&middle), &as_ref(&bottom), None);

        mediator.clear(middle.as_ref(), Clear::Masters);
        assert!(slaves(&mediator, &top).is_empty());
        assert_eq!(slaves(&mediator, &middle).len(), 1);

        mediator.clear(middle.as_ref(), Clear::Slaves);
        assert!(masters(&mediator, &bottom).is_empty());
        assert!(mediator.edge_count() == 0);
    }

    #[test]
    fn adoption_copies_existing_edges() {
        let own = Mediator::new();
        let middle = Node::new();
        let bottom = Node::new();
        middle.adopt_mediator(own.clone());
        own.add_relationship(&as_ref(&middle), &as_ref(&bottom), Some("leaf"));

        let shared = Mediator::new();
        let top = Node::new();
        top.adopt_mediator(shared.clone());
        shared.add_relationship(&as_ref(&top), &as_ref(&middle), Some("middle"));

        assert!(middle.mediator().unwrap().ptr_eq(&shared));
        assert_eq!(
            slaves(&shared, &middle),
            vec![(bottom.id, Some("leaf".to_string()))]
        );
        assert_eq!(masters(&shared, &bottom).len(), 1);
    }

    #[test]
    fn has_masters_reports_live_edges() {
        let mediator = Mediator::new();
        let master = Node::new();
        let slave = Node::new();
        mediator.add_relationship(&as_ref(&master), &as_ref(&slave), None);

        assert!(mediator.has_masters(slave.as_ref()));
        master.destroy();
        assert!(!mediator.has_masters(slave.as_ref()));
    }
}
