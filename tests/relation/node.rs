//! A minimal versioned participant recording what reaches it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quire_foundation::InstanceId;
use quire_relation::{
    ChangeData, EdgeName, Mediator, Participant, ParticipantRef, RelationReceiver, Version,
    VersionTracked, Which, destroy_cascade,
};

pub struct Node {
    pub id: InstanceId,
    pub mediator: RefCell<Option<Mediator>>,
    pub destroyed: Cell<bool>,
    pub version: Version,
    pub routes: RefCell<Vec<Vec<String>>>,
    pub broadcasts: RefCell<Vec<Option<String>>>,
}

impl Node {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: InstanceId::next(),
            mediator: RefCell::new(None),
            destroyed: Cell::new(false),
            version: Version::new(),
            routes: RefCell::new(Vec::new()),
            broadcasts: RefCell::new(Vec::new()),
        })
    }

    pub fn owning(mediator: &Mediator) -> Rc<Self> {
        let node = Self::new();
        node.adopt_mediator(mediator.clone());
        node
    }

    pub fn handle(self: &Rc<Self>) -> ParticipantRef {
        self.clone()
    }

    pub fn own(self: &Rc<Self>, slave: &Rc<Node>, name: &str) {
        let mediator = self
            .mediator()
            .unwrap_or_else(|| {
                let mediator = Mediator::new();
                self.adopt_mediator(mediator.clone());
                mediator
            });
        mediator.add_relationship(&self.handle(), &slave.handle(), Some(name));
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

    fn receiver(&self) -> Option<&dyn RelationReceiver> {
        Some(self)
    }

    fn versioned(&self) -> Option<&dyn VersionTracked> {
        Some(self)
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        destroy_cascade(self);
    }
}

impl VersionTracked for Node {
    fn version(&self) -> &Version {
        &self.version
    }
}

impl RelationReceiver for Node {
    fn relation_changed(&self, _which: &Which, route: &[EdgeName]) -> Option<ChangeData> {
        self.routes.borrow_mut().push(
            route
                .iter()
                .map(|name| name.as_deref().unwrap_or("").to_string())
                .collect(),
        );
        None
    }

    fn parent_changed(&self, _data: &ChangeData, name: Option<&str>) {
        self.broadcasts.borrow_mut().push(name.map(str::to_string));
    }
}
