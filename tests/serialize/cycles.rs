//! Integration tests for cyclic graphs
//!
//! Tests that cycles serialize as links and revive with their references
//! restored.

use quire_foundation::{
    Error, ErrorKind, Instance, PathSegment, Result, Serializable, Value, display_path, object,
};
use quire_serialize::{ClassRegistry, from_str, to_string};
use std::cell::RefCell;
use std::rc::Rc;

struct Peer {
    name: String,
    other: RefCell<Value>,
}

impl Peer {
    fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            other: RefCell::new(Value::Null),
        })
    }

    fn other(&self) -> Option<Rc<Peer>> {
        self.other
            .borrow()
            .as_instance()
            .and_then(|instance| instance.downcast::<Peer>())
    }
}

impl Serializable for Peer {
    fn module_name(&self) -> Option<&str> {
        Some("test.Peer")
    }

    fn serializable_state(&self) -> Result<Value> {
        Ok(object! {
            "name" => self.name.as_str(),
            "other" => self.other.borrow().clone(),
        })
    }

    fn restore_link(&self, path: &[PathSegment], target: Value) -> Result<()> {
        match path {
            [PathSegment::Key(key)] if &**key == "other" => {
                *self.other.borrow_mut() = target;
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::UnresolvedLink(display_path(path)))),
        }
    }
}

fn registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry.register_class("test.Peer", |state| {
        let peer = Peer::new(state.get("name").and_then(Value::as_str).unwrap_or_default());
        *peer.other.borrow_mut() = state.get("other").cloned().unwrap_or(Value::Null);
        Ok(Instance::new(peer))
    });
    registry
}

fn pair() -> (Rc<Peer>, Rc<Peer>) {
    let a = Peer::new("a");
    let b = Peer::new("b");
    *a.other.borrow_mut() = Value::Instance(Instance::new(b.clone()));
    *b.other.borrow_mut() = Value::Instance(Instance::new(a.clone()));
    (a, b)
}

#[test]
fn two_node_cycle_serializes_two_instances() {
    let (a, _b) = pair();
    let text = to_string(&Value::Instance(Instance::new(a))).unwrap();
    assert_eq!(text.matches(r#""$serialized$":"inst""#).count(), 2);
    assert_eq!(text.matches(r#""$serialized$":"link""#).count(), 1);
}

#[test]
fn two_node_cycle_revives_closed() {
    let (a, _b) = pair();
    let text = to_string(&Value::Instance(Instance::new(a))).unwrap();
    let root = from_str(&text, &registry()).unwrap();

    let a = root.as_instance().and_then(|i| i.downcast::<Peer>()).unwrap();
    let b = a.other().unwrap();
    assert_eq!(a.name, "a");
    assert_eq!(b.name, "b");
    assert!(Rc::ptr_eq(&b.other().unwrap(), &a));
}

#[test]
fn self_reference_revives() {
    let lonely = Peer::new("self");
    *lonely.other.borrow_mut() = Value::Instance(Instance::new(lonely.clone()));
    let text = to_string(&Value::Instance(Instance::new(lonely))).unwrap();

    let root = from_str(&text, &registry()).unwrap();
    let peer = root.as_instance().and_then(|i| i.downcast::<Peer>()).unwrap();
    assert!(Rc::ptr_eq(&peer.other().unwrap(), &peer));
}

#[test]
fn serializing_twice_gives_fresh_ids() {
    let (a, _b) = pair();
    let value = Value::Instance(Instance::new(a));
    let first = to_string(&value).unwrap();
    let second = to_string(&value).unwrap();
    assert_ne!(first, second);
    let registry = registry();
    assert!(from_str(&first, &registry).is_ok());
    assert!(from_str(&second, &registry).is_ok());
}
