//! Integration tests for change propagation
//!
//! Tests upward routes, downward broadcasts, versions and destruction.

use quire_relation::{ChangeData, Participant, bump_version, child_changed, parent_changed};

use crate::node::Node;

#[test]
fn changes_reach_every_master_with_its_route() {
    let top = Node::new();
    let middle = Node::new();
    let bottom = Node::new();
    top.own(&middle, "middle");
    middle.own(&bottom, "bottom");

    child_changed(&bottom.handle(), ChangeData::Custom("x".into()));

    assert_eq!(*middle.routes.borrow(), vec![vec!["bottom".to_string()]]);
    assert_eq!(
        *top.routes.borrow(),
        vec![vec!["middle".to_string(), "bottom".to_string()]]
    );
    assert!(bottom.routes.borrow().is_empty());
}

#[test]
fn cyclic_graphs_notify_each_master_once() {
    let a = Node::new();
    let b = Node::new();
    a.own(&b, "b");
    b.own(&a, "a");

    child_changed(&a.handle(), ChangeData::Accept);
    assert_eq!(b.routes.borrow().len(), 1);
    assert!(a.routes.borrow().is_empty());
}

#[test]
fn broadcasts_reach_direct_slaves_only() {
    let top = Node::new();
    let middle = Node::new();
    let bottom = Node::new();
    top.own(&middle, "middle");
    middle.own(&bottom, "bottom");

    parent_changed(&*top, &ChangeData::Format);
    assert_eq!(*middle.broadcasts.borrow(), vec![Some("middle".to_string())]);
    assert!(bottom.broadcasts.borrow().is_empty());
}

#[test]
fn versions_bump_up_the_graph() {
    let top = Node::new();
    let bottom = Node::new();
    top.own(&bottom, "bottom");

    bump_version(&*bottom);
    assert_eq!(bottom.version.get(), 1);
    assert_eq!(top.version.get(), 1);

    top.version.lock();
    bump_version(&*bottom);
    bump_version(&*bottom);
    top.version.unlock(true);
    assert_eq!(bottom.version.get(), 3);
    assert_eq!(top.version.get(), 2);
}

#[test]
fn destroy_spares_shared_slaves() {
    let a = Node::new();
    let b = Node::new();
    let shared = Node::new();
    let private = Node::new();
    a.own(&shared, "shared");
    b.own(&shared, "shared");
    a.own(&private, "private");

    a.destroy();
    assert!(private.is_destroyed());
    assert!(!shared.is_destroyed());
}
