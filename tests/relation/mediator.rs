//! Integration tests for the relationship mediator
//!
//! Tests linking, traversal in both directions, adoption and cleanup.

use quire_relation::{Clear, Mediator, Participant};

use crate::node::Node;

fn slave_names(mediator: &Mediator, master: &Node) -> Vec<String> {
    let mut names = Vec::new();
    mediator.has_many(master, |_, name| names.push(name.unwrap_or("").to_string()));
    names.sort();
    names
}

#[test]
fn edges_are_visible_from_both_ends() {
    let mediator = Mediator::new();
    let parent = Node::owning(&mediator);
    let child = Node::new();
    mediator.add_relationship(&parent.handle(), &child.handle(), Some("child"));

    assert!(mediator.has_relationship(&*parent, &*child));
    assert_eq!(slave_names(&mediator, &parent), vec!["child"]);

    let mut masters = Vec::new();
    mediator.belongs_to(&*child, |master, _| masters.push(master.instance_id()));
    assert_eq!(masters, vec![parent.id]);
}

#[test]
fn slaves_adopt_the_master_mediator() {
    let parent = Node::new();
    let child = Node::new();
    let grandchild = Node::new();
    child.own(&grandchild, "leaf");
    parent.own(&child, "branch");

    let shared = parent.mediator().unwrap();
    assert!(child.mediator().unwrap().ptr_eq(&shared));
    assert_eq!(slave_names(&shared, &child), vec!["leaf"]);
}

#[test]
fn one_slave_many_masters() {
    let mediator = Mediator::new();
    let a = Node::owning(&mediator);
    let b = Node::owning(&mediator);
    let shared = Node::new();
    a.own(&shared, "x");
    b.own(&shared, "y");

    let mut count = 0;
    mediator.belongs_to(&*shared, |_, _| count += 1);
    assert_eq!(count, 2);

    mediator.remove_relationship(&*a, &*shared);
    assert!(mediator.has_masters(&*shared));
    mediator.remove_relationship(&*b, &*shared);
    assert!(!mediator.has_masters(&*shared));
}

#[test]
fn clear_slaves_keeps_masters() {
    let mediator = Mediator::new();
    let top = Node::owning(&mediator);
    let middle = Node::new();
    let bottom = Node::new();
    top.own(&middle, "m");
    middle.own(&bottom, "b");

    mediator.clear(&*middle, Clear::Slaves);
    assert!(slave_names(&mediator, &middle).is_empty());
    assert!(mediator.has_masters(&*middle));
}

#[test]
fn dropped_participants_disappear() {
    let mediator = Mediator::new();
    let parent = Node::owning(&mediator);
    {
        let child = Node::new();
        parent.own(&child, "gone");
    }
    assert!(slave_names(&mediator, &parent).is_empty());
    assert_eq!(mediator.edge_count(), 1);
    mediator.compact();
    assert_eq!(mediator.edge_count(), 0);
}
