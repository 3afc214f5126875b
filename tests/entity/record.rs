//! Integration tests for records
//!
//! Tests change tracking, states, events and nested write-back.

use quire_entity::{
    FieldDeclaration, FormatDeclaration, ON_PROPERTY_CHANGE, ON_STATE_CHANGE, Record,
    RecordOptions, RecordState,
};
use quire_foundation::{ErrorKind, Instance, Map, Type, Value, object};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn unchanged(raw: Value) -> Rc<Record> {
    Record::with_options(
        RecordOptions::new()
            .with_raw_data(raw)
            .with_state(RecordState::Unchanged),
    )
    .unwrap()
}

fn owner_of(child: &Rc<Record>) -> Rc<Record> {
    let mut object = Map::new();
    object.insert("child", Value::Instance(Instance::new(child.clone())));
    Record::from_object(&object).unwrap()
}

fn child_of(record: &Record) -> Rc<Record> {
    record
        .get("child")
        .as_instance()
        .and_then(|instance| instance.downcast::<Record>())
        .unwrap()
}

// =============================================================================
// Change Tracking
// =============================================================================

#[test]
fn changes_and_originals() {
    let record = unchanged(object! { "a" => 1, "b" => "x" });
    record.set("a", 2).unwrap();
    record.set("b", "y").unwrap();

    assert_eq!(
        record.get_changed(),
        vec![Arc::<str>::from("a"), Arc::<str>::from("b")]
    );
    assert_eq!(record.get_original("a"), Value::Int(1));

    record.accept_changes(Some(&["a"][..]), false, false);
    assert_eq!(record.get_changed(), vec![Arc::<str>::from("b")]);
    assert_eq!(record.get_state(), RecordState::Changed);

    record.reject_changes(None, false, false);
    assert_eq!(record.get("b"), Value::from("x"));
    assert_eq!(record.get("a"), Value::Int(2));
    assert_eq!(record.get_state(), RecordState::Unchanged);
}

#[test]
fn type_mismatch_leaves_the_value() {
    let record = Record::with_options(
        RecordOptions::new()
            .with_raw_data(object! { "n" => 1 })
            .with_format(FormatDeclaration::Partial(vec![
                FieldDeclaration::new("n").with_type(Type::Integer),
            ])),
    )
    .unwrap();
    let error = record.set("n", "one").unwrap_err();
    assert!(matches!(error.kind, ErrorKind::TypeMismatch { .. }));
    assert_eq!(record.get("n"), Value::Int(1));
    assert!(!record.is_changed());
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn state_events_follow_transitions() {
    let record = unchanged(object! { "a" => 1 });
    let states = Rc::new(RefCell::new(Vec::new()));
    let log = states.clone();
    record.subscribe(ON_STATE_CHANGE, move |event| {
        log.borrow_mut().push(event.args[0].clone());
    });

    record.set("a", 2).unwrap();
    record.set("a", 3).unwrap();
    record.set("a", 1).unwrap();

    assert_eq!(
        *states.borrow(),
        vec![Value::from("Changed"), Value::from("Unchanged")]
    );
}

#[test]
fn silenced_records_raise_nothing() {
    let record = unchanged(object! { "a" => 1 });
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    record.subscribe(ON_PROPERTY_CHANGE, move |_| *counter.borrow_mut() += 1);

    record.set_event_raising(false);
    record.set("a", 2).unwrap();
    record.set_event_raising(true);
    record.set("a", 3).unwrap();
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn unsubscribed_handlers_stop() {
    let record = unchanged(object! { "a" => 1 });
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    let id = record.subscribe(ON_PROPERTY_CHANGE, move |_| *counter.borrow_mut() += 1);
    record.set("a", 2).unwrap();
    assert!(record.unsubscribe(id));
    record.set("a", 3).unwrap();
    assert_eq!(*count.borrow(), 1);
}

// =============================================================================
// Nesting
// =============================================================================

#[test]
fn deep_changes_reach_the_root() {
    let leaf = Record::new(object! { "x" => 0 });
    let middle = owner_of(&leaf);
    let root = owner_of(&middle);
    assert!(!root.is_changed());

    leaf.set("x", 9).unwrap();

    let raw = root.get_raw_data();
    let x = raw
        .get("child")
        .and_then(|v| v.get("child"))
        .and_then(|v| v.get("x"));
    assert_eq!(x, Some(&Value::Int(9)));
    assert!(root.is_field_changed("child"));
    assert!(root.get_version() > 0);
    assert!(middle.get_version() > 0);
}

#[test]
fn cascading_reject_restores_the_tree() {
    let leaf = Record::new(object! { "x" => 0 });
    let root = owner_of(&owner_of(&leaf));
    leaf.set("x", 5).unwrap();

    root.reject_changes(None, false, true);
    assert_eq!(leaf.get("x"), Value::Int(0));
    assert!(!leaf.is_changed());
    assert!(!root.is_changed());
}

#[test]
fn shallow_reject_clears_reference_markers() {
    let leaf = Record::new(object! { "x" => 0 });
    let root = owner_of(&leaf);
    leaf.set("x", 5).unwrap();
    assert!(root.is_field_changed("child"));

    root.reject_changes(None, false, false);
    assert!(!root.is_changed());
    assert_eq!(leaf.get("x"), Value::Int(5));
    assert!(leaf.is_changed());
}

#[test]
fn rejecting_a_clone_leaves_the_source_alone() {
    let leaf = Record::new(object! { "x" => 0 });
    let root = owner_of(&leaf);
    leaf.set("x", 5).unwrap();

    let copy = root.clone_record();
    assert!(copy.is_field_changed("child"));
    let copied_leaf = child_of(&copy);
    assert!(!Rc::ptr_eq(&copied_leaf, &leaf));

    copy.reject_changes(None, false, true);
    assert_eq!(copied_leaf.get("x"), Value::Int(0));
    assert!(!copy.is_changed());

    assert_eq!(leaf.get("x"), Value::Int(5));
    assert!(leaf.is_changed());
    assert!(root.is_field_changed("child"));
}

#[test]
fn cached_children_are_the_assigned_instances() {
    let leaf = Record::new(object! { "x" => 0 });
    let root = owner_of(&leaf);
    assert!(Rc::ptr_eq(&child_of(&root), &leaf));
}

#[test]
fn destroying_the_root_destroys_owned_children() {
    let leaf = Record::new(object! { "x" => 0 });
    let root = owner_of(&leaf);
    root.destroy();
    assert!(leaf.is_destroyed());
}

#[test]
fn version_counts_batches() {
    let record = unchanged(object! { "a" => 1, "b" => 2 });
    let before = record.get_version();
    record
        .set_many([("a", Value::Int(10)), ("b", Value::Int(20))])
        .unwrap();
    assert_eq!(record.get_version(), before + 1);
    record.set("a", 11).unwrap();
    assert_eq!(record.get_version(), before + 2);
}
