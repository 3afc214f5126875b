//! Integration tests for recordsets
//!
//! Tests row access, collection events, keys and nesting in records.

use quire_entity::{
    FieldDescriptor, ON_COLLECTION_CHANGE, Record, RecordSet, RecordSetOptions, RecordState,
};
use quire_foundation::{Array, Type, Value, object};
use std::cell::RefCell;
use std::rc::Rc;

fn rows(items: &[(i64, &str)]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|(id, name)| object! { "id" => *id, "name" => *name })
            .collect::<Array>(),
    )
}

fn keyed() -> Rc<RecordSet> {
    RecordSet::with_options(
        RecordSetOptions::new()
            .with_raw_data(rows(&[(10, "a"), (20, "b"), (30, "c")]))
            .with_key_property("id"),
    )
    .unwrap()
}

#[test]
fn rows_are_found_by_key_and_value() {
    let set = keyed();
    assert_eq!(set.count(), 3);
    let row = set.get_record_by_key(&Value::Int(20)).unwrap();
    assert_eq!(row.get("name"), Value::from("b"));
    assert_eq!(set.index_of(&row), Some(1));
    assert_eq!(set.get_index_by_value("name", &Value::from("c")), Some(2));
    assert!(set.get_record_by_key(&Value::Int(99)).is_none());
}

#[test]
fn collection_events_name_the_action() {
    let set = keyed();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    set.subscribe(ON_COLLECTION_CHANGE, move |event| {
        log.borrow_mut().push(event.args[0].clone());
    });

    set.add(&Record::new(object! { "id" => 40, "name" => "d" }), None).unwrap();
    set.remove_at(0).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::from("add"), Value::from("remove")]);
}

#[test]
fn added_rows_are_copies() {
    let set = keyed();
    let source = Record::new(object! { "id" => 40, "name" => "d" });
    let row = set.add(&source, Some(0)).unwrap();
    assert!(!Rc::ptr_eq(&row, &source));
    assert_eq!(row.get_state(), RecordState::Added);

    source.set("name", "changed").unwrap();
    assert_eq!(set.at(0).unwrap().get("name"), Value::from("d"));
    assert!(set.add(&source, Some(9)).is_err());
}

#[test]
fn replaced_rows_are_detached() {
    let set = keyed();
    let old = set
        .replace(&Record::new(object! { "id" => 21, "name" => "x" }), 1)
        .unwrap();
    assert_eq!(old.get_state(), RecordState::Detached);
    assert_eq!(set.at(1).unwrap().get("id"), Value::Int(21));
}

#[test]
fn deleted_rows_stay_until_accepted() {
    let set = keyed();
    set.delete_at(0).unwrap();
    assert_eq!(set.count(), 3);
    assert_eq!(set.at(0).unwrap().get_state(), RecordState::Deleted);
    assert!(set.is_changed());

    set.accept_changes(false);
    assert_eq!(set.count(), 2);
    assert!(!set.is_changed());
}

#[test]
fn fields_are_added_to_every_row() {
    let set = keyed();
    set.add_field(FieldDescriptor::new("flag", Type::Boolean).with_default(serde_json::json!(false)), None)
        .unwrap();
    set.each(|row, _| assert_eq!(row.get("flag"), Value::Bool(false)));
    set.remove_field("flag").unwrap();
    assert!(!set.at(0).unwrap().has("flag"));
}

#[test]
fn row_changes_bump_the_set_version() {
    let set = keyed();
    let before = set.get_version();
    set.at(2).unwrap().set("name", "z").unwrap();
    assert!(set.get_version() > before);
    assert!(set.is_changed());

    set.reject_changes(false);
    assert_eq!(set.at(2).unwrap().get("name"), Value::from("c"));
}

#[test]
fn clones_are_independent() {
    let set = keyed();
    let copy = set.clone_set();
    copy.at(0).unwrap().set("name", "other").unwrap();
    assert_eq!(set.at(0).unwrap().get("name"), Value::from("a"));
    assert!(!copy.is_equal(&set));
}
