//! Integration tests for enums and flags
//!
//! Tests standalone change tracking and live values inside records.

use quire_entity::{
    Dictionary, Enum, FieldDeclaration, Flags, FormatDeclaration, ON_CHANGE, Record,
    RecordOptions, RecordState,
};
use quire_foundation::{ErrorKind, Type, Value, object};
use std::cell::RefCell;
use std::rc::Rc;

fn with_rights() -> Rc<Record> {
    Record::with_options(
        RecordOptions::new()
            .with_raw_data(object! { "rights" => vec![Value::Bool(true), Value::Null] })
            .with_format(FormatDeclaration::Partial(vec![
                FieldDeclaration::new("rights")
                    .with_type(Type::Flags)
                    .with_dictionary(["read", "write"]),
            ]))
            .with_state(RecordState::Unchanged),
    )
    .unwrap()
}

fn rights_of(record: &Record) -> Rc<Flags> {
    record
        .get("rights")
        .as_instance()
        .and_then(|instance| instance.downcast::<Flags>())
        .unwrap()
}

#[test]
fn enum_events_carry_the_new_index() {
    let value = Enum::new(Dictionary::new(["low", "high"]), Some(0)).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    value.subscribe(ON_CHANGE, move |event| log.borrow_mut().push(event.args[0].clone()));

    value.set_by_value("high").unwrap();
    value.set(None).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Int(1), Value::Null]);
    assert_eq!(value.get_original(), Some(0));
}

#[test]
fn enum_reject_restores_the_accepted_index() {
    let value = Enum::new(Dictionary::new(["a", "b", "c"]), Some(2)).unwrap();
    value.set(Some(0)).unwrap();
    value.reject_changes(false);
    assert_eq!(value.get(), Some(2));
    assert!(!value.is_changed());
}

#[test]
fn flags_inside_records_write_back() {
    let record = with_rights();
    let rights = rights_of(&record);
    assert_eq!(rights.get("read").unwrap(), Some(true));

    rights.set("write", Some(true)).unwrap();
    assert_eq!(
        record.get_raw_data().get("rights"),
        Some(&Value::from(vec![Value::Bool(true), Value::Bool(true)]))
    );
    assert!(record.is_field_changed("rights"));

    rights.set("write", None).unwrap();
    assert!(!record.is_changed());
}

#[test]
fn accepting_the_record_accepts_its_flags() {
    let record = with_rights();
    let rights = rights_of(&record);
    rights.set("read", Some(false)).unwrap();

    record.accept_changes(None, false, false);
    assert!(!rights.is_changed());
    assert_eq!(rights.get_original("read").unwrap(), Some(false));
}

#[test]
fn rejecting_the_record_rejects_its_flags() {
    let record = with_rights();
    let rights = rights_of(&record);
    rights.set_false_all();

    record.reject_changes(None, false, false);
    assert_eq!(rights.to_array(), vec![Some(true), None]);
    assert_eq!(
        record.get_raw_data().get("rights"),
        Some(&Value::from(vec![Value::Bool(true), Value::Null]))
    );
}

#[test]
fn flags_can_be_assigned_whole() {
    let record = with_rights();
    let replacement = Flags::with_values(Dictionary::new(["read", "write"]), &[Some(false), Some(false)]);
    record
        .set("rights", Value::Instance(quire_foundation::Instance::new(replacement)))
        .unwrap();
    assert_eq!(
        record.get_raw_data().get("rights"),
        Some(&Value::from(vec![Value::Bool(false), Value::Bool(false)]))
    );
}

#[test]
fn enum_set_back_inside_a_record_leaves_it_unchanged() {
    let record = Record::with_options(
        RecordOptions::new()
            .with_raw_data(object! { "level" => 0 })
            .with_format(FormatDeclaration::Partial(vec![
                FieldDeclaration::new("level")
                    .with_type(Type::Enum)
                    .with_dictionary(["low", "high"]),
            ]))
            .with_state(RecordState::Unchanged),
    )
    .unwrap();
    let level = record
        .get("level")
        .as_instance()
        .and_then(|instance| instance.downcast::<Enum>())
        .unwrap();

    level.set(Some(1)).unwrap();
    assert!(record.is_field_changed("level"));
    assert_eq!(record.get_state(), RecordState::Changed);
    assert_eq!(record.get_raw_data().get("level"), Some(&Value::Int(1)));

    level.set(Some(0)).unwrap();
    assert!(!record.is_changed());
    assert_eq!(record.get_state(), RecordState::Unchanged);
    assert_eq!(record.get_raw_data().get("level"), Some(&Value::Int(0)));
}

#[test]
fn unknown_entries_are_reported_as_such() {
    let value = Enum::new(Dictionary::new(["low", "high"]), Some(0)).unwrap();
    let err = value.set_by_value("medium").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownEntry { .. }));

    let flags = Flags::new(Dictionary::new(["read"]));
    let err = flags.set("execute", Some(true)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownEntry { ref entry, .. } if entry == "execute"));
    assert!(matches!(
        flags.get("execute").unwrap_err().kind,
        ErrorKind::UnknownEntry { .. }
    ));
}
