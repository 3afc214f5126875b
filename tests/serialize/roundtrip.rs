//! Integration tests for entity round trips
//!
//! Tests records, recordsets, enums and flags through the serializer and
//! the entity class registry.

use quire_entity::{
    Dictionary, Enum, FieldDeclaration, Flags, FormatDeclaration, Record, RecordOptions,
    RecordSet, RecordState, registry,
};
use quire_foundation::{Array, Callable, ErrorKind, Instance, Type, Value, object};
use quire_serialize::{ClassRegistry, Reviver, Serializer, SerializerConfig, from_str, to_string};
use std::rc::Rc;

fn revive<T: quire_foundation::Serializable>(value: &Value) -> Rc<T> {
    value
        .as_instance()
        .and_then(|instance| instance.downcast::<T>())
        .unwrap()
}

fn round_trip(value: &Value) -> Value {
    let text = to_string(value).unwrap();
    from_str(&text, &registry()).unwrap()
}

#[test]
fn plain_values_survive() {
    let value = object! {
        "list" => vec![Value::Int(1), Value::Float(f64::INFINITY), Value::Undefined],
        "text" => "x",
    };
    let back = round_trip(&value);
    let list = back.get("list").and_then(Value::as_array).unwrap();
    assert_eq!(list.get(1), Some(&Value::Float(f64::INFINITY)));
    assert_eq!(list.get(2), Some(&Value::Undefined));
    assert_eq!(back.get("text"), Some(&Value::from("x")));
}

#[test]
fn changed_records_keep_their_changes() {
    let record = Record::with_options(
        RecordOptions::new()
            .with_raw_data(object! { "id" => 1, "name" => "Ann" })
            .with_state(RecordState::Unchanged),
    )
    .unwrap();
    record.set("name", "Bob").unwrap();

    let back: Rc<Record> = revive(&round_trip(&Value::Instance(Instance::new(record.clone()))));
    assert!(back.is_equal(&record));
    assert_eq!(back.get_state(), RecordState::Changed);
    back.reject_changes(None, false, false);
    assert_eq!(back.get("name"), Value::from("Ann"));
    assert_eq!(back.get_state(), RecordState::Unchanged);
}

#[test]
fn replaced_enum_originals_travel_as_instances() {
    let record = Record::with_options(
        RecordOptions::new()
            .with_raw_data(object! { "kind" => 0 })
            .with_format(FormatDeclaration::Partial(vec![
                FieldDeclaration::new("kind")
                    .with_type(Type::Enum)
                    .with_dictionary(["draft", "final"]),
            ]))
            .with_state(RecordState::Unchanged),
    )
    .unwrap();
    let _ = record.get("kind");
    let replacement = Enum::new(Dictionary::new(["draft", "final"]), Some(1)).unwrap();
    record
        .set("kind", Value::Instance(Instance::new(replacement)))
        .unwrap();

    let text = to_string(&Value::Instance(Instance::new(record))).unwrap();
    assert!(text.contains("entity.Enum"));

    let back: Rc<Record> = revive(&from_str(&text, &registry()).unwrap());
    assert_eq!(back.get_raw_data().get("kind"), Some(&Value::Int(1)));
    back.reject_changes(None, false, false);
    assert_eq!(back.get_raw_data().get("kind"), Some(&Value::Int(0)));
}

#[test]
fn recordsets_keep_row_states() {
    let set = RecordSet::new(Value::Array(
        [object! { "id" => 1 }, object! { "id" => 2 }]
            .into_iter()
            .collect::<Array>(),
    ));
    set.delete_at(1).unwrap();

    let back: Rc<RecordSet> = revive(&round_trip(&Value::Instance(Instance::new(set.clone()))));
    assert!(back.is_equal(&set));
    assert_eq!(back.at(1).unwrap().get_state(), RecordState::Deleted);
    back.accept_changes(false);
    assert_eq!(back.count(), 1);
}

#[test]
fn revived_rows_keep_their_changes() {
    let set = RecordSet::new(Value::Array(
        [object! { "id" => 1, "v" => "a" }].into_iter().collect::<Array>(),
    ));
    set.at(0).unwrap().set("v", "b").unwrap();

    let back: Rc<RecordSet> = revive(&round_trip(&Value::Instance(Instance::new(set))));
    let row = back.at(0).unwrap();
    assert_eq!(row.get_state(), RecordState::Changed);
    assert!(row.is_field_changed("v"));
    assert_eq!(row.get_original("v"), Value::from("a"));

    row.reject_changes(None, false, false);
    assert_eq!(row.get("v"), Value::from("a"));
    assert_eq!(row.get_state(), RecordState::Unchanged);
    let first = back
        .get_raw_data()
        .as_array()
        .and_then(|rows| rows.get(0))
        .and_then(|row| row.get("v"))
        .cloned();
    assert_eq!(first, Some(Value::from("a")));
}

#[test]
fn enums_and_flags_keep_originals() {
    let value = Enum::new(Dictionary::new(["a", "b"]), Some(0)).unwrap();
    value.set(Some(1)).unwrap();
    let flags = Flags::new(Dictionary::new(["x", "y"]));
    flags.set("y", Some(true)).unwrap();

    let back = round_trip(&Value::from(vec![
        Value::Instance(Instance::new(value)),
        Value::Instance(Instance::new(flags)),
    ]));
    let items = back.as_array().unwrap();
    let value: Rc<Enum> = revive(items.get(0).unwrap());
    let flags: Rc<Flags> = revive(items.get(1).unwrap());
    assert_eq!(value.get_original(), Some(0));
    assert!(flags.is_changed());
    flags.reject_changes(false);
    assert_eq!(flags.get("y").unwrap(), None);
}

#[test]
fn shared_instances_stay_shared() {
    let record = Record::new(object! { "a" => 1 });
    let instance = Value::Instance(Instance::new(record));
    let back = round_trip(&Value::from(vec![instance.clone(), instance]));
    let items = back.as_array().unwrap();
    let first = items.get(0).and_then(Value::as_instance).unwrap();
    let second = items.get(1).and_then(Value::as_instance).unwrap();
    assert!(first.ptr_eq(second));
}

#[test]
fn message_pack_carries_the_same_document() {
    let record = Record::new(object! { "a" => 1, "b" => "two" });
    let value = Value::Instance(Instance::new(record.clone()));
    let bytes = Serializer::new().to_bytes(&value).unwrap();
    let registry = registry();
    let back: Rc<Record> = revive(&Reviver::new(&registry).from_bytes(&bytes).unwrap());
    assert!(back.is_equal(&record));
}

#[test]
fn unknown_modules_fail_to_revive() {
    let record = Record::new(object! { "a" => 1 });
    let text = to_string(&Value::Instance(Instance::new(record))).unwrap();
    let err = from_str(&text, &ClassRegistry::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnresolvedModule(_)));
}

#[test]
fn functions_travel_by_name_or_side_table() {
    let named = Callable::named("app.double", |args| {
        Ok(Value::Int(args.first().and_then(Value::as_int).unwrap_or(0) * 2))
    });
    let anonymous = Callable::new(|_| Ok(Value::Null));
    let value = Value::from(vec![Value::Function(named.clone()), Value::Function(anonymous)]);

    let mut serializer = Serializer::new();
    let text = serializer.to_string(&value).unwrap();
    assert_eq!(serializer.functions().len(), 1);

    let mut registry = registry();
    registry.register_function(named);
    let back = Reviver::new(&registry)
        .with_functions(serializer.functions().to_vec())
        .from_str(&text)
        .unwrap();
    let items = back.as_array().unwrap();
    let Some(Value::Function(double)) = items.get(0) else {
        panic!("expected a function");
    };
    assert_eq!(double.call(&[Value::Int(4)]).unwrap(), Value::Int(8));

    let strict = Serializer::with_config(SerializerConfig::strict()).to_string(&value);
    assert!(strict.is_err());
}
