//! Integration tests for adapters
//!
//! Tests records and recordsets over JSON and SBIS raw data.

use quire_entity::adapter;
use quire_entity::{
    Adapter, Enum, Format, FieldDescriptor, JsonAdapter, Record, RecordOptions, RecordSet,
    RecordSetOptions, SbisAdapter,
};
use quire_foundation::{Array, Type, Value, object};
use std::rc::Rc;

fn sbis_record() -> Value {
    let columns: Array = [
        object! { "n" => "id", "t" => "integer" },
        object! { "n" => "title", "t" => "string" },
        object! { "n" => "kind", "t" => object! { "n" => "enum", "s" => vec!["a", "b"] } },
    ]
    .into_iter()
    .collect();
    object! {
        "_type" => "record",
        "d" => vec![Value::Int(1), Value::from("A"), Value::Int(1)],
        "s" => columns,
    }
}

#[test]
fn adapters_resolve_by_name() {
    assert_eq!(adapter::resolve("json").unwrap().name(), JsonAdapter::NAME);
    assert_eq!(adapter::resolve("sbis").unwrap().name(), SbisAdapter::NAME);
    assert!(adapter::resolve("xml").is_err());
}

#[test]
fn json_records_grow_new_fields() {
    let adapter = JsonAdapter;
    let mut raw = object! { "a" => 1 };
    adapter.for_record().set(&mut raw, "b", Value::Int(2)).unwrap();
    assert_eq!(adapter.for_record().fields(&raw).len(), 2);
    assert_eq!(adapter.for_record().get(&raw, "c"), Value::Undefined);
}

#[test]
fn sbis_records_read_their_columns() {
    let record = Record::with_options(
        RecordOptions::new()
            .with_adapter(Rc::new(SbisAdapter))
            .with_raw_data(sbis_record()),
    )
    .unwrap();

    let format = record.get_format();
    assert_eq!(format.get("id").unwrap().ty, Type::Integer);
    assert_eq!(format.get("kind").unwrap().ty, Type::Enum);

    let kind = record
        .get("kind")
        .as_instance()
        .and_then(|instance| instance.downcast::<Enum>())
        .unwrap();
    assert_eq!(kind.get_as_value().as_deref(), Some("b"));

    record.set("title", "B").unwrap();
    let raw = record.get_raw_data();
    assert_eq!(
        raw.get("d").and_then(Value::as_array).and_then(|d| d.get(1)),
        Some(&Value::from("B"))
    );
}

#[test]
fn sbis_records_reject_unknown_fields() {
    let adapter = SbisAdapter;
    let mut raw = sbis_record();
    assert!(adapter.for_record().set(&mut raw, "missing", Value::Int(1)).is_err());
}

#[test]
fn sbis_tables_hold_rows_of_values() {
    let format = Format::from_fields([
        FieldDescriptor::new("id", Type::Integer),
        FieldDescriptor::new("title", Type::String),
    ])
    .unwrap();
    let adapter = SbisAdapter;
    let mut raw = adapter.for_table().empty(&format);
    assert_eq!(adapter.for_table().count(&raw), 0);

    let row = Record::with_options(
        RecordOptions::new()
            .with_adapter(Rc::new(SbisAdapter))
            .with_format(format.clone()),
    )
    .unwrap();
    row.set("id", 5).unwrap();
    adapter.for_table().add(&mut raw, row.get_raw_data(), None).unwrap();
    assert_eq!(adapter.for_table().count(&raw), 1);
    assert_eq!(
        adapter.for_table().at(&raw, 0).map(|row| adapter.for_record().get(&row, "id")),
        Some(Value::Int(5))
    );
}

#[test]
fn json_and_sbis_sets_agree_on_values() {
    let format = Format::from_fields([
        FieldDescriptor::new("id", Type::Integer),
        FieldDescriptor::new("title", Type::String),
    ])
    .unwrap();
    let json = RecordSet::with_options(RecordSetOptions::new().with_format(format.clone())).unwrap();
    let sbis = RecordSet::with_options(
        RecordSetOptions::new()
            .with_adapter(Rc::new(SbisAdapter))
            .with_format(format),
    )
    .unwrap();

    for set in [&json, &sbis] {
        set.add(&Record::new(object! { "id" => 1, "title" => "x" }), None).unwrap();
        set.add(&Record::new(object! { "id" => 2, "title" => "y" }), None).unwrap();
    }
    for index in 0..2 {
        let a = json.at(index).unwrap();
        let b = sbis.at(index).unwrap();
        assert_eq!(a.get("id"), b.get("id"));
        assert_eq!(a.get("title"), b.get("title"));
    }
}
