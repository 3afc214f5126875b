//! Integration tests for models
//!
//! Tests computed properties over nested values, defaults and revival.

use quire_entity::{
    FieldDeclaration, FormatDeclaration, Model, ModelOptions, Properties, Property, Record,
    RecordState, register_model,
};
use quire_foundation::{ErrorKind, Instance, Type, Value, object};
use quire_serialize::{ClassRegistry, Reviver, Serializer};
use std::cell::Cell;
use std::rc::Rc;

fn order_properties() -> Properties {
    Properties::new()
        .with(
            "total",
            Property::new().with_get(|model| {
                let price = model.get("price")?.as_number().unwrap_or(0.0);
                let qty = model.get("qty")?.as_number().unwrap_or(0.0);
                Ok(Value::Float(price * qty))
            }),
        )
        .with(
            "label",
            Property::new().with_compute(["total"], |model| {
                Ok(Value::from(format!("{:.2}", model.get("total")?.as_number().unwrap_or(0.0))))
            }),
        )
        .with("currency", Property::new().with_default("EUR"))
}

fn order() -> Rc<Model> {
    Model::with_options(
        ModelOptions::new()
            .with_properties(order_properties())
            .with_raw_data(object! { "price" => 2.5, "qty" => 2 })
            .with_state(RecordState::Unchanged),
    )
    .unwrap()
}

#[test]
fn computed_chains_follow_their_inputs() {
    let model = order();
    assert_eq!(model.get("total").unwrap(), Value::Float(5.0));
    assert_eq!(model.get("label").unwrap(), Value::from("5.00"));

    model.set("qty", 4).unwrap();
    assert_eq!(model.get("label").unwrap(), Value::from("10.00"));
}

#[test]
fn raw_data_replacement_clears_computed_values() {
    let model = order();
    assert_eq!(model.get("total").unwrap(), Value::Float(5.0));
    model.set_raw_data(object! { "price" => 1.0, "qty" => 3 });
    assert_eq!(model.get("total").unwrap(), Value::Float(3.0));
    assert!(!model.is_changed());
}

#[test]
fn defaults_give_way_to_fields() {
    let model = order();
    assert_eq!(model.get("currency").unwrap(), Value::from("EUR"));
    model.set("currency", "USD").unwrap();
    assert_eq!(model.get("currency").unwrap(), Value::from("USD"));
}

#[test]
fn computed_properties_are_read_only() {
    let error = order().set("total", 1).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::ReadOnlyProperty(_)));
}

#[test]
fn batch_writes_report_the_simplest_error() {
    let model = order();
    let error = model
        .set_many([("total", Value::Int(1)), ("qty", Value::Int(7))])
        .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::ReadOnlyProperty(_)));
    assert_eq!(model.get("qty").unwrap(), Value::Int(7));
}

#[test]
fn recursive_setters_fail() {
    let properties = Properties::new().with(
        "loop",
        Property::new().with_set(|model, value| {
            model.set("loop", value)?;
            Ok(None)
        }),
    );
    let model = Model::new(properties, Value::Null);
    let error = model.set("loop", 1).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::RecursiveProperty(_)));
}

#[test]
fn nested_record_changes_refresh_computed_values() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let properties = Properties::new().with(
        "city",
        Property::new().with_get(move |model| {
            counter.set(counter.get() + 1);
            let address = model.get("address")?;
            let record = address.as_instance().and_then(Instance::downcast::<Record>);
            Ok(record.map_or(Value::Null, |record| record.get("city")))
        }),
    );
    let model = Model::with_options(
        ModelOptions::new()
            .with_properties(properties)
            .with_raw_data(object! { "address" => object! { "city" => "Oslo" } })
            .with_format(FormatDeclaration::Partial(vec![
                FieldDeclaration::new("address").with_type(Type::Record),
            ])),
    )
    .unwrap();

    assert_eq!(model.get("city").unwrap(), Value::from("Oslo"));
    let address = model
        .get("address")
        .unwrap()
        .as_instance()
        .and_then(Instance::downcast::<Record>)
        .unwrap();
    address.set("city", "Rome").unwrap();
    assert_eq!(model.get("city").unwrap(), Value::from("Rome"));
    assert_eq!(calls.get(), 2);
}

#[test]
fn models_serialize_under_their_module() {
    let model = Model::with_options(
        ModelOptions::new()
            .with_properties(order_properties())
            .with_module("shop.Order")
            .with_raw_data(object! { "price" => 1.5, "qty" => 2 }),
    )
    .unwrap();
    model.set("qty", 3).unwrap();

    let text = Serializer::new()
        .to_string(&Value::Instance(Instance::new(model.clone())))
        .unwrap();
    assert!(text.contains("shop.Order"));

    let mut registry = ClassRegistry::new();
    register_model(&mut registry, "shop.Order", order_properties());
    let revived = Reviver::new(&registry)
        .from_str(&text)
        .unwrap()
        .as_instance()
        .and_then(Instance::downcast::<Model>)
        .unwrap();
    assert!(revived.is_equal(&model));
    assert_eq!(revived.get("total").unwrap(), Value::Float(4.5));
    assert_eq!(revived.get_original("qty").unwrap(), Value::Int(2));
}
