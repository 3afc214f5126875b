//! Integration tests for Value types
//!
//! Tests construction, ordered maps, deep equality, paths and type inference.

use quire_foundation::{Array, Map, PathSegment, Type, Value, object};
use std::sync::Arc;

// =============================================================================
// Value Construction
// =============================================================================

#[test]
fn nullish_values() {
    assert!(Value::Null.is_nullish());
    assert!(Value::Undefined.is_nullish());
    assert!(!Value::Bool(false).is_nullish());
    assert_eq!(Value::from(None::<i64>), Value::Null);
}

#[test]
fn scalar_conversions() {
    assert_eq!(Value::from(7).as_int(), Some(7));
    assert_eq!(Value::from(true).as_bool(), Some(true));
    assert_eq!(Value::from("x").as_str(), Some("x"));
    assert_eq!(Value::from(1.5).as_number(), Some(1.5));
    assert_eq!(Value::from(2).as_number(), Some(2.0));
}

#[test]
fn object_macro_keeps_insertion_order() {
    let value = object! { "b" => 1, "a" => 2, "c" => 3 };
    let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| &**k).collect();
    assert_eq!(keys, vec!["b", "a", "c"]);
}

// =============================================================================
// Maps
// =============================================================================

#[test]
fn map_insert_replaces_in_place() {
    let mut map = Map::new();
    map.insert("a", Value::Int(1));
    map.insert("b", Value::Int(2));
    map.insert("a", Value::Int(3));
    assert_eq!(map.len(), 2);
    assert_eq!(map.position("a"), Some(0));
    assert_eq!(map.get("a"), Some(&Value::Int(3)));
}

#[test]
fn map_insert_at_position() {
    let mut map: Map = [("a", Value::Int(1)), ("c", Value::Int(3))].into_iter().collect();
    map.insert_at(1, "b", Value::Int(2));
    let keys: Vec<Arc<str>> = map.keys().cloned().collect();
    assert_eq!(keys, vec![Arc::from("a"), Arc::from("b"), Arc::from("c")]);
}

#[test]
fn map_clones_are_independent() {
    let mut map = Map::new();
    map.insert("a", Value::Int(1));
    let copy = map.clone();
    map.insert("a", Value::Int(2));
    assert_eq!(copy.get("a"), Some(&Value::Int(1)));
}

// =============================================================================
// Equality
// =============================================================================

#[test]
fn deep_equal_ignores_key_order() {
    let a = object! { "x" => 1, "y" => "two" };
    let b = object! { "y" => "two", "x" => 1 };
    assert!(a.deep_equal(&b));
    assert!(!a.deep_equal(&object! { "x" => 1 }));
}

#[test]
fn deep_equal_compares_arrays_elementwise() {
    let a = Value::from(vec![1, 2, 3]);
    let b: Value = [1, 2, 3].into_iter().map(Value::from).collect::<Array>().into();
    assert!(a.deep_equal(&b));
    assert!(!a.deep_equal(&Value::from(vec![1, 2])));
}

#[test]
fn nan_equals_itself() {
    let nan = Value::Float(f64::NAN);
    assert!(nan.deep_equal(&nan.clone()));
}

#[test]
fn null_and_undefined_differ() {
    assert!(!Value::Null.deep_equal(&Value::Undefined));
    assert_ne!(Value::Null, Value::Undefined);
}

// =============================================================================
// Paths
// =============================================================================

#[test]
fn get_and_set_paths() {
    let mut value = object! { "rows" => vec![object! { "id" => 1 }] };
    let path = [
        PathSegment::Key(Arc::from("rows")),
        PathSegment::Index(0),
        PathSegment::Key(Arc::from("id")),
    ];
    assert_eq!(value.get_path(&path), Some(&Value::Int(1)));
    assert!(value.set_path(&path, Value::Int(5)));
    assert_eq!(value.get_path(&path), Some(&Value::Int(5)));
    assert!(!value.set_path(&[PathSegment::Key(Arc::from("none")), PathSegment::Index(0)], Value::Null));
}

#[test]
fn json_round_trip() {
    let value = Value::parse_json(r#"{"a":[1,2.5,"x",null],"b":{"c":true}}"#).unwrap();
    assert_eq!(value.get("b").and_then(|b| b.get("c")), Some(&Value::Bool(true)));
    let json = value.to_json().unwrap();
    assert_eq!(json["a"][1], serde_json::json!(2.5));
    assert!(Value::Undefined.to_json().is_err());
}

// =============================================================================
// Types
// =============================================================================

#[test]
fn type_inference() {
    assert_eq!(Type::of(&Value::Int(1)), Type::Integer);
    assert_eq!(Type::of(&Value::from("s")), Type::String);
    assert_eq!(Type::of(&Value::from(vec![1, 2])), Type::array(Type::Integer));
    assert_eq!(Type::of(&object! {}), Type::Object);
}

#[test]
fn type_names_parse_back() {
    for ty in [Type::Integer, Type::Enum, Type::RecordSet, Type::array(Type::String)] {
        assert_eq!(ty.to_string().parse::<Type>().unwrap(), ty);
    }
    assert!("nonsense".parse::<Type>().is_err());
}

#[test]
fn nulls_are_accepted_by_every_type() {
    assert!(Type::Integer.accepts(&Value::Null));
    assert!(Type::Integer.accepts(&Value::Int(1)));
    assert!(!Type::Integer.accepts(&Value::from("1")));
    assert!(Type::Date.accepts(&Value::from("2024-01-01")));
}
