//! Integration tests for the service container
//!
//! Tests value and factory registration, singletons and typed resolution.

use quire_foundation::{Container, RegisterOptions};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn values_resolve_by_alias_and_type() {
    let mut container = Container::new();
    container.register_value("answer", 42_i64);
    assert_eq!(container.resolve::<i64>("answer").as_deref(), Some(&42));
    assert!(container.resolve::<String>("answer").is_none());
    assert!(container.resolve::<i64>("other").is_none());
}

#[test]
fn factories_produce_fresh_values() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let mut container = Container::new();
    container.register_factory(
        "fresh",
        move || {
            counter.set(counter.get() + 1);
            counter.get()
        },
        RegisterOptions::default(),
    );
    assert_eq!(container.resolve::<i32>("fresh").as_deref(), Some(&1));
    assert_eq!(container.resolve::<i32>("fresh").as_deref(), Some(&2));
    assert_eq!(calls.get(), 2);
}

#[test]
fn singletons_are_produced_once() {
    let mut container = Container::new();
    container.register_factory("one", || String::from("x"), RegisterOptions::single());
    let a = container.resolve::<String>("one").unwrap();
    let b = container.resolve::<String>("one").unwrap();
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn uninstantiated_factories_resolve_as_factories() {
    let mut container = Container::new();
    container.register_factory(
        "lazy",
        || 1_u8,
        RegisterOptions {
            instantiate: false,
            single: false,
        },
    );
    assert!(container.resolve::<u8>("lazy").is_none());
    let factory = container.resolve_factory("lazy").unwrap();
    assert_eq!(factory().downcast::<u8>().ok().as_deref(), Some(&1));
}

#[test]
fn unregister_and_aliases() {
    let mut container = Container::new();
    container.register_value("b", 1_u8);
    container.register_value("a", 2_u8);
    assert_eq!(container.aliases(), vec!["a", "b"]);
    assert!(container.unregister("a"));
    assert!(!container.is_registered("a"));
}
