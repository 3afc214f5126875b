//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, Map, Type, Error and the service container.

mod container;
mod errors;
mod values;
