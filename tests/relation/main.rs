//! Integration tests for Layer 1: Relation
//!
//! Tests for the mediator, change propagation and version counters.

mod mediator;
mod node;
mod propagation;
