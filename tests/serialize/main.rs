//! Integration tests for Layer 2: Serialization
//!
//! Tests signature JSON and MessagePack round trips of entity graphs,
//! shared instances and cycles.

mod cycles;
mod roundtrip;
