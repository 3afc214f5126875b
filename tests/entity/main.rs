//! Integration tests for Layer 3: Entities
//!
//! Tests for records, models, recordsets, enums, flags and adapters.

mod adapters;
mod enums;
mod model;
mod record;
mod recordset;
