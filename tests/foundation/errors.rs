//! Integration tests for Error types
//!
//! Tests error construction, display, context, and ranking.

use quire_foundation::{Error, ErrorContext, ErrorKind, Type};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_type_mismatch() {
    let err = Error::type_mismatch(Type::Integer, "string \"x\"");
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    let msg = format!("{err}");
    assert!(msg.contains("integer"));
}

#[test]
fn error_field_not_found() {
    let err = Error::field_not_found("name");
    assert!(matches!(err.kind, ErrorKind::FieldNotFound(_)));
    assert!(format!("{err}").contains("name"));
}

#[test]
fn error_index_out_of_bounds() {
    let err = Error::index_out_of_bounds(5, 3);
    let msg = format!("{err}");
    assert!(msg.contains('5'));
    assert!(msg.contains('3'));
}

#[test]
fn error_unresolved_module() {
    let err = Error::unresolved_module("app.Missing");
    assert!(matches!(err.kind, ErrorKind::UnresolvedModule(_)));
    assert!(format!("{err}").contains("app.Missing"));
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn context_shows_source_and_path() {
    let context = ErrorContext::new()
        .with_source("entity.Record")
        .with_segment("child")
        .with_segment("x");
    assert_eq!(context.to_string(), "in entity.Record at child.x");

    let err = Error::field_not_found("x").with_context(context);
    assert_eq!(
        err.context.as_ref().and_then(|c| c.source.as_deref()),
        Some("entity.Record")
    );
}

// =============================================================================
// Ranking
// =============================================================================

#[test]
fn simpler_errors_rank_lower() {
    let mismatch = Error::type_mismatch(Type::Integer, "x");
    let bounds = Error::index_out_of_bounds(1, 0);
    let missing = Error::field_not_found("x");
    let read_only = Error::new(ErrorKind::ReadOnlyFormat("x".into()));
    let recursive = Error::new(ErrorKind::RecursiveProperty("x".into()));

    let ranks: Vec<u8> = [&mismatch, &bounds, &missing, &read_only, &recursive]
        .iter()
        .map(|e| e.rank())
        .collect();
    assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn lowest_rank_wins() {
    let errors = vec![
        Error::new(ErrorKind::ReadOnlyProperty("a".into())),
        Error::invalid_value("date", "tomorrow"),
        Error::field_not_found("b"),
    ];
    let simplest = errors.into_iter().min_by_key(Error::rank).unwrap();
    assert!(matches!(simplest.kind, ErrorKind::InvalidValue { .. }));
}
