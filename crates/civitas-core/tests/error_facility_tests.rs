use civitas_core::errors::{ExError, ExErrorKind, RecordError};
use civitas_core::schema::SchemaBuilder;

#[test]
fn test_unknown_field_type_is_schema_error() {
    let err: ExError = SchemaBuilder::new("webhooks")
        .field("url", "uri")
        .build()
        .unwrap_err()
        .into();

    assert_eq!(err.kind(), ExErrorKind::Schema);
    assert_eq!(err.code(), "ERR_SCHEMA");
    assert_eq!(err.entity(), Some("webhooks"));
    assert_eq!(err.field(), Some("url"));
}

#[test]
fn test_cast_failure_is_validation_error() {
    let err: ExError = RecordError::CastFailed {
        entity: "events".to_string(),
        field: "starts_at".to_string(),
        expected: "datetime".to_string(),
        reason: "'soon' is not a date-time".to_string(),
    }
    .into();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert!(err.message().contains("starts_at"));
}

#[test]
fn test_unknown_scope_is_schema_error() {
    let err: ExError = RecordError::UnknownScope {
        entity: "events".to_string(),
        scope: "archived".to_string(),
    }
    .into();

    assert_eq!(err.kind(), ExErrorKind::Schema);
}

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (ExErrorKind::Schema, "ERR_SCHEMA"),
        (ExErrorKind::Validation, "ERR_VALIDATION"),
        (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
        (ExErrorKind::Constraint, "ERR_CONSTRAINT"),
        (ExErrorKind::Hook, "ERR_HOOK"),
        (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
        (ExErrorKind::Config, "ERR_CONFIG"),
        (ExErrorKind::Io, "ERR_IO"),
        (ExErrorKind::Internal, "ERR_INTERNAL"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_display_includes_context() {
    let err = ExError::new(ExErrorKind::NotFound)
        .with_op("update")
        .with_entity("events")
        .with_record_id(42)
        .with_message("Record events#42 not found");

    let rendered = err.to_string();
    assert!(rendered.starts_with("[ERR_NOT_FOUND] in operation 'update'"));
    assert!(rendered.contains("(entity: events)"));
    assert!(rendered.contains("(record_id: 42)"));
}
