#![allow(clippy::unwrap_used, clippy::expect_used)]

use civitas_core::errors::{ExError, ExErrorKind, RecordError};
use civitas_core::logging_facility::test_capture::init_test_capture;
use civitas_core::{log_op_end, log_op_error, log_op_start};
use civitas_core::civitas_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    assert_eq!(starts, 1, "Should have captured exactly one start event");
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events();
    let end_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END))
        .expect("Should have end event");
    assert_eq!(end_event.field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err: ExError = RecordError::RecordNotFound {
        entity: "events".to_string(),
        id: 7,
    }
    .into();
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events();
    let error_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");
    assert_eq!(error_event.field("err_code"), Some("ERR_NOT_FOUND"));
    assert_eq!(error_event.field("err_kind"), Some("NotFound"));
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_4";

    // Given one bracketed operation
    log_op_start!(op_name, entity = "forum_posts");
    log_op_end!(op_name, duration_ms = 1, record_id = 3);

    // Then exactly one start and one end are emitted
    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END)
    });
    assert_eq!(starts, 1);
    assert_eq!(ends, 1);
}

#[test]
fn test_extra_fields_are_captured() {
    let capture = init_test_capture();
    let op_name = "test_extra_fields_unique_5";

    log_op_start!(op_name, entity = "webhooks", record_id = 12);

    let matching = capture.events_where(op_name, "entity", "webhooks");
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].field("record_id"), Some("12"));
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_assert_event_exists_fails_for_missing_event() {
    let capture = init_test_capture();
    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_error_event_from_hook_failure() {
    let capture = init_test_capture();
    let op_name = "test_hook_error_unique_6";

    let err = ExError::new(ExErrorKind::Hook)
        .with_op("create")
        .with_source(ExError::new(ExErrorKind::NotFound));
    log_op_error!(op_name, err, duration_ms = 2, entity = "skill_endorsements");

    let matching = capture.events_where(op_name, "entity", "skill_endorsements");
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].field("err_code"), Some("ERR_HOOK"));
}
