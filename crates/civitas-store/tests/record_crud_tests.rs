// Integration tests for record create/find/update/delete
// Covers allow-list gating, casts, defaults, soft deletes and storage constraints

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use chrono::Duration;
use civitas_core::errors::ExErrorKind;
use civitas_core::{attributes, FillPolicy, RecordId, Registry, SchemaBuilder, Value};
use civitas_store::RecordStore;
use common::{create_category, create_thread, create_user, setup_test_store, ts};
use serde_json::json;

#[test]
fn test_create_then_find_round_trips_typed_values() {
    // Given: an empty store
    let mut store = setup_test_store();

    // When: an event is created from loosely typed input
    let created = store
        .create(
            "events",
            attributes! {
                "title" => "Spring Gala",
                "starts_at" => "2030-04-12T18:00:00Z",
                "capacity" => "150",
                "is_virtual" => "yes",
                "tags" => json!(["gala", "formal"]),
            },
        )
        .unwrap();

    // Then: the stored record carries cast values and defaults
    let found = store.find("events", created.id).unwrap().unwrap();
    assert_eq!(found, created);
    assert_eq!(found.datetime("starts_at"), Some(ts(2030, 4, 12, 18)));
    assert_eq!(found.integer("capacity"), Some(150));
    assert_eq!(found.boolean("is_virtual"), Some(true));
    assert_eq!(found.text("status"), Some("draft"));
    assert_eq!(found.integer("registrations_count"), Some(0));
    assert_eq!(found.json("tags"), Some(&json!(["gala", "formal"])));
    assert!(found.created_at.is_some());
    assert_eq!(found.created_at, found.updated_at);
    assert!(found.deleted_at.is_none());
}

#[test]
fn test_sub_millisecond_datetime_round_trips_as_cast() {
    // Given: inputs finer than storage resolution
    let mut store = setup_test_store();
    let precise = ts(2030, 4, 12, 18) + Duration::microseconds(1_500);

    // When: events are created from text and from a typed value
    let from_text = store
        .create(
            "events",
            attributes! { "title" => "Text", "starts_at" => "2030-04-12T18:00:00.001500Z" },
        )
        .unwrap();
    let from_value = store
        .create(
            "events",
            attributes! { "title" => "Typed", "starts_at" => precise },
        )
        .unwrap();

    // Then: create and find agree on the millisecond value
    let expected = ts(2030, 4, 12, 18) + Duration::milliseconds(1);
    for created in [from_text, from_value] {
        let found = store.find("events", created.id).unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.datetime("starts_at"), Some(expected));
    }
}

#[test]
fn test_ids_are_assigned_in_insertion_order() {
    let mut store = setup_test_store();
    let a = create_user(&mut store, "Ada");
    let b = create_user(&mut store, "Brian");
    assert!(b.id > a.id);
}

#[test]
fn test_find_missing_is_none_and_find_or_fail_is_not_found() {
    let store = setup_test_store();

    assert!(store.find("users", RecordId(404)).unwrap().is_none());

    let err = store.find_or_fail("users", RecordId(404)).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(err.code(), "ERR_NOT_FOUND");
    assert_eq!(err.op(), Some("find_or_fail"));
}

#[test]
fn test_missing_required_field_is_validation_error() {
    let mut store = setup_test_store();

    let err = store
        .create("users", attributes! { "name" => "No Email" })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(store.count(store.query("users").unwrap()).unwrap(), 0);
}

#[test]
fn test_cast_failure_is_validation_error() {
    let mut store = setup_test_store();

    let err = store
        .create(
            "events",
            attributes! { "title" => "Mixer", "starts_at" => "soon" },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.field(), Some("starts_at"));
}

#[test]
fn test_enum_membership_is_enforced() {
    let mut store = setup_test_store();

    let err = store
        .create(
            "events",
            attributes! {
                "title" => "Mixer",
                "starts_at" => "2030-01-01",
                "status" => "postponed",
            },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
}

#[test]
fn test_discard_policy_drops_non_fillable_fields() {
    // Given: the default (discard) policy
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");

    // When: a thread is created with guarded and undeclared fields
    let thread = store
        .create(
            "forum_threads",
            attributes! {
                "category_id" => category.id,
                "user_id" => author.id,
                "title" => "Hello",
                "body" => "First!",
                "is_pinned" => true,
                "replies_count" => 99,
                "favourite_colour" => "green",
            },
        )
        .unwrap();

    // Then: only fillable fields were written
    assert_eq!(thread.boolean("is_pinned"), Some(false));
    assert_eq!(thread.integer("replies_count"), Some(0));
    assert!(!thread.attributes.contains_key("favourite_colour"));
}

#[test]
fn test_reject_policy_refuses_non_fillable_fields() {
    let mut store = setup_test_store().with_fill_policy(FillPolicy::Reject);
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");

    let err = store
        .create(
            "forum_threads",
            attributes! {
                "category_id" => category.id,
                "user_id" => author.id,
                "title" => "Hello",
                "body" => "First!",
                "is_pinned" => true,
            },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.field(), Some("is_pinned"));
}

#[test]
fn test_update_is_partial_and_refreshes_updated_at() {
    let mut store = setup_test_store();
    let user = create_user(&mut store, "Ada");
    std::thread::sleep(std::time::Duration::from_millis(5));

    let updated = store
        .update(
            "users",
            user.id,
            attributes! { "headline" => "Analyst", "graduation_year" => 2015 },
        )
        .unwrap();

    assert_eq!(updated.text("headline"), Some("Analyst"));
    assert_eq!(updated.integer("graduation_year"), Some(2015));
    assert_eq!(updated.text("email"), Some("ada@example.edu"));
    assert_eq!(updated.created_at, user.created_at);
    assert!(updated.updated_at > user.updated_at);
}

#[test]
fn test_update_can_null_a_nullable_field() {
    let mut store = setup_test_store();
    let user = store
        .create(
            "users",
            attributes! { "name" => "Ada", "email" => "ada@example.edu", "degree" => "BSc" },
        )
        .unwrap();

    let updated = store
        .update("users", user.id, attributes! { "degree" => Value::Null })
        .unwrap();
    assert_eq!(updated.get("degree"), &Value::Null);

    let err = store
        .update("users", user.id, attributes! { "email" => Value::Null })
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Validation);
}

#[test]
fn test_update_missing_record_is_not_found() {
    let mut store = setup_test_store();
    let err = store
        .update("users", RecordId(9), attributes! { "headline" => "x" })
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_soft_delete_hides_record_but_keeps_row() {
    // Given: a thread
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");
    let thread = create_thread(&mut store, &category, &author, "Hello");

    // When: it is deleted
    store.delete("forum_threads", thread.id).unwrap();

    // Then: default reads no longer see it, trashed reads do
    assert!(store.find("forum_threads", thread.id).unwrap().is_none());
    let trashed = store
        .find_with_trashed("forum_threads", thread.id)
        .unwrap()
        .unwrap();
    assert!(trashed.is_trashed());

    // And: updating or deleting it again is NotFound
    let err = store
        .update("forum_threads", thread.id, attributes! { "title" => "Edit" })
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    let err = store.delete("forum_threads", thread.id).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_restore_brings_record_back() {
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");
    let thread = create_thread(&mut store, &category, &author, "Hello");
    store.delete("forum_threads", thread.id).unwrap();

    let restored = store.restore("forum_threads", thread.id).unwrap();

    assert!(!restored.is_trashed());
    assert!(store.find("forum_threads", thread.id).unwrap().is_some());
}

#[test]
fn test_restore_live_record_is_not_found() {
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");
    let thread = create_thread(&mut store, &category, &author, "Hello");

    let err = store.restore("forum_threads", thread.id).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_hard_delete_removes_row() {
    let mut store = setup_test_store();
    let user = create_user(&mut store, "Ada");

    store.delete("users", user.id).unwrap();

    assert!(store.find_with_trashed("users", user.id).unwrap().is_none());
}

#[test]
fn test_force_delete_removes_soft_deleted_row() {
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");
    let thread = create_thread(&mut store, &category, &author, "Hello");
    store.delete("forum_threads", thread.id).unwrap();

    store.force_delete("forum_threads", thread.id).unwrap();

    assert!(store
        .find_with_trashed("forum_threads", thread.id)
        .unwrap()
        .is_none());
}

#[test]
fn test_unique_violation_is_constraint_error() {
    let mut store = setup_test_store();
    create_user(&mut store, "Ada");

    let err = store
        .create(
            "users",
            attributes! { "name" => "Other Ada", "email" => "ada@example.edu" },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Constraint);
    assert_eq!(err.entity(), Some("users"));
}

#[test]
fn test_dangling_foreign_key_is_constraint_error() {
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");

    let err = store
        .create(
            "forum_threads",
            attributes! {
                "category_id" => 777,
                "user_id" => author.id,
                "title" => "Orphan",
                "body" => "No category",
            },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Constraint);
}

#[test]
fn test_deleting_referenced_parent_is_constraint_error() {
    let mut store = setup_test_store();
    let author = create_user(&mut store, "Ada");
    let category = create_category(&mut store, "general");
    create_thread(&mut store, &category, &author, "Hello");

    let err = store.delete("users", author.id).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Constraint);
    assert!(store.find("users", author.id).unwrap().is_some());
}

#[test]
fn test_unknown_entity_is_schema_error() {
    let mut store = setup_test_store();
    let err = store.create("ghosts", attributes! {}).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Schema);
}

#[test]
fn test_to_json_hides_secret_and_appends_computed() {
    let mut store = setup_test_store();
    let webhook = store
        .create(
            "webhooks",
            attributes! {
                "url" => "https://hooks.example.test/a",
                "secret" => "s3cret",
                "events" => json!(["user.created"]),
            },
        )
        .unwrap();

    let schema = store.registry().get("webhooks").unwrap().clone();
    let rendered = webhook.to_json(&schema);

    assert!(rendered.get("secret").is_none());
    assert_eq!(rendered["url"], json!("https://hooks.example.test/a"));
    assert_eq!(rendered["delivery_success_rate"], json!(0.0));
}

#[test]
fn test_entity_without_timestamps_or_fields() {
    let mut registry = Registry::new();
    registry
        .define(SchemaBuilder::new("pings").without_timestamps())
        .unwrap();
    let mut store = RecordStore::in_memory(Arc::new(registry)).unwrap();

    let ping = store.create("pings", attributes! {}).unwrap();

    assert!(ping.created_at.is_none());
    assert!(ping.attributes.is_empty());
    assert_eq!(store.count(store.query("pings").unwrap()).unwrap(), 1);
}
