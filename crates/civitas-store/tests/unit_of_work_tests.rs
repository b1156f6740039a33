// Grouping several operations into one unit of work

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use civitas_core::attributes;
use civitas_core::errors::{ExError, ExErrorKind};
use common::{counter, create_user, setup_test_store};

#[test]
fn test_transaction_commits_all_writes_and_returns_value() {
    // Given: an empty store
    let mut store = setup_test_store();

    // When: a user and their first onboarding steps are created together
    let user = store
        .transaction(|uow| {
            let user = uow.create(
                "users",
                attributes! { "name" => "Ada", "email" => "ada@example.edu" },
            )?;
            for (position, step) in ["welcome", "profile"].iter().enumerate() {
                uow.create(
                    "onboarding_steps",
                    attributes! { "user_id" => user.id, "step" => *step, "position" => position as i64 },
                )?;
            }
            Ok(user)
        })
        .unwrap();

    // Then: everything is visible afterwards
    let steps = store.has_many(&user, "onboarding_steps").unwrap();
    assert_eq!(store.count(steps).unwrap(), 2);
}

#[test]
fn test_transaction_rolls_back_on_error() {
    let mut store = setup_test_store();

    let err = store
        .transaction(|uow| {
            uow.create(
                "users",
                attributes! { "name" => "Ada", "email" => "ada@example.edu" },
            )?;
            // Duplicate email
            uow.create(
                "users",
                attributes! { "name" => "Ada Again", "email" => "ada@example.edu" },
            )?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Constraint);
    assert_eq!(store.count(store.query("users").unwrap()).unwrap(), 0);
}

#[test]
fn test_caller_error_rolls_back() {
    let mut store = setup_test_store();

    let err = store
        .transaction(|uow| -> civitas_store::Result<()> {
            uow.create("forum_categories", attributes! { "name" => "General", "slug" => "general" })?;
            Err(ExError::new(ExErrorKind::Validation).with_message("caller changed its mind"))
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.op(), Some("transaction"));
    assert_eq!(store.count(store.query("forum_categories").unwrap()).unwrap(), 0);
}

#[test]
fn test_reads_inside_transaction_see_uncommitted_writes() {
    let mut store = setup_test_store();
    let ada = create_user(&mut store, "Ada");
    let grace = create_user(&mut store, "Grace");

    let seen = store
        .transaction(|uow| {
            uow.create(
                "skill_endorsements",
                attributes! { "user_id" => ada.id, "endorser_id" => grace.id, "skill" => "math" },
            )?;
            let ada = uow.find_or_fail("users", ada.id)?;
            Ok(ada.integer("endorsements_count"))
        })
        .unwrap();

    assert_eq!(seen, Some(1));
    assert_eq!(counter(&store, &ada, "endorsements_count"), 1);
}

#[test]
fn test_pivot_and_record_writes_share_a_unit_of_work() {
    let mut store = setup_test_store();
    let ada = create_user(&mut store, "Ada");

    let err = store
        .transaction(|uow| {
            let conversation = uow.create("conversations", attributes! { "subject" => "Hi" })?;
            uow.attach(&conversation, "participants", ada.id, attributes! {})?;
            uow.attach(&conversation, "participants", ada.id, attributes! {})?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Constraint);
    assert_eq!(store.count(store.query("conversations").unwrap()).unwrap(), 0);
    assert!(store.belongs_to_many(&ada, "conversations").unwrap().is_empty());
}
