// Integration tests for seed import
// Seeds go through the record store, so casts, hooks and atomicity apply

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use civitas_core::errors::ExErrorKind;
use civitas_core::Value;
use civitas_store::seed::provenance::list_imports;
use civitas_store::seed::{compute_seed_digest, import_seed, import_seed_file, parse_seed_str};
use common::{counter, fixtures_dir, setup_test_store};
use serde_json::json;

#[test]
fn test_import_alumni_fixture() {
    // Given: an empty store and the alumni seed
    let mut store = setup_test_store();
    let path = fixtures_dir().join("alumni_seed.yaml");

    // When: it is imported
    let report = import_seed_file(&mut store, &path).unwrap();

    // Then: every record was created in seed order
    assert_eq!(report.created.len(), 6);
    assert_eq!(report.created[0].0, "users");
    assert_eq!(report.created[5].0, "skill_endorsements");
    assert_eq!(report.keys.len(), 4);

    // And: references resolved to the ids assigned during this import
    let thread = store
        .find_or_fail("forum_threads", report.keys["welcome"])
        .unwrap();
    assert_eq!(thread.foreign_id("user_id"), Some(report.keys["ada"]));
    assert_eq!(thread.foreign_id("category_id"), Some(report.keys["general"]));
    assert_eq!(thread.json("tags"), Some(&json!(["intro", "community"])));

    // And: an escaped leading '@' stays literal
    let post = store
        .first(store.query("forum_posts").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(post.get("body"), &Value::from("@grace here, hello!"));
}

#[test]
fn test_import_runs_counter_hooks() {
    let mut store = setup_test_store();
    let report = import_seed_file(&mut store, &fixtures_dir().join("alumni_seed.yaml")).unwrap();

    let ada = store.find_or_fail("users", report.keys["ada"]).unwrap();
    let general = store
        .find_or_fail("forum_categories", report.keys["general"])
        .unwrap();
    let welcome = store
        .find_or_fail("forum_threads", report.keys["welcome"])
        .unwrap();

    assert_eq!(counter(&store, &ada, "endorsements_count"), 1);
    assert_eq!(counter(&store, &general, "threads_count"), 1);
    assert_eq!(counter(&store, &welcome, "replies_count"), 1);
}

#[test]
fn test_import_records_provenance() {
    let mut store = setup_test_store();
    let path = fixtures_dir().join("alumni_seed.yaml");

    let report = import_seed_file(&mut store, &path).unwrap();

    let imports = list_imports(store.connection()).unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].seed_digest, report.seed_digest);
    assert_eq!(imports[0].record_count, 6);
    assert!(imports[0]
        .source
        .as_deref()
        .unwrap()
        .ends_with("alumni_seed.yaml"));
}

#[test]
fn test_failed_import_leaves_nothing_behind() {
    // Given: a seed whose second record fails its cast
    let mut store = setup_test_store();

    // When: it is imported
    let err = import_seed_file(&mut store, &fixtures_dir().join("broken_seed.yaml")).unwrap_err();

    // Then: the cast failure surfaces and the earlier user was rolled back
    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.field(), Some("starts_at"));
    assert_eq!(store.count(store.query("users").unwrap()).unwrap(), 0);
    assert!(list_imports(store.connection()).unwrap().is_empty());
}

#[test]
fn test_unknown_entity_is_rejected_before_writing() {
    let mut store = setup_test_store();
    let seed = parse_seed_str(
        r#"
schema_version: 0
records:
  - entity: users
    fields: { name: Ada, email: ada@example.edu }
  - entity: spaceships
    fields: { name: Enterprise }
"#,
    )
    .unwrap();

    let err = import_seed(&mut store, &seed, None).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(store.count(store.query("users").unwrap()).unwrap(), 0);
}

#[test]
fn test_reimport_of_unique_rows_fails_and_keeps_one_provenance_row() {
    let mut store = setup_test_store();
    let seed = parse_seed_str(
        r#"
schema_version: 0
records:
  - entity: forum_categories
    fields: { name: Events, slug: events }
"#,
    )
    .unwrap();
    import_seed(&mut store, &seed, None).unwrap();

    // The slug is unique, so the second import fails and is rolled back
    let err = import_seed(&mut store, &seed, None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Constraint);

    let imports = list_imports(store.connection()).unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].seed_digest, compute_seed_digest(&seed).unwrap());
}
