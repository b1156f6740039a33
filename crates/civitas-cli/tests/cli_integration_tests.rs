//! CLI integration tests
//!
//! Run the `civitas` binary against a file database in a temp directory and
//! check its JSON output and exit codes.

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value as JsonValue;
use tempfile::TempDir;

fn civitas(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_civitas"))
        .current_dir(dir.path())
        .env("CIVITAS__DATABASE__PATH", dir.path().join("alumni.db"))
        .env("CIVITAS__LOGGING__PROFILE", "test")
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout_json(output: &Output) -> JsonValue {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn seed_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("civitas-store")
        .join("tests")
        .join("fixtures")
        .join("alumni_seed.yaml")
}

#[test]
fn test_create_then_find() {
    // Given: a fresh database
    let dir = TempDir::new().unwrap();

    // When: a user is created
    let created = stdout_json(&civitas(
        &dir,
        &["create", "users", r#"{"name":"Ada","email":"ada@example.edu","graduation_year":"2015"}"#],
    ));

    // Then: the printed record carries the id and cast values
    assert_eq!(created["name"], "Ada");
    assert_eq!(created["graduation_year"], 2015);
    assert_eq!(created["is_active"], true);

    let id = created["id"].as_i64().unwrap().to_string();
    let found = stdout_json(&civitas(&dir, &["find", "users", &id]));
    assert_eq!(found, created);
}

#[test]
fn test_missing_record_exits_with_error_code() {
    let dir = TempDir::new().unwrap();

    let output = civitas(&dir, &["find", "users", "42"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERR_NOT_FOUND"), "stderr: {}", stderr);
}

#[test]
fn test_validation_failure_exits_with_error_code() {
    let dir = TempDir::new().unwrap();

    let output = civitas(&dir, &["create", "users", r#"{"name":"No Email"}"#]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERR_VALIDATION"));
}

#[test]
fn test_seed_import_then_query_with_scope() {
    // Given: the alumni seed imported
    let dir = TempDir::new().unwrap();
    let fixture = seed_fixture();
    let imported = stdout_json(&civitas(
        &dir,
        &["seed", "import", fixture.to_str().unwrap()],
    ));
    assert_eq!(imported[0]["records"], 6);

    // When: users are queried through a scope with an argument
    let users = stdout_json(&civitas(
        &dir,
        &["query", "users", "--scope", "graduated_in=2012"],
    ));

    // Then: only the matching graduate comes back
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["name"], "Grace Hopper");
}

#[test]
fn test_delete_and_restore_soft_deleted_record() {
    let dir = TempDir::new().unwrap();
    let fixture = seed_fixture();
    let imported = stdout_json(&civitas(&dir, &["seed", "import", fixture.to_str().unwrap()]));
    let thread_id = imported[0]["keys"]["welcome"].as_i64().unwrap().to_string();

    stdout_json(&civitas(&dir, &["delete", "forum_threads", &thread_id]));
    let hidden = civitas(&dir, &["find", "forum_threads", &thread_id]);
    assert_eq!(hidden.status.code(), Some(1));

    let trashed = stdout_json(&civitas(
        &dir,
        &["find", "forum_threads", &thread_id, "--with-trashed"],
    ));
    assert!(!trashed["deleted_at"].is_null());

    let restored = stdout_json(&civitas(&dir, &["restore", "forum_threads", &thread_id]));
    assert!(restored["deleted_at"].is_null());
}

#[test]
fn test_entities_lists_and_describes() {
    let dir = TempDir::new().unwrap();

    let names = stdout_json(&civitas(&dir, &["entities"]));
    let names: Vec<&str> = names
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n.as_str())
        .collect();
    assert!(names.contains(&"users"));
    assert!(names.contains(&"webhooks"));

    let webhooks = stdout_json(&civitas(&dir, &["entities", "webhooks"]));
    assert_eq!(webhooks["soft_deletes"], false);
    let secret = webhooks["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "secret")
        .unwrap();
    assert_eq!(secret["hidden"], true);
}

#[test]
fn test_migrate_lists_applied_migrations() {
    let dir = TempDir::new().unwrap();

    let applied = stdout_json(&civitas(&dir, &["migrate"]));

    let ids: Vec<&str> = applied
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["migration_id"].as_str())
        .collect();
    assert_eq!(ids[0], "001_seed_provenance");
    assert!(ids.contains(&"create_users"));
}
