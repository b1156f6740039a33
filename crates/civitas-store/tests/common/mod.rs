use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use civitas_core::{attributes, Record, Registry};
use civitas_store::RecordStore;

/// The full platform catalog, shared between stores
#[allow(dead_code)]
pub fn registry() -> Arc<Registry> {
    Arc::new(civitas_core::platform_registry().unwrap())
}

/// In-memory store over the platform catalog, migrated
#[allow(dead_code)]
pub fn setup_test_store() -> RecordStore {
    RecordStore::in_memory(registry()).unwrap()
}

#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

#[allow(dead_code)]
pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn create_user(store: &mut RecordStore, name: &str) -> Record {
    store
        .create(
            "users",
            attributes! {
                "name" => name,
                "email" => format!("{}@example.edu", name.to_lowercase()),
            },
        )
        .unwrap()
}

#[allow(dead_code)]
pub fn create_category(store: &mut RecordStore, slug: &str) -> Record {
    store
        .create(
            "forum_categories",
            attributes! { "name" => slug, "slug" => slug },
        )
        .unwrap()
}

#[allow(dead_code)]
pub fn create_thread(store: &mut RecordStore, category: &Record, author: &Record, title: &str) -> Record {
    store
        .create(
            "forum_threads",
            attributes! {
                "category_id" => category.id,
                "user_id" => author.id,
                "title" => title,
                "body" => format!("{} body", title),
            },
        )
        .unwrap()
}

/// Re-read a record and return one integer column
#[allow(dead_code)]
pub fn counter(store: &RecordStore, record: &Record, field: &str) -> i64 {
    store
        .find_with_trashed(&record.entity, record.id)
        .unwrap()
        .unwrap()
        .integer(field)
        .unwrap()
}
