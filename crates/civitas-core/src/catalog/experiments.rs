use crate::derived;
use crate::errors::Result;
use crate::query::{Comparison, Predicate};
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::count;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("ab_tests")
            .required("name", "string")
            .field("description", "text")
            .field("goal_metric", "string")
            .with_default("status", "enum:draft,running,paused,completed", "draft")
            .field("starts_at", "datetime")
            .field("ends_at", "datetime")
            .counter("participants_count")
            .has_many("variants", "ab_test_variants", "ab_test_id")
            .has_many("participants", "ab_test_participants", "ab_test_id")
            .scope("running", |q, _| Ok(q.where_eq("status", "running")))
            // running and inside its scheduling window
            .scope("active", |q, args| {
                let now = args.now();
                Ok(q.where_eq("status", "running")
                    .where_any(vec![
                        Predicate::is_null("starts_at"),
                        Predicate::compare("starts_at", Comparison::Lte, now),
                    ])
                    .where_any(vec![
                        Predicate::is_null("ends_at"),
                        Predicate::compare("ends_at", Comparison::Gt, now),
                    ]))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("ab_test_variants")
            .required("ab_test_id", "integer")
            .required("name", "string")
            .with_default("weight", "integer", 50)
            .field("config", "json")
            .with_default("is_control", "boolean", false)
            .counter("participants_count")
            .counter("conversions_count")
            .unique_together(&["ab_test_id", "name"])
            .belongs_to("ab_test", "ab_tests", "ab_test_id")
            .has_many("participants", "ab_test_participants", "variant_id")
            .append("conversion_rate", |r| {
                Value::Decimal(derived::conversion_rate(
                    count(r, "conversions_count"),
                    count(r, "participants_count"),
                ))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("ab_test_participants")
            .required("ab_test_id", "integer")
            .required("variant_id", "integer")
            .field("user_id", "integer")
            .field("session_key", "string")
            .field("converted_at", "datetime")
            .unique_together(&["ab_test_id", "user_id"])
            .belongs_to("ab_test", "ab_tests", "ab_test_id")
            .belongs_to("variant", "ab_test_variants", "variant_id")
            .belongs_to("user", "users", "user_id")
            .counter_cache("ab_tests", "ab_test_id", "participants_count")
            .counter_cache("ab_test_variants", "variant_id", "participants_count")
            .scope("converted", |q, _| Ok(q.where_not_null("converted_at"))),
    )?;

    Ok(())
}
