use std::sync::Arc;

use serde_json::json;

use crate::derived;
use crate::errors::Result;
use crate::hooks::{FnHook, HookEvent};
use crate::query::{Comparison, OrderBy, Predicate};
use crate::record::Record;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::count;

fn is_successful(record: &Record) -> bool {
    matches!(record.integer("response_status"), Some(status) if (200..300).contains(&status))
}

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("webhooks")
            .required("url", "string")
            .required("secret", "string")
            .hidden("secret")
            .with_default("events", "json", json!([]))
            .with_default("is_active", "boolean", true)
            .field("owner_id", "integer")
            .field("last_triggered_at", "datetime")
            .counter("success_count")
            .counter("failure_count")
            .belongs_to("owner", "users", "owner_id")
            .has_many_ordered(
                "deliveries",
                "webhook_deliveries",
                "webhook_id",
                OrderBy::desc("created_at"),
            )
            .scope("active", |q, _| Ok(q.where_eq("is_active", true)))
            .scope("subscribed_to", |q, args| {
                Ok(q.where_json_contains("events", args.text(0)?))
            })
            .append("delivery_success_rate", |r| {
                let success = count(r, "success_count");
                Value::Decimal(derived::conversion_rate(
                    success,
                    success + count(r, "failure_count"),
                ))
            }),
    )?;

    // Each delivery bumps exactly one of the parent's two counters
    let tally = FnHook::new("webhook_delivery_tally", |ctx, record| {
        let Some(webhook_id) = record.foreign_id("webhook_id") else {
            return Ok(());
        };
        let counter = if is_successful(record) {
            "success_count"
        } else {
            "failure_count"
        };
        ctx.adjust_counter("webhooks", webhook_id, counter, 1)
    });

    registry.define(
        SchemaBuilder::new("webhook_deliveries")
            .required("webhook_id", "integer")
            .required("event", "string")
            .field("payload", "json")
            .field("response_status", "integer")
            .field("response_body", "text")
            .with_default("attempts", "integer", 1)
            .field("delivered_at", "datetime")
            .belongs_to("webhook", "webhooks", "webhook_id")
            .hook(HookEvent::AfterCreate, Arc::new(tally))
            .scope("failed", |q, _| {
                Ok(q.where_any(vec![
                    Predicate::is_null("response_status"),
                    Predicate::compare("response_status", Comparison::Gte, 300),
                ]))
            })
            .append("is_successful", |r| Value::Boolean(is_successful(r))),
    )?;

    Ok(())
}
