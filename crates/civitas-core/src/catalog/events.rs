use serde_json::json;

use crate::errors::Result;
use crate::query::{Direction, OrderBy};
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::count;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("events")
            .required("title", "string")
            .field("description", "text")
            .field("category", "string")
            .field("venue", "string")
            .with_default("is_virtual", "boolean", false)
            .with_default("is_featured", "boolean", false)
            .with_default("status", "enum:draft,published,cancelled", "draft")
            .required("starts_at", "datetime")
            .field("ends_at", "datetime")
            .field("capacity", "integer")
            .with_default("tags", "json", json!([]))
            .field("organizer_id", "integer")
            .counter("registrations_count")
            .soft_deletes()
            .belongs_to("organizer", "users", "organizer_id")
            .has_many_ordered(
                "registrations",
                "event_registrations",
                "event_id",
                OrderBy::asc("created_at"),
            )
            .has_one("reunion", "reunions", "event_id")
            .scope("published", |q, _| Ok(q.where_eq("status", "published")))
            .scope("featured", |q, _| Ok(q.where_eq("is_featured", true)))
            .scope("upcoming", |q, args| {
                Ok(q.where_gt("starts_at", args.now())
                    .order_by("starts_at", Direction::Asc))
            })
            .scope("within_date_range", |q, args| {
                Ok(q.where_gte("starts_at", args.datetime(0)?)
                    .where_lte("starts_at", args.datetime(1)?))
            })
            .scope("by_category", |q, args| {
                Ok(q.where_eq("category", args.text(0)?))
            })
            .append("spots_remaining", |r| match r.integer("capacity") {
                Some(capacity) => {
                    Value::Integer((capacity - count(r, "registrations_count")).max(0))
                }
                None => Value::Null,
            }),
    )?;

    registry.define(
        SchemaBuilder::new("event_registrations")
            .required("event_id", "integer")
            .required("user_id", "integer")
            .with_default(
                "status",
                "enum:registered,waitlisted,cancelled,attended",
                "registered",
            )
            .with_default("guests", "integer", 0)
            .field("checked_in_at", "datetime")
            .unique_together(&["event_id", "user_id"])
            .belongs_to("event", "events", "event_id")
            .belongs_to("user", "users", "user_id")
            .counter_cache("events", "event_id", "registrations_count")
            .scope("attended", |q, _| Ok(q.where_eq("status", "attended"))),
    )?;

    Ok(())
}
