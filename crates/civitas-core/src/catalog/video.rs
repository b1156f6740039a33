use crate::derived;
use crate::errors::Result;
use crate::query::Direction;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::now;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("video_calls")
            .required("host_id", "integer")
            .required("title", "string")
            .with_default("status", "enum:scheduled,live,ended,cancelled", "scheduled")
            .field("room_name", "string")
            .unique("room_name")
            .field("scheduled_for", "datetime")
            .field("started_at", "datetime")
            .field("ended_at", "datetime")
            .field("recording_url", "string")
            .belongs_to("host", "users", "host_id")
            .belongs_to_many(
                "participants",
                "users",
                "video_call_participants",
                "video_call_id",
                "user_id",
                &[("joined_at", "datetime"), ("left_at", "datetime")],
            )
            .scope("live", |q, _| Ok(q.where_eq("status", "live")))
            .scope("scheduled", |q, _| {
                Ok(q.where_eq("status", "scheduled")
                    .order_by("scheduled_for", Direction::Asc))
            })
            .append("duration_minutes", |r| {
                Value::from(derived::duration_minutes(
                    r.datetime("started_at"),
                    r.datetime("ended_at"),
                    now(),
                ))
            }),
    )?;

    Ok(())
}
