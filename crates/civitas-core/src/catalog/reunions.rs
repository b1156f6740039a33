use crate::errors::Result;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("reunions")
            .field("event_id", "integer")
            .required("class_year", "integer")
            .required("title", "string")
            .field("description", "text")
            .with_default(
                "status",
                "enum:planning,confirmed,completed,cancelled",
                "planning",
            )
            .field("budget", "decimal:2")
            .field("contact_email", "string")
            .belongs_to("event", "events", "event_id")
            .belongs_to_many(
                "committee",
                "users",
                "reunion_committee_members",
                "reunion_id",
                "user_id",
                &[("role", "string")],
            )
            .scope("for_class", |q, args| Ok(q.where_eq("class_year", args.integer(0)?)))
            .scope("planning", |q, _| Ok(q.where_eq("status", "planning"))),
    )?;

    Ok(())
}
