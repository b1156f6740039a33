use crate::errors::Result;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("scholarships")
            .required("name", "string")
            .field("description", "text")
            .required("amount", "decimal:2")
            .field("deadline", "datetime")
            .with_default("is_active", "boolean", true)
            .with_default("awards_available", "integer", 1)
            .field("criteria", "json")
            .counter("applications_count")
            .has_many("applications", "scholarship_applications", "scholarship_id")
            .scope("active", |q, _| Ok(q.where_eq("is_active", true)))
            .scope("open", |q, args| {
                Ok(q.where_eq("is_active", true)
                    .where_gt("deadline", args.now()))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("scholarship_applications")
            .required("scholarship_id", "integer")
            .required("user_id", "integer")
            .with_default(
                "status",
                "enum:pending,approved,reviewed,rejected",
                "pending",
            )
            .field("essay", "text")
            .field("gpa", "decimal:2")
            .field("reviewed_at", "datetime")
            .field("reviewer_notes", "text")
            .hidden("reviewer_notes")
            .unique_together(&["scholarship_id", "user_id"])
            .belongs_to("scholarship", "scholarships", "scholarship_id")
            .belongs_to("applicant", "users", "user_id")
            .counter_cache("scholarships", "scholarship_id", "applications_count")
            .scope("pending", |q, _| Ok(q.where_eq("status", "pending")))
            .scope("with_status", |q, args| Ok(q.where_eq("status", args.text(0)?))),
    )?;

    Ok(())
}
