use crate::derived;
use crate::errors::Result;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::count;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("import_histories")
            .field("user_id", "integer")
            .required("entity_type", "string")
            .required("filename", "string")
            .with_default(
                "status",
                "enum:pending,processing,completed,failed,rolled_back",
                "pending",
            )
            .with_default("total_rows", "integer", 0)
            .with_default("created_count", "integer", 0)
            .with_default("updated_count", "integer", 0)
            .with_default("failed_count", "integer", 0)
            .field("errors", "json")
            .field("completed_at", "datetime")
            .field("rolled_back_at", "datetime")
            .belongs_to("user", "users", "user_id")
            .scope("completed", |q, _| Ok(q.where_eq("status", "completed")))
            .scope("for_entity", |q, args| Ok(q.where_eq("entity_type", args.text(0)?)))
            .append("success_rate", |r| {
                Value::Decimal(derived::success_rate(
                    count(r, "created_count"),
                    count(r, "updated_count"),
                    count(r, "total_rows"),
                ))
            })
            .append("error_rate", |r| {
                Value::Decimal(derived::error_rate(
                    count(r, "failed_count"),
                    count(r, "total_rows"),
                ))
            })
            .append("can_rollback", |r| {
                Value::Boolean(derived::can_rollback(
                    r.text("status").unwrap_or_default(),
                    r.datetime("rolled_back_at"),
                    count(r, "created_count").saturating_add(count(r, "updated_count")),
                ))
            }),
    )?;

    Ok(())
}
