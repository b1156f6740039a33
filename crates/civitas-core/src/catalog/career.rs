use crate::derived;
use crate::errors::Result;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::{count, decimal_value};

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("career_outcomes")
            .required("user_id", "integer")
            .field("employer", "string")
            .field("job_title", "string")
            .field("industry", "string")
            .field("location", "string")
            .field("salary", "decimal:2")
            .with_default("salary_type", "enum:hourly,monthly,annual", "annual")
            .field("started_on", "date")
            .with_default("is_current", "boolean", true)
            .belongs_to("user", "users", "user_id")
            .scope("current", |q, _| Ok(q.where_eq("is_current", true)))
            .scope("by_industry", |q, args| Ok(q.where_eq("industry", args.text(0)?)))
            .append("annualized_salary", |r| {
                decimal_value(r.decimal("salary").map(|amount| {
                    derived::annualize_salary(amount, r.text("salary_type").unwrap_or("annual"))
                }))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("career_analytics")
            .required("program", "string")
            .required("graduation_year", "integer")
            .with_default("total_graduates", "integer", 0)
            .with_default("tracked_graduates", "integer", 0)
            .with_default("employed_count", "integer", 0)
            .field("avg_starting_salary", "decimal:2")
            .field("avg_current_salary", "decimal:2")
            .field("computed_at", "datetime")
            .unique_together(&["program", "graduation_year"])
            .scope("for_year", |q, args| {
                Ok(q.where_eq("graduation_year", args.integer(0)?))
            })
            .append("tracking_rate", |r| {
                Value::Decimal(derived::tracking_rate(
                    count(r, "tracked_graduates"),
                    count(r, "total_graduates"),
                ))
            })
            .append("salary_growth", |r| {
                decimal_value(derived::salary_growth(
                    r.decimal("avg_starting_salary"),
                    r.decimal("avg_current_salary"),
                ))
            }),
    )?;

    Ok(())
}
