use crate::errors::Result;
use crate::query::OrderBy;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("users")
            .required("name", "string")
            .required("email", "string")
            .unique("email")
            .field("graduation_year", "integer")
            .field("degree", "string")
            .field("headline", "string")
            .with_default("is_active", "boolean", true)
            .counter("endorsements_count")
            .has_many("endorsements", "skill_endorsements", "user_id")
            .has_many_ordered(
                "onboarding_steps",
                "onboarding_steps",
                "user_id",
                OrderBy::asc("position"),
            )
            .has_many("career_outcomes", "career_outcomes", "user_id")
            .belongs_to_many(
                "conversations",
                "conversations",
                "conversation_participants",
                "user_id",
                "conversation_id",
                &[("last_read_at", "datetime"), ("is_muted", "boolean")],
            )
            .scope("active", |q, _| Ok(q.where_eq("is_active", true)))
            .scope("graduated_in", |q, args| {
                Ok(q.where_eq("graduation_year", args.integer(0)?))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("onboarding_steps")
            .required("user_id", "integer")
            .required("step", "string")
            .with_default("position", "integer", 0)
            .field("completed_at", "datetime")
            .field("data", "json")
            .unique_together(&["user_id", "step"])
            .belongs_to("user", "users", "user_id")
            .scope("completed", |q, _| Ok(q.where_not_null("completed_at")))
            .scope("incomplete", |q, _| Ok(q.where_null("completed_at"))),
    )?;

    registry.define(
        SchemaBuilder::new("skill_endorsements")
            .required("user_id", "integer")
            .required("endorser_id", "integer")
            .required("skill", "string")
            .field("note", "text")
            .unique_together(&["user_id", "endorser_id", "skill"])
            .belongs_to("user", "users", "user_id")
            .belongs_to("endorser", "users", "endorser_id")
            .counter_cache("users", "user_id", "endorsements_count")
            .scope("for_skill", |q, args| Ok(q.where_eq("skill", args.text(0)?))),
    )?;

    Ok(())
}
