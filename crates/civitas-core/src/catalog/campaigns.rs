use crate::derived;
use crate::errors::Result;
use crate::query::Predicate;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("message_templates")
            .required("name", "string")
            .required("subject", "string")
            .required("body", "text")
            .field("category", "string")
            .counter("usage_count")
            .has_many("campaigns", "email_campaigns", "template_id")
            .scope("by_category", |q, args| Ok(q.where_eq("category", args.text(0)?))),
    )?;

    registry.define(
        SchemaBuilder::new("email_campaigns")
            .field("template_id", "integer")
            .required("name", "string")
            .required("subject", "string")
            .with_default(
                "status",
                "enum:draft,scheduled,sending,sent,cancelled",
                "draft",
            )
            .field("audience", "json")
            .field("scheduled_at", "datetime")
            .field("sent_at", "datetime")
            .counter("recipients_count")
            .belongs_to("template", "message_templates", "template_id")
            .has_many("recipients", "campaign_recipients", "campaign_id")
            .counter_cache("message_templates", "template_id", "usage_count")
            .scope("scheduled", |q, _| Ok(q.where_eq("status", "scheduled")))
            .scope("sent", |q, _| Ok(q.where_eq("status", "sent"))),
    )?;

    registry.define(
        SchemaBuilder::new("campaign_recipients")
            .required("campaign_id", "integer")
            .field("user_id", "integer")
            .required("email", "string")
            .field("opened_at", "datetime")
            .field("clicked_at", "datetime")
            .field("bounced_at", "datetime")
            .unique_together(&["campaign_id", "email"])
            .belongs_to("campaign", "email_campaigns", "campaign_id")
            .belongs_to("user", "users", "user_id")
            .counter_cache("email_campaigns", "campaign_id", "recipients_count")
            .scope("engaged", |q, _| {
                Ok(q.where_any(vec![
                    Predicate::Null {
                        field: "opened_at".to_string(),
                        negated: true,
                    },
                    Predicate::Null {
                        field: "clicked_at".to_string(),
                        negated: true,
                    },
                ]))
            })
            .append("has_engaged", |r| {
                Value::Boolean(derived::has_engaged(
                    r.datetime("opened_at"),
                    r.datetime("clicked_at"),
                ))
            }),
    )?;

    Ok(())
}
