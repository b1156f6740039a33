use crate::errors::Result;
use crate::query::{Direction, OrderBy};
use crate::registry::Registry;
use crate::schema::SchemaBuilder;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("conversations")
            .field("subject", "string")
            .with_default("is_group", "boolean", false)
            .field("created_by", "integer")
            .field("last_message_at", "datetime")
            .counter("messages_count")
            .belongs_to("creator", "users", "created_by")
            .belongs_to_many(
                "participants",
                "users",
                "conversation_participants",
                "conversation_id",
                "user_id",
                &[("last_read_at", "datetime"), ("is_muted", "boolean")],
            )
            .has_many_ordered("messages", "messages", "conversation_id", OrderBy::asc("created_at"))
            .scope("groups", |q, _| Ok(q.where_eq("is_group", true)))
            .scope("recent", |q, _| {
                Ok(q.where_not_null("last_message_at")
                    .order_by("last_message_at", Direction::Desc))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("messages")
            .required("conversation_id", "integer")
            .required("sender_id", "integer")
            .required("body", "text")
            .field("attachments", "json")
            .field("edited_at", "datetime")
            .soft_deletes()
            .belongs_to("conversation", "conversations", "conversation_id")
            .belongs_to("sender", "users", "sender_id")
            .counter_cache("conversations", "conversation_id", "messages_count"),
    )?;

    Ok(())
}
