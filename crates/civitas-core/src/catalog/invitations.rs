use crate::derived;
use crate::errors::Result;
use crate::query::{Comparison, Predicate};
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::value::Value;

use super::now;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("invitations")
            .required("email", "string")
            .required("token", "string")
            .unique("token")
            .hidden("token")
            .with_default("role", "enum:member,moderator,admin", "member")
            .field("invited_by", "integer")
            .field("accepted_at", "datetime")
            .field("expires_at", "datetime")
            .belongs_to("inviter", "users", "invited_by")
            .scope("pending", |q, args| {
                Ok(q.where_null("accepted_at").where_any(vec![
                    Predicate::is_null("expires_at"),
                    Predicate::compare("expires_at", Comparison::Gte, args.now()),
                ]))
            })
            .append("is_expired", |r| {
                Value::Boolean(derived::is_expired(r.datetime("expires_at"), now()))
            }),
    )?;

    Ok(())
}
