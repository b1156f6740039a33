use crate::errors::Result;
use crate::query::{Direction, OrderBy, Predicate};
use crate::registry::Registry;
use crate::schema::SchemaBuilder;

pub(super) fn define(registry: &mut Registry) -> Result<()> {
    registry.define(
        SchemaBuilder::new("forum_categories")
            .required("name", "string")
            .required("slug", "string")
            .unique("slug")
            .field("description", "text")
            .with_default("sort_order", "integer", 0)
            .counter("threads_count")
            .has_many_ordered(
                "threads",
                "forum_threads",
                "category_id",
                OrderBy::desc("last_reply_at"),
            )
            .scope("ordered", |q, _| Ok(q.order_by("sort_order", Direction::Asc))),
    )?;

    registry.define(
        SchemaBuilder::new("forum_threads")
            .required("category_id", "integer")
            .required("user_id", "integer")
            .required("title", "string")
            .required("body", "text")
            .with_default("is_pinned", "boolean", false)
            .with_default("is_locked", "boolean", false)
            .field("tags", "json")
            .field("last_reply_at", "datetime")
            .counter("replies_count")
            .soft_deletes()
            .fillable(&["category_id", "user_id", "title", "body", "tags"])
            .belongs_to("category", "forum_categories", "category_id")
            .belongs_to("author", "users", "user_id")
            .has_many_ordered("posts", "forum_posts", "thread_id", OrderBy::asc("created_at"))
            .counter_cache("forum_categories", "category_id", "threads_count")
            .scope("pinned", |q, _| Ok(q.where_eq("is_pinned", true)))
            .scope("by_category", |q, args| {
                Ok(q.where_eq("category_id", args.integer(0)?))
            })
            .scope("search", |q, args| {
                let needle = args.text(0)?;
                Ok(q.where_any(vec![
                    Predicate::contains("title", &needle),
                    Predicate::contains("body", &needle),
                ]))
            })
            .scope("tagged", |q, args| {
                Ok(q.where_json_contains("tags", args.text(0)?))
            }),
    )?;

    registry.define(
        SchemaBuilder::new("forum_posts")
            .required("thread_id", "integer")
            .required("user_id", "integer")
            .required("body", "text")
            .with_default("is_solution", "boolean", false)
            .counter("likes_count")
            .soft_deletes()
            .belongs_to("thread", "forum_threads", "thread_id")
            .belongs_to("author", "users", "user_id")
            .has_many("likes", "forum_post_likes", "post_id")
            .counter_cache("forum_threads", "thread_id", "replies_count")
            .scope("solutions", |q, _| Ok(q.where_eq("is_solution", true))),
    )?;

    registry.define(
        SchemaBuilder::new("forum_post_likes")
            .required("post_id", "integer")
            .required("user_id", "integer")
            .unique_together(&["post_id", "user_id"])
            .belongs_to("post", "forum_posts", "post_id")
            .belongs_to("user", "users", "user_id")
            .counter_cache("forum_posts", "post_id", "likes_count"),
    )?;

    Ok(())
}
