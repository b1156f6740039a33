//! Rendering queries to parameterised SQL
//!
//! Identifiers come from validated schemas and are interpolated directly;
//! every value is bound as a parameter.

use civitas_core::query::Comparison;
use civitas_core::{EntitySchema, Predicate, Query, Trashed, Value};
use rusqlite::types::Value as SqlValue;

use crate::codec;

/// SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Columns selected for hydration, in the order `hydrate` expects them
pub fn select_columns(schema: &EntitySchema) -> Vec<&str> {
    let mut columns = vec!["id"];
    columns.extend(schema.fields().iter().map(|f| f.name.as_str()));
    if schema.timestamps() {
        columns.push("created_at");
        columns.push("updated_at");
    }
    if schema.soft_deletes() {
        columns.push("deleted_at");
    }
    columns
}

/// `SELECT` for a query that has already been checked
pub fn select(query: &Query) -> Statement {
    let schema = query.schema();
    let mut sql = format!(
        "SELECT {} FROM {}",
        select_columns(schema).join(", "),
        schema.name()
    );
    let mut params = Vec::new();
    push_where(&mut sql, &mut params, query);

    let order: Vec<String> = query
        .ordering()
        .iter()
        .map(|o| format!("{} {}", o.field, o.direction.as_sql()))
        .collect();
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    match (query.limit_value(), query.offset_value()) {
        (Some(limit), offset) => {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(clamp(limit)));
            params.push(SqlValue::Integer(clamp(offset.unwrap_or(0))));
        }
        (None, Some(offset)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(SqlValue::Integer(clamp(offset)));
        }
        (None, None) => {}
    }

    Statement { sql, params }
}

/// `SELECT COUNT(*)` honouring filters and trashed visibility, ignoring paging
pub fn count(query: &Query) -> Statement {
    let mut sql = format!("SELECT COUNT(*) FROM {}", query.entity());
    let mut params = Vec::new();
    push_where(&mut sql, &mut params, query);
    Statement { sql, params }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn push_where(sql: &mut String, params: &mut Vec<SqlValue>, query: &Query) {
    let table = query.entity();
    let mut clauses: Vec<String> = query
        .predicates()
        .iter()
        .map(|p| predicate(table, p, params))
        .collect();

    match (query.schema().soft_deletes(), query.trashed()) {
        (true, Trashed::Exclude) => clauses.push("deleted_at IS NULL".to_string()),
        (true, Trashed::Only) => clauses.push("deleted_at IS NOT NULL".to_string()),
        // Nothing is ever trashed on an entity without soft deletes
        (false, Trashed::Only) => clauses.push("1 = 0".to_string()),
        (_, Trashed::Include) | (false, Trashed::Exclude) => {}
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

fn predicate(table: &str, predicate: &Predicate, params: &mut Vec<SqlValue>) -> String {
    match predicate {
        Predicate::Compare {
            field,
            op: Comparison::Eq,
            value: Value::Null,
        } => format!("{} IS NULL", field),
        Predicate::Compare {
            field,
            op: Comparison::Ne,
            value: Value::Null,
        } => format!("{} IS NOT NULL", field),
        Predicate::Compare { field, op, value } => {
            params.push(codec::encode(value));
            format!("{} {} ?", field, op.as_sql())
        }
        Predicate::In {
            values, negated, ..
        } if values.is_empty() => {
            if *negated {
                "1 = 1".to_string()
            } else {
                "0 = 1".to_string()
            }
        }
        Predicate::In {
            field,
            values,
            negated,
        } => {
            params.extend(values.iter().map(codec::encode));
            let marks = vec!["?"; values.len()].join(", ");
            let not = if *negated { "NOT " } else { "" };
            format!("{} {}IN ({})", field, not, marks)
        }
        Predicate::Null { field, negated } => {
            if *negated {
                format!("{} IS NOT NULL", field)
            } else {
                format!("{} IS NULL", field)
            }
        }
        Predicate::Like { field, pattern } => {
            params.push(SqlValue::Text(pattern.clone()));
            format!("{} LIKE ? ESCAPE '\\'", field)
        }
        Predicate::JsonContains { field, value } => {
            params.push(codec::encode(value));
            format!(
                "EXISTS (SELECT 1 FROM json_each({}.{}) WHERE json_each.value = ?)",
                table, field
            )
        }
        Predicate::Any(inner) if inner.is_empty() => "0 = 1".to_string(),
        Predicate::Any(inner) => {
            let parts: Vec<String> = inner
                .iter()
                .map(|p| self::predicate(table, p, params))
                .collect();
            format!("({})", parts.join(" OR "))
        }
    }
}
