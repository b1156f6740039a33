//! Record commands
//!
//! Usage:
//!   civitas create <ENTITY> <JSON>
//!   civitas find <ENTITY> <ID> [--with-trashed]
//!   civitas query <ENTITY> [--scope NAME[=ARG,...]]... [--with-trashed | --only-trashed] [--limit N] [--offset N]
//!   civitas update <ENTITY> <ID> <JSON>
//!   civitas delete <ENTITY> <ID> [--force]
//!   civitas restore <ENTITY> <ID>

use std::str::FromStr;

use clap::Args;
use civitas_core::errors::{ExError, RecordError};
use civitas_core::record::attributes_from_json;
use civitas_core::{Attributes, Record, RecordId, Value};
use civitas_store::RecordStore;
use serde_json::{json, Value as JsonValue};

use super::print_json;

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub entity: String,
    /// Fields as a JSON object, e.g. '{"name":"Ada","email":"ada@example.edu"}'
    pub fields: String,
}

#[derive(Debug, Args)]
pub struct FindArgs {
    pub entity: String,
    pub id: i64,
    /// Also return a soft-deleted record
    #[arg(long)]
    pub with_trashed: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    pub entity: String,

    /// Named scope, with comma-separated arguments after '='; repeatable
    #[arg(long = "scope", value_name = "NAME[=ARG,...]")]
    pub scopes: Vec<ScopeSpec>,

    #[arg(long, conflicts_with = "only_trashed")]
    pub with_trashed: bool,

    #[arg(long)]
    pub only_trashed: bool,

    #[arg(long)]
    pub limit: Option<u64>,

    #[arg(long)]
    pub offset: Option<u64>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub entity: String,
    pub id: i64,
    /// Fields to change as a JSON object
    pub fields: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    pub entity: String,
    pub id: i64,
    /// Remove the row permanently, even when the entity soft deletes
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    pub entity: String,
    pub id: i64,
}

/// `--scope` value: a scope name plus its textual arguments
///
/// Arguments stay text here; each scope casts them to what it expects.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl FromStr for ScopeSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args) = match s.split_once('=') {
            Some((name, args)) => (name, args.split(',').map(str::to_string).collect()),
            None => (s, Vec::new()),
        };
        if name.is_empty() {
            return Err(format!("scope '{}' has no name", s));
        }
        Ok(Self {
            name: name.to_string(),
            args,
        })
    }
}

pub fn create(store: &mut RecordStore, args: CreateArgs) -> civitas_store::Result<()> {
    let attributes = parse_fields(&args.fields)?;
    let record = store.create(&args.entity, attributes)?;
    print_record(store, &record)
}

pub fn find(store: &RecordStore, args: FindArgs) -> civitas_store::Result<()> {
    let id = RecordId(args.id);
    let record = if args.with_trashed {
        store
            .find_with_trashed(&args.entity, id)?
            .ok_or_else(|| not_found(&args.entity, id))?
    } else {
        store.find_or_fail(&args.entity, id)?
    };
    print_record(store, &record)
}

pub fn query(store: &RecordStore, args: QueryArgs) -> civitas_store::Result<()> {
    let mut query = store.query(&args.entity)?;
    for scope in &args.scopes {
        let values: Vec<Value> = scope.args.iter().map(|a| Value::from(a.as_str())).collect();
        query = query.scope(&scope.name, &values)?;
    }
    if args.with_trashed {
        query = query.with_trashed();
    }
    if args.only_trashed {
        query = query.only_trashed();
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }

    let schema = query.schema().clone();
    let records = store.get(query)?;
    let rendered: Vec<JsonValue> = records.iter().map(|r| r.to_json(&schema)).collect();
    print_json(&JsonValue::Array(rendered))
}

pub fn update(store: &mut RecordStore, args: UpdateArgs) -> civitas_store::Result<()> {
    let attributes = parse_fields(&args.fields)?;
    let record = store.update(&args.entity, RecordId(args.id), attributes)?;
    print_record(store, &record)
}

pub fn delete(store: &mut RecordStore, args: DeleteArgs) -> civitas_store::Result<()> {
    let id = RecordId(args.id);
    if args.force {
        store.force_delete(&args.entity, id)?;
    } else {
        store.delete(&args.entity, id)?;
    }
    print_json(&json!({
        "entity": args.entity,
        "id": args.id,
        "deleted": if args.force { "force" } else { "delete" },
    }))
}

pub fn restore(store: &mut RecordStore, args: RestoreArgs) -> civitas_store::Result<()> {
    let record = store.restore(&args.entity, RecordId(args.id))?;
    print_record(store, &record)
}

fn parse_fields(raw: &str) -> civitas_store::Result<Attributes> {
    let json: JsonValue = serde_json::from_str(raw).map_err(RecordError::from)?;
    Ok(attributes_from_json(json)?)
}

fn print_record(store: &RecordStore, record: &Record) -> civitas_store::Result<()> {
    let schema = store.registry().get(&record.entity)?;
    print_json(&record.to_json(schema))
}

fn not_found(entity: &str, id: RecordId) -> ExError {
    RecordError::RecordNotFound {
        entity: entity.to_string(),
        id: id.get(),
    }
    .into()
}
