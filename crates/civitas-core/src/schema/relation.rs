use crate::query::OrderBy;
use crate::schema::field::FieldDef;

/// How two entities are associated
#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
    /// This entity holds `foreign_key` pointing at the target's id
    BelongsTo { foreign_key: String },
    /// The target holds `foreign_key` pointing at this entity; at most one row
    HasOne { foreign_key: String },
    /// The target holds `foreign_key` pointing at this entity
    HasMany {
        foreign_key: String,
        order: Option<OrderBy>,
    },
    /// Association through a join table, optionally carrying pivot columns
    BelongsToMany {
        pivot_table: String,
        /// Join-table column referencing this entity
        foreign_pivot_key: String,
        /// Join-table column referencing the target
        related_pivot_key: String,
        pivot_fields: Vec<FieldDef>,
    },
}

/// A named, declared relationship
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub target: String,
    pub kind: RelationKind,
}

impl Relation {
    pub fn is_pivot(&self) -> bool {
        matches!(self.kind, RelationKind::BelongsToMany { .. })
    }

    pub fn pivot_field(&self, name: &str) -> Option<&FieldDef> {
        match &self.kind {
            RelationKind::BelongsToMany { pivot_fields, .. } => {
                pivot_fields.iter().find(|f| f.name == name)
            }
            _ => None,
        }
    }
}

/// Join table derived from a belongs-to-many declaration
///
/// Both sides of a many-to-many usually declare the relation; they share
/// one table, which is created once.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub name: String,
    /// `(column, referenced entity)` pairs, in a stable order
    pub keys: [(String, String); 2],
    pub fields: Vec<FieldDef>,
}
