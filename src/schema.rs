//! Schema snapshot
//!
//! A read-only view of the catalog fetched once per analysis request and
//! shared by reference across advisors. Maps are ordered so iteration at the
//! output boundary is stable.

use crate::model::SortDirection;
use serde::Serialize;
use std::collections::BTreeMap;

/// Coarse column type classification used for width estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    BigInt,
    Timestamp,
    Boolean,
    Text,
    Numeric,
    Other,
}

impl ColumnKind {
    /// Classify a PostgreSQL type name.
    pub fn from_pg_type(type_name: &str) -> Self {
        let t = type_name.trim().to_lowercase();
        match t.as_str() {
            "integer" | "int" | "int4" | "smallint" | "int2" | "serial" => ColumnKind::Integer,
            "bigint" | "int8" | "bigserial" | "oid" => ColumnKind::BigInt,
            "boolean" | "bool" => ColumnKind::Boolean,
            "numeric" | "decimal" | "money" => ColumnKind::Numeric,
            "text" | "character varying" | "varchar" | "character" | "char" | "bpchar"
            | "citext" | "name" | "uuid" | "json" | "jsonb" => ColumnKind::Text,
            _ if t.starts_with("timestamp") || t == "date" || t.starts_with("time") => {
                ColumnKind::Timestamp
            }
            "real" | "float4" | "float8" => ColumnKind::Numeric,
            _ if t.starts_with("double") => ColumnKind::Numeric,
            _ => ColumnKind::Other,
        }
    }

    /// Default average width in bytes when `pg_stats` has no sample.
    pub fn default_width(self) -> i64 {
        match self {
            ColumnKind::Integer => 4,
            ColumnKind::BigInt => 8,
            ColumnKind::Timestamp => 8,
            ColumnKind::Boolean => 1,
            ColumnKind::Text => 16,
            ColumnKind::Numeric => 16,
            ColumnKind::Other => 8,
        }
    }
}

/// One column of a relation.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    /// Average stored width from `pg_stats`, when sampled.
    pub avg_width_bytes: Option<i64>,
}

impl ColumnDef {
    /// Effective width: the sampled average, or the kind default.
    pub fn width(&self) -> i64 {
        match self.avg_width_bytes {
            Some(w) if w >= 0 => w,
            _ => self.kind.default_width(),
        }
    }
}

/// One existing index on a relation, columns in declared order.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    /// Per-column sort direction, aligned with `columns`.
    pub directions: Vec<SortDirection>,
    pub unique: bool,
}

/// One relation with its columns and indexes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableInfo {
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
}

/// The snapshot handed to advisors. Empty snapshots are valid: the index
/// advisor then produces nothing and everything else continues.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableInfo>,
    pub row_estimates: BTreeMap<String, i64>,
}

impl SchemaSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    /// Approximate live-tuple count; unknown relations report 0.
    pub fn row_estimate(&self, name: &str) -> i64 {
        self.row_estimates.get(name).copied().unwrap_or(0).max(0)
    }

    pub fn column(&self, relation: &str, column: &str) -> Option<&ColumnDef> {
        self.table(relation)?
            .columns
            .iter()
            .find(|c| c.name == column)
    }

    /// True when the column is declared NOT NULL.
    pub fn is_not_null(&self, relation: &str, column: &str) -> bool {
        self.column(relation, column).is_some_and(|c| !c.nullable)
    }

    /// True when the column is covered by a single-column unique index.
    pub fn has_unique_index_on(&self, relation: &str, column: &str) -> bool {
        self.table(relation).is_some_and(|t| {
            t.indexes
                .iter()
                .any(|ix| ix.unique && ix.columns.len() == 1 && ix.columns[0] == column)
        })
    }

    /// True when the column leads any existing index on the relation.
    pub fn is_leading_index_column(&self, relation: &str, column: &str) -> bool {
        self.table(relation).is_some_and(|t| {
            t.indexes
                .iter()
                .any(|ix| ix.columns.first().map(String::as_str) == Some(column))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(columns: Vec<ColumnDef>, indexes: Vec<IndexDef>) -> SchemaSnapshot {
        let mut s = SchemaSnapshot::empty();
        s.tables
            .insert("orders".into(), TableInfo { columns, indexes });
        s.row_estimates.insert("orders".into(), 2_500_000);
        s
    }

    fn col(name: &str, kind: ColumnKind, nullable: bool) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            kind,
            nullable,
            avg_width_bytes: None,
        }
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(ColumnKind::from_pg_type("integer"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_pg_type("bigint"), ColumnKind::BigInt);
        assert_eq!(
            ColumnKind::from_pg_type("timestamp without time zone"),
            ColumnKind::Timestamp
        );
        assert_eq!(ColumnKind::from_pg_type("boolean"), ColumnKind::Boolean);
        assert_eq!(
            ColumnKind::from_pg_type("character varying"),
            ColumnKind::Text
        );
        assert_eq!(ColumnKind::from_pg_type("numeric"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_pg_type("bytea"), ColumnKind::Other);
    }

    #[test]
    fn test_default_widths() {
        assert_eq!(ColumnKind::Integer.default_width(), 4);
        assert_eq!(ColumnKind::BigInt.default_width(), 8);
        assert_eq!(ColumnKind::Timestamp.default_width(), 8);
        assert_eq!(ColumnKind::Boolean.default_width(), 1);
        assert_eq!(ColumnKind::Text.default_width(), 16);
        assert_eq!(ColumnKind::Numeric.default_width(), 16);
        assert_eq!(ColumnKind::Other.default_width(), 8);
    }

    #[test]
    fn test_width_prefers_sampled_value() {
        let mut c = col("total_cents", ColumnKind::Integer, true);
        assert_eq!(c.width(), 4);
        c.avg_width_bytes = Some(5);
        assert_eq!(c.width(), 5);
        c.avg_width_bytes = Some(-1);
        assert_eq!(c.width(), 4);
    }

    #[test]
    fn test_row_estimate_defaults_to_zero() {
        let s = SchemaSnapshot::empty();
        assert_eq!(s.row_estimate("missing"), 0);
    }

    #[test]
    fn test_not_null_lookup() {
        let s = snapshot_with(
            vec![
                col("id", ColumnKind::BigInt, false),
                col("note", ColumnKind::Text, true),
            ],
            vec![],
        );
        assert!(s.is_not_null("orders", "id"));
        assert!(!s.is_not_null("orders", "note"));
        assert!(!s.is_not_null("orders", "missing"));
    }

    #[test]
    fn test_index_lookups() {
        let s = snapshot_with(
            vec![col("id", ColumnKind::BigInt, false)],
            vec![IndexDef {
                name: "orders_pkey".into(),
                columns: vec!["id".into()],
                directions: vec![SortDirection::Asc],
                unique: true,
            }],
        );
        assert!(s.has_unique_index_on("orders", "id"));
        assert!(s.is_leading_index_column("orders", "id"));
        assert!(!s.has_unique_index_on("orders", "user_id"));
    }
}
