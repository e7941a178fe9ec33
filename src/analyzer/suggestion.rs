//! Suggestion model
//!
//! Suggestions are values; nothing mutates them after emission. All decimal
//! fields are rounded to 3 fractional digits at construction time.

use crate::model::SortDirection;
use crate::utils::{quote_ident, round3};
use serde::Serialize;

/// What a suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Rewrite,
    Index,
}

/// Expected impact bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn rank(self) -> u8 {
        match self {
            Impact::High => 3,
            Impact::Medium => 2,
            Impact::Low => 1,
        }
    }
}

/// One piece of optimization advice.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub title: String,
    pub rationale: String,
    pub impact: Impact,
    pub confidence: f64,
    /// Candidate DDL for index suggestions; empty for rewrites. The engine
    /// never issues these statements itself.
    pub statements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_sql: Option<String>,
    /// Original SQL, attached to rewrites when a diff payload was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_reduction_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_index_width_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_cost_before: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_cost_after: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_cost_delta: Option<f64>,
}

impl Suggestion {
    /// Build a rewrite suggestion with a fixed title/rationale template.
    pub fn rewrite(
        title: &str,
        rationale: impl Into<String>,
        impact: Impact,
        confidence: f64,
        alt_sql: Option<String>,
    ) -> Self {
        Self {
            kind: SuggestionKind::Rewrite,
            title: title.to_string(),
            rationale: rationale.into(),
            impact,
            confidence: round3(confidence),
            statements: Vec::new(),
            alt_sql,
            source_sql: None,
            score: None,
            est_reduction_pct: None,
            est_index_width_bytes: None,
            est_cost_before: None,
            est_cost_after: None,
            est_cost_delta: None,
        }
    }

    /// Attach what-if costs. The delta is derived from the rounded values so
    /// that `delta = before - after` holds exactly on the boundary.
    pub fn with_costs(mut self, cost_before: f64, cost_after: f64) -> Self {
        let before = round3(cost_before);
        let after = round3(cost_after);
        self.est_cost_before = Some(before);
        self.est_cost_after = Some(after);
        self.est_cost_delta = Some(round3(before - after));
        self
    }
}

/// Bit mask naming which clauses contributed columns to a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMask(pub u8);

impl SourceMask {
    pub const EQUALITY: SourceMask = SourceMask(1);
    pub const RANGE: SourceMask = SourceMask(2);
    pub const ORDER: SourceMask = SourceMask(4);
    pub const JOIN: SourceMask = SourceMask(8);

    pub fn union(self, other: SourceMask) -> SourceMask {
        SourceMask(self.0 | other.0)
    }

    pub fn contains(self, other: SourceMask) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A candidate B-tree index, identified by relation, ordered column list and
/// direction vector. An empty direction vector means all-ascending (the
/// default, elided).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCandidate {
    pub relation: String,
    pub columns: Vec<String>,
    pub directions: Vec<SortDirection>,
    pub sources: SourceMask,
}

impl IndexCandidate {
    /// Stable identity string used for cross-query merging.
    pub fn identity(&self) -> String {
        let dirs: Vec<&str> = self
            .directions
            .iter()
            .map(|d| match d {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            })
            .collect();
        format!(
            "{}({})[{}]",
            self.relation,
            self.columns.join(","),
            dirs.join(",")
        )
    }

    /// Generated index name: `idx_<relation>_<col>_<col>`, lowercased.
    pub fn index_name(&self) -> String {
        format!("idx_{}_{}", self.relation, self.columns.join("_")).to_lowercase()
    }

    /// Column list for DDL, annotating only non-default directions.
    fn column_list(&self) -> String {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let quoted = quote_ident(c);
                match self.directions.get(i) {
                    Some(SortDirection::Desc) => format!("{} DESC", quoted),
                    _ => quoted,
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The informational DDL statement. Always CONCURRENTLY; never issued by
    /// the engine.
    pub fn ddl(&self) -> String {
        format!(
            "CREATE INDEX CONCURRENTLY {} ON {} ({})",
            quote_ident(&self.index_name()),
            quote_ident(&self.relation),
            self.column_list()
        )
    }

    /// Canonical suggestion title; doubles as the tie-breaking sort key.
    pub fn title(&self) -> String {
        format!("Add index on {} ({})", self.relation, self.columns.join(", "))
    }
}

/// An index suggestion paired with the candidate that produced it, so the
/// what-if evaluator and the workload aggregator can address the candidate
/// identity without re-parsing DDL.
#[derive(Debug, Clone)]
pub struct IndexAdvice {
    pub candidate: IndexCandidate,
    pub suggestion: Suggestion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_rank_order() {
        assert!(Impact::High.rank() > Impact::Medium.rank());
        assert!(Impact::Medium.rank() > Impact::Low.rank());
        assert!(Impact::High > Impact::Low);
    }

    #[test]
    fn test_rewrite_constructor_rounds_confidence() {
        let s = Suggestion::rewrite("Test", "because", Impact::Low, 0.70004, None);
        assert_eq!(s.confidence, 0.7);
        assert!(s.statements.is_empty());
        assert_eq!(s.kind, SuggestionKind::Rewrite);
    }

    #[test]
    fn test_with_costs_delta_invariant() {
        let s = Suggestion::rewrite("Test", "b", Impact::Low, 0.5, None)
            .with_costs(1910.6804, 104.5896);
        assert_eq!(s.est_cost_before, Some(1910.68));
        assert_eq!(s.est_cost_after, Some(104.59));
        let delta = s.est_cost_delta.unwrap();
        assert_eq!(
            delta,
            crate::utils::round3(s.est_cost_before.unwrap() - s.est_cost_after.unwrap())
        );
    }

    #[test]
    fn test_source_mask() {
        let m = SourceMask::EQUALITY.union(SourceMask::JOIN);
        assert!(m.contains(SourceMask::EQUALITY));
        assert!(m.contains(SourceMask::JOIN));
        assert!(!m.contains(SourceMask::RANGE));
    }

    fn candidate(directions: Vec<SortDirection>) -> IndexCandidate {
        IndexCandidate {
            relation: "orders".into(),
            columns: vec!["user_id".into(), "created_at".into()],
            directions,
            sources: SourceMask::EQUALITY,
        }
    }

    #[test]
    fn test_ddl_default_directions_elided() {
        let c = candidate(vec![]);
        assert_eq!(c.index_name(), "idx_orders_user_id_created_at");
        assert_eq!(
            c.ddl(),
            "CREATE INDEX CONCURRENTLY idx_orders_user_id_created_at ON orders (user_id, created_at)"
        );
    }

    #[test]
    fn test_ddl_with_desc_direction() {
        let c = candidate(vec![SortDirection::Asc, SortDirection::Desc]);
        assert_eq!(
            c.ddl(),
            "CREATE INDEX CONCURRENTLY idx_orders_user_id_created_at ON orders (user_id, created_at DESC)"
        );
    }

    #[test]
    fn test_identity_distinguishes_directions() {
        let a = candidate(vec![]);
        let b = candidate(vec![SortDirection::Asc, SortDirection::Desc]);
        assert_ne!(a.identity(), b.identity());
    }
}
