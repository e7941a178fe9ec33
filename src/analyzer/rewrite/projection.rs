//! Projection-shape rewrites

use super::{RewriteContext, RewriteRule};
use crate::analyzer::suggestion::{Impact, Suggestion};
use crate::model::Projection;
use crate::utils::quote_ident;

/// `SELECT *` with no computed projections: name the columns.
pub struct ExplicitProjection;

impl RewriteRule for ExplicitProjection {
    fn title(&self) -> &'static str {
        "Use an explicit projection"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        let model = ctx.model;
        if !model.has_star_projection() || model.has_opaque_projection() {
            return None;
        }

        // With a single known relation the full column list can be filled in
        // from the snapshot; otherwise the advice stays textual.
        let alt_sql = if model.relations.len() == 1 {
            ctx.schema.table(&model.relations[0].name).map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| quote_ident(&c.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "SELECT {} FROM {}",
                    columns,
                    quote_ident(&model.relations[0].name)
                )
            })
        } else {
            None
        };

        Some(Suggestion::rewrite(
            self.title(),
            "SELECT * fetches every column, widens the row and defeats covering indexes; project only the columns the caller reads",
            Impact::Low,
            0.900,
            alt_sql,
        ))
    }
}

/// DISTINCT combined with GROUP BY over the same key set is redundant.
pub struct DistinctWithGroupBy;

impl RewriteRule for DistinctWithGroupBy {
    fn title(&self) -> &'static str {
        "Drop DISTINCT next to GROUP BY"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        let model = ctx.model;
        if !model.distinct || model.group_keys.is_empty() {
            return None;
        }

        // Every projection must be a simple column, and the projected set
        // must equal the grouping key set.
        let mut projected = Vec::new();
        for p in &model.projections {
            match p {
                Projection::Column(c) => projected.push(c),
                _ => return None,
            }
        }
        let same_set = projected.len() == model.group_keys.len()
            && projected
                .iter()
                .all(|c| model.group_keys.contains(*c))
            && model
                .group_keys
                .iter()
                .all(|k| projected.iter().any(|c| *c == k));
        if !same_set {
            return None;
        }

        Some(Suggestion::rewrite(
            self.title(),
            "GROUP BY already returns one row per key; the extra DISTINCT adds a useless de-duplication pass",
            Impact::Low,
            0.700,
            None,
        ))
    }
}

/// COUNT(col) on a NOT NULL column counts exactly like COUNT(*).
pub struct CountColumnToCountStar;

impl RewriteRule for CountColumnToCountStar {
    fn title(&self) -> &'static str {
        "Use COUNT(*) instead of COUNT(column)"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        for call in &ctx.model.aggregates {
            if call.func != "count" || call.star {
                continue;
            }
            let Some(column) = &call.argument else {
                continue;
            };
            let Some(relation) = ctx.relation_name_of(column) else {
                continue;
            };
            if ctx.schema.is_not_null(relation, &column.column) {
                return Some(Suggestion::rewrite(
                    self.title(),
                    format!(
                        "{} is NOT NULL, so COUNT({}) and COUNT(*) are equivalent and COUNT(*) lets the planner pick the cheapest path",
                        column.column, column.column
                    ),
                    Impact::Low,
                    0.700,
                    Some("COUNT(*)".to_string()),
                ));
            }
        }
        None
    }
}
