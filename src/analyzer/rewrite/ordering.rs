//! Ordering-shape rewrites

use super::{RewriteContext, RewriteRule};
use crate::analyzer::suggestion::{Impact, Suggestion};
use crate::model::SortDirection;

/// ORDER BY + LIMIT with no index covering (equalities..., order keys): the
/// planner sorts the whole filtered set to return a handful of rows.
pub struct TopNAlignment;

impl RewriteRule for TopNAlignment {
    fn title(&self) -> &'static str {
        "Align Top-N with an index"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        let model = ctx.model;
        if model.order_keys.is_empty() || model.limit.is_none() {
            return None;
        }

        // All order keys must sit on one resolvable relation.
        let first_key = model.order_keys[0].column.relation.as_deref()?;
        if !model
            .order_keys
            .iter()
            .all(|k| k.column.relation.as_deref() == Some(first_key))
        {
            return None;
        }
        let relation = model.relation_name(first_key)?;

        // Desired prefix: equality columns on the relation, then order keys.
        let mut desired: Vec<(&str, Option<SortDirection>)> = Vec::new();
        for p in &model.equality_predicates {
            if p.column.relation.as_deref() == Some(first_key)
                && !desired.iter().any(|(c, _)| *c == p.column.column)
            {
                desired.push((p.column.column.as_str(), None));
            }
        }
        for k in &model.order_keys {
            if !desired.iter().any(|(c, _)| *c == k.column.column) {
                desired.push((k.column.column.as_str(), Some(k.direction)));
            }
        }

        let table = ctx.schema.table(relation);
        let covered = table.is_some_and(|t| {
            t.indexes.iter().any(|ix| {
                ix.columns.len() >= desired.len()
                    && desired.iter().enumerate().all(|(i, (column, direction))| {
                        ix.columns[i] == *column
                            && match direction {
                                // Equality positions work in either direction.
                                None => true,
                                Some(d) => {
                                    ix.directions.get(i).copied().unwrap_or(SortDirection::Asc)
                                        == *d
                                }
                            }
                    })
            })
        });
        if covered {
            return None;
        }

        Some(Suggestion::rewrite(
            self.title(),
            format!(
                "ORDER BY with LIMIT {} sorts every qualifying row of {}; an index matching the filter and sort order returns the top rows directly",
                model.limit.unwrap_or_default(),
                relation
            ),
            Impact::Medium,
            0.700,
            None,
        ))
    }
}
