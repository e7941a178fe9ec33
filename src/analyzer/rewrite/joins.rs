//! Join-shape rewrites

use super::{RewriteContext, RewriteRule, render_column};
use crate::analyzer::suggestion::{Impact, Suggestion};
use crate::model::JoinKind;
use crate::utils::quote_ident;

/// Comma-separated FROM lists hide the join condition in WHERE.
pub struct ImplicitJoin;

impl RewriteRule for ImplicitJoin {
    fn title(&self) -> &'static str {
        "Use explicit JOIN syntax"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        let edge = ctx
            .model
            .joins
            .iter()
            .find(|j| j.kind == JoinKind::ImplicitComma)?;

        let alt_sql = match edge.on_columns.as_slice() {
            [a, b, ..] => Some(format!(
                "JOIN {} ON {} = {}",
                quote_ident(
                    ctx.model
                        .relation_name(&edge.right)
                        .unwrap_or(edge.right.as_str())
                ),
                render_column(a),
                render_column(b)
            )),
            _ => None,
        };

        Some(Suggestion::rewrite(
            self.title(),
            "comma joins couple the join condition to the WHERE clause and make accidental cartesian products easy; spell the JOIN out",
            Impact::Low,
            0.700,
            alt_sql,
        ))
    }
}
