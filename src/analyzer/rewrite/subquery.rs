//! Subquery-shape rewrites

use super::{RewriteContext, RewriteRule, render_column};
use crate::analyzer::suggestion::{Impact, Suggestion};
use crate::model::SubqueryKind;
use crate::utils::quote_ident;

/// Uncorrelated `IN (SELECT ...)` usually plans better as EXISTS.
pub struct InToExists;

impl RewriteRule for InToExists {
    fn title(&self) -> &'static str {
        "Rewrite IN subquery as EXISTS"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        for sq in &ctx.model.subqueries {
            if sq.kind != SubqueryKind::In || !sq.correlated_eq.is_empty() {
                continue;
            }
            let (Some(outer), Some(inner_relation)) = (&sq.outer_column, &sq.inner_relation)
            else {
                continue;
            };
            let alt_sql = sq.inner_column.as_ref().map(|inner_column| {
                format!(
                    "EXISTS (SELECT 1 FROM {} WHERE {}.{} = {})",
                    quote_ident(inner_relation),
                    quote_ident(inner_relation),
                    quote_ident(inner_column),
                    render_column(outer)
                )
            });
            return Some(Suggestion::rewrite(
                self.title(),
                "EXISTS stops at the first matching row while IN materializes the whole subquery result",
                Impact::Medium,
                0.700,
                alt_sql,
            ));
        }
        None
    }
}

/// Correlated EXISTS with an equality correlation can become a semi-join.
pub struct DecorrelateExists;

impl RewriteRule for DecorrelateExists {
    fn title(&self) -> &'static str {
        "Decorrelate EXISTS into a join"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        for sq in &ctx.model.subqueries {
            if sq.kind != SubqueryKind::Exists || sq.correlated_eq.is_empty() {
                continue;
            }
            let Some(inner_relation) = &sq.inner_relation else {
                continue;
            };
            let (outer, inner) = &sq.correlated_eq[0];
            let alt_sql = format!(
                "JOIN {} ON {} = {}",
                quote_ident(inner_relation),
                render_column(inner),
                render_column(outer)
            );
            return Some(Suggestion::rewrite(
                self.title(),
                "a correlated EXISTS re-plans the subquery per outer row; an equality correlation lets the planner use one semi-join instead",
                Impact::Medium,
                0.600,
                Some(alt_sql),
            ));
        }
        None
    }
}

/// Outer WHERE on grouping keys of an aggregating subquery can be pushed
/// below the aggregation.
pub struct PredicatePushdown;

impl RewriteRule for PredicatePushdown {
    fn title(&self) -> &'static str {
        "Push outer predicates into the subquery"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        let model = ctx.model;
        for sq in &model.subqueries {
            if sq.kind != SubqueryKind::FromDerived || !sq.has_aggregation {
                continue;
            }
            let Some(alias) = &sq.alias else {
                continue;
            };

            let on_alias = |rel: &Option<String>| rel.as_deref() == Some(alias.as_str());
            let mut touched = false;
            let mut all_on_group_keys = true;
            for p in &model.equality_predicates {
                if on_alias(&p.column.relation) {
                    touched = true;
                    all_on_group_keys &= sq.inner_group_keys.contains(&p.column.column);
                }
            }
            for p in &model.range_predicates {
                if on_alias(&p.column.relation) {
                    touched = true;
                    all_on_group_keys &= sq.inner_group_keys.contains(&p.column.column);
                }
            }
            if touched && all_on_group_keys {
                return Some(Suggestion::rewrite(
                    self.title(),
                    "the outer filter only touches grouping keys, so it can run before the aggregation and shrink the grouped input",
                    Impact::Medium,
                    0.600,
                    None,
                ));
            }
        }
        None
    }
}

/// NOT IN over a nullable column silently returns nothing when a NULL
/// appears; NOT EXISTS has the intended semantics and plans as an anti-join.
pub struct NotInToNotExists;

impl RewriteRule for NotInToNotExists {
    fn title(&self) -> &'static str {
        "Rewrite NOT IN as NOT EXISTS"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        for sq in &ctx.model.subqueries {
            if sq.kind != SubqueryKind::NotIn {
                continue;
            }
            let (Some(inner_relation), Some(inner_column)) =
                (&sq.inner_relation, &sq.inner_column)
            else {
                continue;
            };
            if !ctx
                .schema
                .column(inner_relation, inner_column)
                .is_some_and(|c| c.nullable)
            {
                continue;
            }
            let alt_sql = sq.outer_column.as_ref().map(|outer| {
                format!(
                    "NOT EXISTS (SELECT 1 FROM {} WHERE {}.{} = {})",
                    quote_ident(inner_relation),
                    quote_ident(inner_relation),
                    quote_ident(inner_column),
                    render_column(outer)
                )
            });
            return Some(Suggestion::rewrite(
                self.title(),
                format!(
                    "{}.{} is nullable; one NULL in the subquery makes NOT IN return no rows at all",
                    inner_relation, inner_column
                ),
                Impact::Medium,
                0.700,
                alt_sql,
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse;
    use crate::schema::{ColumnDef, ColumnKind, SchemaSnapshot, TableInfo};

    fn schema_orders_nullable_user() -> SchemaSnapshot {
        let mut s = SchemaSnapshot::empty();
        s.tables.insert(
            "orders".into(),
            TableInfo {
                columns: vec![ColumnDef {
                    name: "user_id".into(),
                    kind: ColumnKind::BigInt,
                    nullable: true,
                    avg_width_bytes: None,
                }],
                indexes: vec![],
            },
        );
        s
    }

    fn eval(rule: &dyn RewriteRule, sql: &str, schema: &SchemaSnapshot) -> Option<Suggestion> {
        let model = parse(sql).unwrap();
        rule.evaluate(&RewriteContext {
            model: &model,
            schema,
        })
    }

    #[test]
    fn test_in_to_exists() {
        let s = eval(
            &InToExists,
            "SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)",
            &SchemaSnapshot::empty(),
        )
        .unwrap();
        assert_eq!(s.impact, Impact::Medium);
        assert_eq!(
            s.alt_sql.as_deref(),
            Some("EXISTS (SELECT 1 FROM orders WHERE orders.user_id = users.id)")
        );
    }

    #[test]
    fn test_in_to_exists_skips_correlated() {
        assert!(eval(
            &InToExists,
            "SELECT * FROM users u WHERE u.id IN \
             (SELECT o.user_id FROM orders o WHERE o.region = u.region)",
            &SchemaSnapshot::empty(),
        )
        .is_none());
    }

    #[test]
    fn test_decorrelate_exists() {
        let s = eval(
            &DecorrelateExists,
            "SELECT * FROM users u WHERE EXISTS \
             (SELECT 1 FROM orders o WHERE o.user_id = u.id)",
            &SchemaSnapshot::empty(),
        )
        .unwrap();
        assert_eq!(s.confidence, 0.6);
        assert_eq!(s.alt_sql.as_deref(), Some("JOIN orders ON o.user_id = u.id"));
    }

    #[test]
    fn test_decorrelate_skips_uncorrelated_exists() {
        assert!(eval(
            &DecorrelateExists,
            "SELECT * FROM users WHERE EXISTS (SELECT 1 FROM orders)",
            &SchemaSnapshot::empty(),
        )
        .is_none());
    }

    #[test]
    fn test_predicate_pushdown() {
        let s = eval(
            &PredicatePushdown,
            "SELECT t.user_id, t.n FROM \
             (SELECT user_id, count(*) AS n FROM orders GROUP BY user_id) t \
             WHERE t.user_id = 5",
            &SchemaSnapshot::empty(),
        )
        .unwrap();
        assert_eq!(s.impact, Impact::Medium);
    }

    #[test]
    fn test_predicate_pushdown_requires_group_key_only_filter() {
        assert!(eval(
            &PredicatePushdown,
            "SELECT t.user_id, t.n FROM \
             (SELECT user_id, count(*) AS n FROM orders GROUP BY user_id) t \
             WHERE t.n = 5",
            &SchemaSnapshot::empty(),
        )
        .is_none());
    }

    #[test]
    fn test_not_in_on_nullable_column() {
        let s = eval(
            &NotInToNotExists,
            "SELECT * FROM users u WHERE u.id NOT IN (SELECT user_id FROM orders)",
            &schema_orders_nullable_user(),
        )
        .unwrap();
        assert!(s.rationale.contains("nullable"));
        assert_eq!(
            s.alt_sql.as_deref(),
            Some("NOT EXISTS (SELECT 1 FROM orders WHERE orders.user_id = u.id)")
        );
    }

    #[test]
    fn test_not_in_without_schema_is_quiet() {
        assert!(eval(
            &NotInToNotExists,
            "SELECT * FROM users u WHERE u.id NOT IN (SELECT user_id FROM orders)",
            &SchemaSnapshot::empty(),
        )
        .is_none());
    }
}
