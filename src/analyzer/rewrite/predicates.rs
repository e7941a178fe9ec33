//! Predicate-shape rewrites

use super::{RewriteContext, RewriteRule, render_column};
use crate::analyzer::suggestion::{Impact, Suggestion};

/// Three or more OR-ed equalities on one column: use IN.
pub struct OrChainToIn;

impl RewriteRule for OrChainToIn {
    fn title(&self) -> &'static str {
        "Collapse OR chain into IN"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        for chain in &ctx.model.or_chains {
            if chain.arm_count >= 3 {
                return Some(Suggestion::rewrite(
                    self.title(),
                    format!(
                        "{} OR-ed equality branches on {} plan as separate filters; IN collapses them into one array condition",
                        chain.arm_count, chain.column.column
                    ),
                    Impact::Low,
                    0.700,
                    Some(format!("{} IN (<values>)", render_column(&chain.column))),
                ));
            }
        }
        None
    }
}

/// LIKE with a leading wildcard on an indexed column cannot use the index.
pub struct LeadingWildcardLike;

impl RewriteRule for LeadingWildcardLike {
    fn title(&self) -> &'static str {
        "Avoid leading-wildcard LIKE"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        for like in &ctx.model.like_predicates {
            if !like.leading_wildcard {
                continue;
            }
            let Some(relation) = ctx.relation_name_of(&like.column) else {
                continue;
            };
            if ctx
                .schema
                .is_leading_index_column(relation, &like.column.column)
            {
                return Some(Suggestion::rewrite(
                    self.title(),
                    format!(
                        "LIKE '%...' on {} cannot use the existing index; consider a trigram index or a reversed-prefix search",
                        like.column.column
                    ),
                    Impact::Low,
                    0.500,
                    None,
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SortDirection, parse};
    use crate::schema::{IndexDef, SchemaSnapshot, TableInfo};

    fn schema_with_name_index() -> SchemaSnapshot {
        let mut s = SchemaSnapshot::empty();
        s.tables.insert(
            "users".into(),
            TableInfo {
                columns: vec![],
                indexes: vec![IndexDef {
                    name: "ix_users_name".into(),
                    columns: vec!["name".into()],
                    directions: vec![SortDirection::Asc],
                    unique: false,
                }],
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
    fn test_or_chain_of_three() {
        let s = eval(
            &OrChainToIn,
            "SELECT * FROM t WHERE status = 1 OR status = 2 OR status = 3",
            &SchemaSnapshot::empty(),
        )
        .unwrap();
        assert_eq!(s.alt_sql.as_deref(), Some("t.status IN (<values>)"));
    }

    #[test]
    fn test_or_chain_of_two_is_quiet() {
        assert!(eval(
            &OrChainToIn,
            "SELECT * FROM t WHERE status = 1 OR status = 2",
            &SchemaSnapshot::empty(),
        )
        .is_none());
    }

    #[test]
    fn test_leading_wildcard_on_indexed_column() {
        let s = eval(
            &LeadingWildcardLike,
            "SELECT * FROM users WHERE name LIKE '%smith'",
            &schema_with_name_index(),
        )
        .unwrap();
        assert_eq!(s.confidence, 0.5);
    }

    #[test]
    fn test_leading_wildcard_without_index_is_quiet() {
        assert!(eval(
            &LeadingWildcardLike,
            "SELECT * FROM users WHERE name LIKE '%smith'",
            &SchemaSnapshot::empty(),
        )
        .is_none());
    }

    #[test]
    fn test_trailing_wildcard_is_quiet() {
        assert!(eval(
            &LeadingWildcardLike,
            "SELECT * FROM users WHERE name LIKE 'smith%'",
            &schema_with_name_index(),
        )
        .is_none());
    }
}
