//! Set-operation rewrites

use super::{RewriteContext, RewriteRule};
use crate::analyzer::suggestion::{Impact, Suggestion};

/// UNION de-duplicates; when each side projects a unique key the
/// de-duplication can never remove anything and UNION ALL skips the sort.
pub struct UnionToUnionAll;

impl RewriteRule for UnionToUnionAll {
    fn title(&self) -> &'static str {
        "Replace UNION with UNION ALL"
    }

    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion> {
        let set_op = ctx.model.set_op.as_ref()?;
        if set_op.all || set_op.sides.len() < 2 {
            return None;
        }

        // The model stores literal shapes, never values, so disjointness of
        // the branches cannot be proven; a unique key projected on every
        // side is the one case where duplicates are impossible.
        let every_side_keyed = set_op.sides.iter().all(|side| {
            let Some(relation) = &side.relation else {
                return false;
            };
            side.projected_columns
                .iter()
                .any(|c| ctx.schema.has_unique_index_on(relation, c))
        });
        if !every_side_keyed {
            return None;
        }

        Some(Suggestion::rewrite(
            self.title(),
            "every branch projects a unique key, so duplicates are impossible and the UNION de-duplication sort is pure overhead",
            Impact::Low,
            0.500,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SortDirection, parse};
    use crate::schema::{IndexDef, SchemaSnapshot, TableInfo};

    fn schema_with_pkeys() -> SchemaSnapshot {
        let mut s = SchemaSnapshot::empty();
        for table in ["a", "b"] {
            s.tables.insert(
                table.into(),
                TableInfo {
                    columns: vec![],
                    indexes: vec![IndexDef {
                        name: format!("{}_pkey", table),
                        columns: vec!["id".into()],
                        directions: vec![SortDirection::Asc],
                        unique: true,
                    }],
                },
            );
        }
        s
    }

    fn eval(sql: &str, schema: &SchemaSnapshot) -> Option<Suggestion> {
        let model = parse(sql).unwrap();
        UnionToUnionAll.evaluate(&RewriteContext {
            model: &model,
            schema,
        })
    }

    #[test]
    fn test_union_over_primary_keys() {
        let s = eval("SELECT id FROM a UNION SELECT id FROM b", &schema_with_pkeys()).unwrap();
        assert_eq!(s.impact, Impact::Low);
        assert_eq!(s.confidence, 0.5);
    }

    #[test]
    fn test_union_all_is_quiet() {
        assert!(eval("SELECT id FROM a UNION ALL SELECT id FROM b", &schema_with_pkeys()).is_none());
    }

    #[test]
    fn test_union_without_keys_is_quiet() {
        assert!(eval("SELECT id FROM a UNION SELECT id FROM b", &SchemaSnapshot::empty()).is_none());
    }

    #[test]
    fn test_plain_select_is_quiet() {
        assert!(eval("SELECT id FROM a", &schema_with_pkeys()).is_none());
    }
}
