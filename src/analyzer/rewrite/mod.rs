//! Rewrite advisor
//!
//! Each rule is a pure predicate over the query model (plus the schema
//! snapshot) producing at most one suggestion from a fixed title/rationale
//! template. Rule identity is the title; the catalog order below is also the
//! tie-breaking output order.

pub mod joins;
pub mod ordering;
pub mod predicates;
pub mod projection;
pub mod setops;
pub mod subquery;

use crate::analyzer::suggestion::Suggestion;
use crate::model::{ColumnRef, QueryModel};
use crate::schema::SchemaSnapshot;
use crate::utils::quote_ident;
use std::collections::HashSet;

/// Context handed to every rule.
pub struct RewriteContext<'a> {
    pub model: &'a QueryModel,
    pub schema: &'a SchemaSnapshot,
}

impl RewriteContext<'_> {
    /// Underlying relation name for a column reference, when resolvable.
    pub fn relation_name_of(&self, column: &ColumnRef) -> Option<&str> {
        let key = column.relation.as_deref()?;
        self.model.relation_name(key)
    }
}

/// One rewrite rule. Title is identity; duplicates are suppressed.
pub trait RewriteRule: Send + Sync {
    fn title(&self) -> &'static str;
    fn evaluate(&self, ctx: &RewriteContext) -> Option<Suggestion>;
}

/// The fixed rule catalog, in output tie-breaking order.
pub fn get_all_rules() -> Vec<Box<dyn RewriteRule>> {
    vec![
        Box::new(projection::ExplicitProjection),
        Box::new(subquery::InToExists),
        Box::new(subquery::DecorrelateExists),
        Box::new(ordering::TopNAlignment),
        Box::new(subquery::PredicatePushdown),
        Box::new(setops::UnionToUnionAll),
        Box::new(predicates::OrChainToIn),
        Box::new(subquery::NotInToNotExists),
        Box::new(predicates::LeadingWildcardLike),
        Box::new(projection::DistinctWithGroupBy),
        Box::new(joins::ImplicitJoin),
        Box::new(projection::CountColumnToCountStar),
    ]
}

/// Evaluate the catalog against one model.
pub fn advise(model: &QueryModel, schema: &SchemaSnapshot) -> Vec<Suggestion> {
    if !model.is_select() {
        return Vec::new();
    }
    let ctx = RewriteContext { model, schema };
    let mut seen = HashSet::new();
    let mut suggestions = Vec::new();
    for rule in get_all_rules() {
        if let Some(suggestion) = rule.evaluate(&ctx)
            && seen.insert(suggestion.title.clone())
        {
            suggestions.push(suggestion);
        }
    }
    suggestions
}

/// Render a column reference with canonical identifier quoting.
pub(crate) fn render_column(column: &ColumnRef) -> String {
    match &column.relation {
        Some(rel) => format!("{}.{}", quote_ident(rel), quote_ident(&column.column)),
        None => quote_ident(&column.column),
    }
}
