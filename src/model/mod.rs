//! Normalized query model
//!
//! The model is a value derived once from SQL text and never mutated after
//! creation. Iteration order everywhere follows the original textual order so
//! that advisor output stays deterministic.

pub mod builder;

pub use builder::{SqlParseError, parse};

use serde::Serialize;

/// Statement classification. Only SELECT statements are advised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Select,
    Other,
}

/// Sort direction for order keys and index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Shape of a literal in a predicate; the value itself is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralShape {
    Integer,
    Decimal,
    Text,
    Boolean,
    Null,
    Parameter,
}

/// Kind of a range predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    In,
}

/// Join kind as written in the FROM clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    ImplicitComma,
}

/// A relation in FROM order, with its declared alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub name: String,
    pub alias: Option<String>,
}

impl Relation {
    /// Resolution key: the alias when declared, otherwise the relation name.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A column reference resolved against the declared relations.
///
/// `relation` holds the resolution key of the owning relation. `None` means
/// the reference could not be resolved: in a multi-relation context this is
/// an ambiguous reference, which the linter surfaces and the index advisor
/// skips.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ColumnRef {
    pub relation: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(relation: Option<String>, column: impl Into<String>) -> Self {
        Self {
            relation,
            column: column.into(),
        }
    }

    /// True when the reference did not resolve to any declared relation.
    pub fn is_unresolved(&self) -> bool {
        self.relation.is_none()
    }
}

/// A single projection list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// The `*` sentinel (including qualified wildcards).
    Star,
    Column(ColumnRef),
    /// A computed expression, kept only as rendered text. Opaque projections
    /// suppress the projection-widening rewrite.
    Opaque(String),
}

/// One join edge in FROM order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinEdge {
    pub kind: JoinKind,
    /// Resolution key of the right-hand relation.
    pub right: String,
    /// Columns named by the join condition, dedup-preserving-order.
    /// Empty when the join carries no condition, which the linter flags.
    pub on_columns: Vec<ColumnRef>,
}

/// An equality predicate `col = <literal>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EqualityPredicate {
    pub column: ColumnRef,
    pub literal: LiteralShape,
}

/// A range predicate on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangePredicate {
    pub column: ColumnRef,
    pub kind: RangeKind,
}

/// One ORDER BY key with its direction (default ASC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderKey {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// An aggregate call in the projection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateCall {
    /// Lowercased function name.
    pub func: String,
    /// The single column argument when the call is `f(col)`.
    pub argument: Option<ColumnRef>,
    /// True for `f(*)`.
    pub star: bool,
}

/// A LIKE/ILIKE predicate on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikePredicate {
    pub column: ColumnRef,
    pub leading_wildcard: bool,
}

/// A disjunction of equality comparisons on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrChain {
    pub column: ColumnRef,
    pub arm_count: usize,
}

/// Where a subquery appeared and with what polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubqueryKind {
    In,
    NotIn,
    Exists,
    NotExists,
    FromDerived,
}

/// Shallow record of a subquery: the top-level model keeps only its
/// existence and correlation columns, exposed for the rewrite advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubqueryInfo {
    pub kind: SubqueryKind,
    /// Outer comparison column for IN / NOT IN.
    pub outer_column: Option<ColumnRef>,
    /// First relation named inside the subquery.
    pub inner_relation: Option<String>,
    /// First projected column inside the subquery.
    pub inner_column: Option<String>,
    /// Equality correlation pairs (outer column, inner column).
    pub correlated_eq: Vec<(ColumnRef, ColumnRef)>,
    /// Alias for FROM-derived subqueries.
    pub alias: Option<String>,
    /// True when the subquery aggregates (GROUP BY or aggregate projection).
    pub has_aggregation: bool,
    /// Grouping key column names inside the subquery.
    pub inner_group_keys: Vec<String>,
}

/// One side of a top-level set operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetOpSide {
    /// Key of the side's first relation, when it is a plain SELECT.
    pub relation: Option<String>,
    /// Simple projected column names on that side.
    pub projected_columns: Vec<String>,
}

/// Top-level UNION information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetOpInfo {
    /// True for UNION ALL.
    pub all: bool,
    pub sides: Vec<SetOpSide>,
}

/// The normalized query model. See module docs for ordering guarantees.
#[derive(Debug, Clone, Serialize)]
pub struct QueryModel {
    pub statement_kind: StatementKind,
    /// Label of the parsed statement (SELECT, INSERT, ...), for diagnostics.
    pub statement_label: String,
    pub relations: Vec<Relation>,
    pub projections: Vec<Projection>,
    pub joins: Vec<JoinEdge>,
    pub equality_predicates: Vec<EqualityPredicate>,
    pub range_predicates: Vec<RangePredicate>,
    pub order_keys: Vec<OrderKey>,
    pub group_keys: Vec<ColumnRef>,
    pub limit: Option<u64>,
    pub distinct: bool,
    pub aggregates: Vec<AggregateCall>,
    pub subqueries: Vec<SubqueryInfo>,
    pub set_op: Option<SetOpInfo>,
    pub like_predicates: Vec<LikePredicate>,
    pub or_chains: Vec<OrChain>,
}

impl QueryModel {
    /// An empty model for statements that are not SELECT.
    pub fn other(label: impl Into<String>) -> Self {
        Self {
            statement_kind: StatementKind::Other,
            statement_label: label.into(),
            relations: Vec::new(),
            projections: Vec::new(),
            joins: Vec::new(),
            equality_predicates: Vec::new(),
            range_predicates: Vec::new(),
            order_keys: Vec::new(),
            group_keys: Vec::new(),
            limit: None,
            distinct: false,
            aggregates: Vec::new(),
            subqueries: Vec::new(),
            set_op: None,
            like_predicates: Vec::new(),
            or_chains: Vec::new(),
        }
    }

    pub fn is_select(&self) -> bool {
        self.statement_kind == StatementKind::Select
    }

    /// Map a resolution key back to the underlying relation name.
    pub fn relation_name(&self, key: &str) -> Option<&str> {
        self.relations
            .iter()
            .find(|r| r.key() == key)
            .map(|r| r.name.as_str())
    }

    /// True when the projection list contains the `*` sentinel.
    pub fn has_star_projection(&self) -> bool {
        self.projections.iter().any(|p| matches!(p, Projection::Star))
    }

    /// True when any projection is an opaque computed expression.
    pub fn has_opaque_projection(&self) -> bool {
        self.projections
            .iter()
            .any(|p| matches!(p, Projection::Opaque(_)))
    }

    /// All column references in predicates, keys and join conditions that
    /// failed to resolve, in model order.
    pub fn unresolved_columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        for p in &self.equality_predicates {
            if p.column.is_unresolved() {
                out.push(&p.column);
            }
        }
        for p in &self.range_predicates {
            if p.column.is_unresolved() {
                out.push(&p.column);
            }
        }
        for k in &self.order_keys {
            if k.column.is_unresolved() {
                out.push(&k.column);
            }
        }
        for k in &self.group_keys {
            if k.is_unresolved() {
                out.push(k);
            }
        }
        out
    }

    /// True when the given relation key is touched by any predicate.
    pub fn has_predicate_on(&self, key: &str) -> bool {
        self.equality_predicates
            .iter()
            .any(|p| p.column.relation.as_deref() == Some(key))
            || self
                .range_predicates
                .iter()
                .any(|p| p.column.relation.as_deref() == Some(key))
    }
}
