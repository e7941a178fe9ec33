//! SQL text to query model
//!
//! Walks the sqlparser AST (PostgreSQL dialect) and extracts the normalized
//! model. Identifiers are normalized here once: unquoted identifiers are
//! lowercased, quoted identifiers keep their source casing. The walk fails
//! only when the parser cannot produce any tree; every other statement yields
//! a model, possibly of kind OTHER.

use super::*;
use sqlparser::ast::{
    BinaryOperator, Distinct, Expr, FunctionArg, FunctionArgExpr, GroupByExpr, Ident, Join,
    JoinConstraint, JoinOperator, Query, Select, SelectItem, SetExpr, SetOperator, SetQuantifier,
    Statement, TableFactor, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

/// The parser could not produce any tree for the input.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SqlParseError(pub String);

/// Parse one SQL statement into a query model.
pub fn parse(sql: &str) -> Result<QueryModel, SqlParseError> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| SqlParseError(e.to_string()))?;
    let statement = statements
        .into_iter()
        .next()
        .ok_or_else(|| SqlParseError("empty statement".to_string()))?;

    match statement {
        Statement::Query(query) => Ok(ModelBuilder::default().build(&query)),
        other => Ok(QueryModel::other(statement_label(&other))),
    }
}

/// Short uppercase label for a non-SELECT statement, for diagnostics.
fn statement_label(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}

fn normalize_ident(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

fn object_name_last(name: &sqlparser::ast::ObjectName) -> String {
    name.0
        .last()
        .map(normalize_ident)
        .unwrap_or_default()
}

#[derive(Default)]
struct ModelBuilder;

/// Working state while a single SELECT is being walked.
struct SelectWalk {
    relations: Vec<Relation>,
    projections: Vec<Projection>,
    joins: Vec<JoinEdge>,
    equality_predicates: Vec<EqualityPredicate>,
    range_predicates: Vec<RangePredicate>,
    group_keys: Vec<ColumnRef>,
    distinct: bool,
    aggregates: Vec<AggregateCall>,
    subqueries: Vec<SubqueryInfo>,
    like_predicates: Vec<LikePredicate>,
    or_chains: Vec<OrChain>,
}

impl ModelBuilder {
    fn build(mut self, query: &Query) -> QueryModel {
        let mut model = match self.build_body(&query.body) {
            Some(m) => m,
            None => return QueryModel::other("SELECT"),
        };

        for key in &query.order_by {
            if let Some(column) = resolve_in(&model.relations, &key.expr) {
                let direction = if key.asc == Some(false) {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                };
                model.order_keys.push(OrderKey { column, direction });
            }
        }

        if let Some(Expr::Value(Value::Number(n, _))) = &query.limit
            && let Ok(limit) = n.parse::<u64>()
        {
            model.limit = Some(limit);
        }

        model
    }

    fn build_body(&mut self, body: &SetExpr) -> Option<QueryModel> {
        match body {
            SetExpr::Select(select) => Some(self.build_select(select)),
            SetExpr::Query(inner) => self.build_body(&inner.body),
            SetExpr::SetOperation {
                op: SetOperator::Union,
                set_quantifier,
                left,
                right,
            } => {
                let mut model = self.build_body(left)?;
                let mut sides = Vec::new();
                collect_set_op_sides(left, &mut sides);
                collect_set_op_sides(right, &mut sides);
                model.set_op = Some(SetOpInfo {
                    all: *set_quantifier == SetQuantifier::All,
                    sides,
                });
                Some(model)
            }
            SetExpr::SetOperation { left, .. } => self.build_body(left),
            _ => None,
        }
    }

    fn build_select(&mut self, select: &Select) -> QueryModel {
        let mut walk = SelectWalk {
            relations: Vec::new(),
            projections: Vec::new(),
            joins: Vec::new(),
            equality_predicates: Vec::new(),
            range_predicates: Vec::new(),
            group_keys: Vec::new(),
            distinct: matches!(select.distinct, Some(Distinct::Distinct)),
            aggregates: Vec::new(),
            subqueries: Vec::new(),
            like_predicates: Vec::new(),
            or_chains: Vec::new(),
        };

        walk.register_from(select);
        walk.walk_projections(select);
        if let Some(selection) = &select.selection {
            walk.walk_where(selection);
        }
        if let GroupByExpr::Expressions(exprs) = &select.group_by {
            for expr in exprs {
                if let Some(column) = resolve_in(&walk.relations, expr) {
                    walk.group_keys.push(column);
                }
            }
        }

        QueryModel {
            statement_kind: StatementKind::Select,
            statement_label: "SELECT".to_string(),
            relations: walk.relations,
            projections: walk.projections,
            joins: walk.joins,
            equality_predicates: walk.equality_predicates,
            range_predicates: walk.range_predicates,
            order_keys: Vec::new(),
            group_keys: walk.group_keys,
            limit: None,
            distinct: walk.distinct,
            aggregates: walk.aggregates,
            subqueries: walk.subqueries,
            set_op: None,
            like_predicates: walk.like_predicates,
            or_chains: walk.or_chains,
        }
    }
}

impl SelectWalk {
    /// Register every FROM relation first, then extract join conditions.
    /// Resolution needs the complete relation list, so this runs in two
    /// passes over the FROM clause.
    fn register_from(&mut self, select: &Select) {
        struct PendingJoin<'a> {
            kind: JoinKind,
            right: String,
            constraint: Option<&'a JoinConstraint>,
        }
        let mut pending: Vec<PendingJoin<'_>> = Vec::new();

        for (i, twj) in select.from.iter().enumerate() {
            let base_key = self.register_table_factor(&twj.relation);
            if i > 0 {
                pending.push(PendingJoin {
                    kind: JoinKind::ImplicitComma,
                    right: base_key.clone().unwrap_or_default(),
                    constraint: None,
                });
            }
            for join in &twj.joins {
                let right = self
                    .register_table_factor(&join.relation)
                    .unwrap_or_default();
                let (kind, constraint) = classify_join(join);
                pending.push(PendingJoin {
                    kind,
                    right,
                    constraint,
                });
            }
        }

        for p in pending {
            let mut on_columns = Vec::new();
            match p.constraint {
                Some(JoinConstraint::On(expr)) => {
                    self.collect_on_columns(expr, &mut on_columns);
                }
                Some(JoinConstraint::Using(idents)) => {
                    for ident in idents {
                        push_unique(
                            &mut on_columns,
                            ColumnRef::new(Some(p.right.clone()), normalize_ident(ident)),
                        );
                    }
                }
                _ => {}
            }
            self.joins.push(JoinEdge {
                kind: p.kind,
                right: p.right,
                on_columns,
            });
        }
    }

    /// Register a table factor and return its resolution key.
    fn register_table_factor(&mut self, factor: &TableFactor) -> Option<String> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let relation = Relation {
                    name: object_name_last(name),
                    alias: alias.as_ref().map(|a| normalize_ident(&a.name)),
                };
                let key = relation.key().to_string();
                self.relations.push(relation);
                Some(key)
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let alias_name = alias.as_ref().map(|a| normalize_ident(&a.name));
                let key = alias_name.clone().unwrap_or_else(|| "(subquery)".to_string());
                self.relations.push(Relation {
                    name: key.clone(),
                    alias: None,
                });
                let mut info = summarize_subquery(subquery, &[]);
                info.kind = SubqueryKind::FromDerived;
                info.alias = alias_name;
                self.subqueries.push(info);
                Some(key)
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                let key = self.register_table_factor(&table_with_joins.relation);
                for join in &table_with_joins.joins {
                    let right = self
                        .register_table_factor(&join.relation)
                        .unwrap_or_default();
                    let (kind, constraint) = classify_join(join);
                    let mut on_columns = Vec::new();
                    if let Some(JoinConstraint::On(expr)) = constraint {
                        self.collect_on_columns(expr, &mut on_columns);
                    }
                    self.joins.push(JoinEdge {
                        kind,
                        right,
                        on_columns,
                    });
                }
                key
            }
            _ => None,
        }
    }

    fn walk_projections(&mut self, select: &Select) {
        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => {
                    self.projections.push(Projection::Star);
                }
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    if let Some(column) = resolve_in(&self.relations, expr) {
                        self.projections.push(Projection::Column(column));
                    } else {
                        if let Expr::Function(f) = expr
                            && let Some(call) = self.aggregate_call(f)
                        {
                            self.aggregates.push(call);
                        }
                        self.projections.push(Projection::Opaque(expr.to_string()));
                    }
                }
            }
        }
    }

    fn aggregate_call(&self, function: &sqlparser::ast::Function) -> Option<AggregateCall> {
        let func = object_name_last(&function.name);
        if !matches!(func.as_str(), "count" | "sum" | "avg" | "min" | "max") {
            return None;
        }
        let mut star = false;
        let mut argument = None;
        for arg in &function.args {
            match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => star = true,
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                    argument = resolve_in(&self.relations, e);
                }
                _ => {}
            }
        }
        Some(AggregateCall {
            func,
            argument,
            star,
        })
    }

    /// Decompose the WHERE clause along its top-level conjunction.
    fn walk_where(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.walk_where(left);
                self.walk_where(right);
            }
            Expr::Nested(inner) => self.walk_where(inner),
            Expr::BinaryOp {
                op: BinaryOperator::Or,
                ..
            } => self.handle_or_chain(expr),
            Expr::BinaryOp { left, op, right } => self.handle_comparison(left, op, right),
            Expr::Between {
                expr,
                negated: false,
                ..
            } => {
                if let Some(column) = resolve_in(&self.relations, expr) {
                    push_unique(
                        &mut self.range_predicates,
                        RangePredicate {
                            column,
                            kind: RangeKind::Between,
                        },
                    );
                }
            }
            Expr::InList {
                expr,
                negated: false,
                ..
            } => {
                if let Some(column) = resolve_in(&self.relations, expr) {
                    push_unique(
                        &mut self.range_predicates,
                        RangePredicate {
                            column,
                            kind: RangeKind::In,
                        },
                    );
                }
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let outer_column = resolve_in(&self.relations, expr);
                let mut info = summarize_subquery(subquery, &self.relations);
                info.kind = if *negated {
                    SubqueryKind::NotIn
                } else {
                    SubqueryKind::In
                };
                info.outer_column = outer_column;
                self.subqueries.push(info);
            }
            Expr::Exists { subquery, negated } => {
                let mut info = summarize_subquery(subquery, &self.relations);
                info.kind = if *negated {
                    SubqueryKind::NotExists
                } else {
                    SubqueryKind::Exists
                };
                self.subqueries.push(info);
            }
            Expr::Like {
                negated: false,
                expr,
                pattern,
                ..
            }
            | Expr::ILike {
                negated: false,
                expr,
                pattern,
                ..
            } => {
                if let Some(column) = resolve_in(&self.relations, expr) {
                    let leading_wildcard = matches!(
                        pattern.as_ref(),
                        Expr::Value(Value::SingleQuotedString(s)) if s.starts_with('%')
                    );
                    push_unique(
                        &mut self.like_predicates,
                        LikePredicate {
                            column,
                            leading_wildcard,
                        },
                    );
                }
            }
            _ => {}
        }
    }

    fn handle_comparison(&mut self, left: &Expr, op: &BinaryOperator, right: &Expr) {
        let left_col = resolve_in(&self.relations, left);
        let right_col = resolve_in(&self.relations, right);
        let left_lit = literal_shape(left);
        let right_lit = literal_shape(right);

        match op {
            BinaryOperator::Eq => {
                if let (Some(column), Some(literal)) = (left_col.clone(), right_lit) {
                    push_unique(
                        &mut self.equality_predicates,
                        EqualityPredicate { column, literal },
                    );
                } else if let (Some(literal), Some(column)) = (left_lit, right_col.clone()) {
                    push_unique(
                        &mut self.equality_predicates,
                        EqualityPredicate { column, literal },
                    );
                } else if let (Some(a), Some(b)) = (left_col, right_col)
                    && a.relation != b.relation
                {
                    self.attach_join_predicate(a, b);
                }
            }
            BinaryOperator::Lt | BinaryOperator::LtEq | BinaryOperator::Gt | BinaryOperator::GtEq => {
                // Normalize "literal OP column" to the column's point of view.
                let (column, kind) = if let (Some(column), Some(_)) = (left_col, right_lit) {
                    (Some(column), range_kind(op, false))
                } else if let (Some(_), Some(column)) = (left_lit, right_col) {
                    (Some(column), range_kind(op, true))
                } else {
                    (None, RangeKind::Lt)
                };
                if let Some(column) = column {
                    push_unique(&mut self.range_predicates, RangePredicate { column, kind });
                }
            }
            _ => {}
        }
    }

    /// Attach a column-to-column equality to the join edge between the two
    /// relations. For comma joins this is the only source of join columns.
    fn attach_join_predicate(&mut self, a: ColumnRef, b: ColumnRef) {
        let edge = self.joins.iter_mut().find(|j| {
            Some(j.right.as_str()) == a.relation.as_deref()
                || Some(j.right.as_str()) == b.relation.as_deref()
        });
        if let Some(edge) = edge {
            push_unique(&mut edge.on_columns, a);
            push_unique(&mut edge.on_columns, b);
        }
    }

    /// Flatten an OR tree; a chain of equalities on one column becomes an
    /// `OrChain` plus an IN-shaped range predicate on that column.
    fn handle_or_chain(&mut self, expr: &Expr) {
        let mut arms = Vec::new();
        flatten_or(expr, &mut arms);

        let mut chain_column: Option<ColumnRef> = None;
        let mut uniform = !arms.is_empty();
        for arm in &arms {
            match equality_column(arm, &self.relations) {
                Some(column) => match &chain_column {
                    Some(existing) if *existing == column => {}
                    Some(_) => {
                        uniform = false;
                        break;
                    }
                    None => chain_column = Some(column),
                },
                None => {
                    uniform = false;
                    break;
                }
            }
        }

        if uniform && let Some(column) = chain_column {
            push_unique(
                &mut self.range_predicates,
                RangePredicate {
                    column: column.clone(),
                    kind: RangeKind::In,
                },
            );
            self.or_chains.push(OrChain {
                column,
                arm_count: arms.len(),
            });
        }
    }

    /// Collect column references from a join ON expression (equality
    /// conjuncts only).
    fn collect_on_columns(&self, expr: &Expr, out: &mut Vec<ColumnRef>) {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.collect_on_columns(left, out);
                self.collect_on_columns(right, out);
            }
            Expr::Nested(inner) => self.collect_on_columns(inner, out),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } => {
                if let Some(column) = resolve_in(&self.relations, left) {
                    push_unique(out, column);
                }
                if let Some(column) = resolve_in(&self.relations, right) {
                    push_unique(out, column);
                }
            }
            _ => {}
        }
    }
}

fn classify_join(join: &Join) -> (JoinKind, Option<&JoinConstraint>) {
    match &join.join_operator {
        JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
        JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
        JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
        JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
        JoinOperator::CrossJoin => (JoinKind::Cross, None),
        _ => (JoinKind::Inner, None),
    }
}

fn range_kind(op: &BinaryOperator, flipped: bool) -> RangeKind {
    match (op, flipped) {
        (BinaryOperator::Lt, false) | (BinaryOperator::Gt, true) => RangeKind::Lt,
        (BinaryOperator::LtEq, false) | (BinaryOperator::GtEq, true) => RangeKind::Le,
        (BinaryOperator::Gt, false) | (BinaryOperator::Lt, true) => RangeKind::Gt,
        _ => RangeKind::Ge,
    }
}

fn flatten_or(expr: &Expr, arms: &mut Vec<Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            flatten_or(left, arms);
            flatten_or(right, arms);
        }
        Expr::Nested(inner) => flatten_or(inner, arms),
        other => arms.push(other.clone()),
    }
}

/// Extract the column of an `col = literal` arm, either operand order.
fn equality_column(expr: &Expr, relations: &[Relation]) -> Option<ColumnRef> {
    if let Expr::BinaryOp {
        left,
        op: BinaryOperator::Eq,
        right,
    } = expr
    {
        if literal_shape(right).is_some() {
            return resolve_in(relations, left);
        }
        if literal_shape(left).is_some() {
            return resolve_in(relations, right);
        }
    }
    None
}

/// Resolve an expression to a column reference against a relation list.
fn resolve_in(relations: &[Relation], expr: &Expr) -> Option<ColumnRef> {
    match expr {
        Expr::Identifier(ident) => Some(resolve_ident(relations, None, ident)),
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let column = parts.last()?;
            let qualifier = &parts[parts.len() - 2];
            Some(resolve_ident(relations, Some(qualifier), column))
        }
        Expr::Nested(inner) => resolve_in(relations, inner),
        _ => None,
    }
}

fn resolve_ident(relations: &[Relation], qualifier: Option<&Ident>, column: &Ident) -> ColumnRef {
    let column = normalize_ident(column);
    match qualifier {
        Some(q) => {
            let key = normalize_ident(q);
            if relations.iter().any(|r| r.key() == key) {
                ColumnRef::new(Some(key), column)
            } else {
                ColumnRef::new(None, column)
            }
        }
        None => {
            if relations.len() == 1 {
                ColumnRef::new(Some(relations[0].key().to_string()), column)
            } else {
                ColumnRef::new(None, column)
            }
        }
    }
}

fn literal_shape(expr: &Expr) -> Option<LiteralShape> {
    match expr {
        Expr::Value(value) => match value {
            Value::Number(n, _) => {
                if n.contains('.') || n.contains('e') || n.contains('E') {
                    Some(LiteralShape::Decimal)
                } else {
                    Some(LiteralShape::Integer)
                }
            }
            Value::SingleQuotedString(_)
            | Value::DollarQuotedString(_)
            | Value::EscapedStringLiteral(_) => Some(LiteralShape::Text),
            Value::Boolean(_) => Some(LiteralShape::Boolean),
            Value::Null => Some(LiteralShape::Null),
            Value::Placeholder(_) => Some(LiteralShape::Parameter),
            _ => None,
        },
        Expr::UnaryOp { expr, .. } => literal_shape(expr),
        Expr::Nested(inner) => literal_shape(inner),
        _ => None,
    }
}

/// Shallow summary of a subquery: relations, projected column, grouping and
/// equality correlation against the outer relation list.
fn summarize_subquery(query: &Query, outer: &[Relation]) -> SubqueryInfo {
    let mut info = SubqueryInfo {
        kind: SubqueryKind::In,
        outer_column: None,
        inner_relation: None,
        inner_column: None,
        correlated_eq: Vec::new(),
        alias: None,
        has_aggregation: false,
        inner_group_keys: Vec::new(),
    };

    let Some(select) = leftmost_select(&query.body) else {
        return info;
    };

    let mut inner_relations = Vec::new();
    for twj in &select.from {
        if let TableFactor::Table { name, alias, .. } = &twj.relation {
            inner_relations.push(Relation {
                name: object_name_last(name),
                alias: alias.as_ref().map(|a| normalize_ident(&a.name)),
            });
        }
        for join in &twj.joins {
            if let TableFactor::Table { name, alias, .. } = &join.relation {
                inner_relations.push(Relation {
                    name: object_name_last(name),
                    alias: alias.as_ref().map(|a| normalize_ident(&a.name)),
                });
            }
        }
    }
    info.inner_relation = inner_relations.first().map(|r| r.name.clone());

    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                if info.inner_column.is_none()
                    && let Some(column) = resolve_in(&inner_relations, expr)
                {
                    info.inner_column = Some(column.column);
                }
                if let Expr::Function(f) = expr {
                    let name = object_name_last(&f.name);
                    if matches!(name.as_str(), "count" | "sum" | "avg" | "min" | "max") {
                        info.has_aggregation = true;
                    }
                }
            }
            _ => {}
        }
    }

    if let GroupByExpr::Expressions(exprs) = &select.group_by {
        if !exprs.is_empty() {
            info.has_aggregation = true;
        }
        for expr in exprs {
            if let Some(column) = resolve_in(&inner_relations, expr) {
                info.inner_group_keys.push(column.column);
            }
        }
    }

    if let Some(selection) = &select.selection {
        collect_correlations(selection, outer, &inner_relations, &mut info.correlated_eq);
    }

    info
}

/// Collect one `SetOpSide` per leaf SELECT of a set-operation tree.
fn collect_set_op_sides(body: &SetExpr, sides: &mut Vec<SetOpSide>) {
    match body {
        SetExpr::Select(select) => {
            let mut relations = Vec::new();
            for twj in &select.from {
                if let TableFactor::Table { name, alias, .. } = &twj.relation {
                    relations.push(Relation {
                        name: object_name_last(name),
                        alias: alias.as_ref().map(|a| normalize_ident(&a.name)),
                    });
                }
            }
            let mut projected_columns = Vec::new();
            for item in &select.projection {
                if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } =
                    item
                    && let Some(column) = resolve_in(&relations, expr)
                {
                    projected_columns.push(column.column);
                }
            }
            sides.push(SetOpSide {
                relation: relations.first().map(|r| r.name.clone()),
                projected_columns,
            });
        }
        SetExpr::Query(inner) => collect_set_op_sides(&inner.body, sides),
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_op_sides(left, sides);
            collect_set_op_sides(right, sides);
        }
        _ => {}
    }
}

fn leftmost_select(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(inner) => leftmost_select(&inner.body),
        SetExpr::SetOperation { left, .. } => leftmost_select(left),
        _ => None,
    }
}

/// Record equality conjuncts that tie an outer-qualified column to an inner
/// column.
fn collect_correlations(
    expr: &Expr,
    outer: &[Relation],
    inner: &[Relation],
    out: &mut Vec<(ColumnRef, ColumnRef)>,
) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_correlations(left, outer, inner, out);
            collect_correlations(right, outer, inner, out);
        }
        Expr::Nested(inner_expr) => collect_correlations(inner_expr, outer, inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            let left_outer = resolve_qualified_only(outer, left);
            let right_outer = resolve_qualified_only(outer, right);
            let left_inner = resolve_in(inner, left);
            let right_inner = resolve_in(inner, right);
            if let (Some(o), Some(i)) = (left_outer, right_inner) {
                out.push((o, i));
            } else if let (Some(o), Some(i)) = (right_outer, left_inner) {
                out.push((o, i));
            }
        }
        _ => {}
    }
}

/// Resolve only explicitly qualified references, against the outer scope.
fn resolve_qualified_only(relations: &[Relation], expr: &Expr) -> Option<ColumnRef> {
    if let Expr::CompoundIdentifier(parts) = expr
        && parts.len() >= 2
    {
        let column = parts.last()?;
        let qualifier = normalize_ident(&parts[parts.len() - 2]);
        if relations.iter().any(|r| r.key() == qualifier) {
            return Some(ColumnRef::new(Some(qualifier), normalize_ident(column)));
        }
    }
    None
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}
