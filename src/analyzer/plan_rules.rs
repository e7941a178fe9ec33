//! Plan inspector
//!
//! Walks an EXPLAIN plan tree in pre-order and emits warnings for the usual
//! trouble spots. Pure function of the tree; warning order is node pre-order,
//! then rule order within a node.

use crate::planner::{PlanNode, PlanTree};
use crate::utils::round3;
use serde::Serialize;

/// Relation-size threshold shared by the scan and parallelism rules, and by
/// the workload aggregator's shared-scan detection.
pub(crate) const LARGE_SCAN_ROWS: f64 = 100_000.0;

/// Planner/actual row mismatch ratio above which a node is flagged.
const MISMATCH_RATIO: f64 = 0.5;

/// One plan warning.
#[derive(Debug, Clone, Serialize)]
pub struct PlanWarning {
    pub code: String,
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    pub detail: String,
}

impl PlanWarning {
    fn new(code: &str, node: &PlanNode, detail: String) -> Self {
        Self {
            code: code.to_string(),
            node_type: node.node_type.clone(),
            relation: node.relation_name.clone(),
            detail,
        }
    }
}

/// Small metrics object attached to explain responses.
#[derive(Debug, Clone, Serialize)]
pub struct PlanMetrics {
    pub planning_time_ms: f64,
    /// 0 when the plan was gathered without ANALYZE.
    pub execution_time_ms: f64,
    pub node_count: usize,
}

/// Inspect a plan tree.
pub fn inspect(plan: &PlanTree) -> (Vec<PlanWarning>, PlanMetrics) {
    let has_gather = plan.any_node(|n| n.node_type.starts_with("Gather"));
    let mut warnings = Vec::new();
    walk(&plan.root, true, has_gather, &mut warnings);

    let metrics = PlanMetrics {
        planning_time_ms: round3(plan.planning_time_ms),
        execution_time_ms: round3(plan.execution_time_ms),
        node_count: plan.node_count(),
    };
    (warnings, metrics)
}

fn walk(node: &PlanNode, is_root: bool, has_gather: bool, warnings: &mut Vec<PlanWarning>) {
    if node.node_type == "Seq Scan" && node.plan_rows > LARGE_SCAN_ROWS {
        warnings.push(PlanWarning::new(
            "SEQ_SCAN_LARGE",
            node,
            format!(
                "sequential scan over {} expects about {:.0} rows",
                node.relation_name.as_deref().unwrap_or("a relation"),
                node.plan_rows
            ),
        ));
    }

    if node.node_type.contains("Sort")
        && node
            .sort_method
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains("external"))
    {
        warnings.push(PlanWarning::new(
            "SORT_SPILL",
            node,
            format!(
                "sort spilled to disk ({})",
                node.sort_method.as_deref().unwrap_or_default()
            ),
        ));
    }

    if let Some(actual) = node.actual_rows {
        let base = node.plan_rows.max(1.0);
        let ratio = (actual - node.plan_rows).abs() / base;
        if ratio > MISMATCH_RATIO {
            warnings.push(PlanWarning::new(
                "ESTIMATE_MISMATCH",
                node,
                format!(
                    "planner expected {:.0} rows but saw {:.0}",
                    node.plan_rows, actual
                ),
            ));
        }
    }

    if node.node_type == "Nested Loop"
        && node
            .plans
            .get(1)
            .is_some_and(|inner| inner.node_type == "Seq Scan")
    {
        warnings.push(PlanWarning::new(
            "NESTED_LOOP_SEQ_INNER",
            node,
            "nested loop re-scans its inner relation sequentially".to_string(),
        ));
    }

    if node.node_type == "Seq Scan" && node.filter.is_some() && node.plan_rows > LARGE_SCAN_ROWS {
        warnings.push(PlanWarning::new(
            "NO_INDEX_FILTER",
            node,
            format!(
                "filter {} is applied without a usable index",
                node.filter.as_deref().unwrap_or_default()
            ),
        ));
    }

    // Parallelism check, attached at the root node's pre-order position: a
    // large result with no Gather anywhere in the tree.
    if is_root && node.plan_rows > LARGE_SCAN_ROWS && !has_gather {
        warnings.push(PlanWarning::new(
            "PARALLEL_OFF",
            node,
            format!(
                "plan processes about {:.0} rows without any Gather node",
                node.plan_rows
            ),
        ));
    }

    for child in &node.plans {
        walk(child, false, has_gather, warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(node_type: &str, plan_rows: f64) -> PlanNode {
        PlanNode {
            node_type: node_type.to_string(),
            plan_rows,
            total_cost: 100.0,
            ..PlanNode::default()
        }
    }

    fn tree(root: PlanNode) -> PlanTree {
        PlanTree {
            root,
            planning_time_ms: 0.12345,
            execution_time_ms: 0.0,
        }
    }

    fn codes(warnings: &[PlanWarning]) -> Vec<&str> {
        warnings.iter().map(|w| w.code.as_str()).collect()
    }

    #[test]
    fn test_seq_scan_large() {
        let mut scan = leaf("Seq Scan", 2_500_000.0);
        scan.relation_name = Some("orders".into());
        let (warnings, _) = inspect(&tree(scan));
        assert!(codes(&warnings).contains(&"SEQ_SCAN_LARGE"));
        // Also PARALLEL_OFF: large root with no Gather.
        assert!(codes(&warnings).contains(&"PARALLEL_OFF"));
    }

    #[test]
    fn test_small_seq_scan_is_quiet() {
        let (warnings, _) = inspect(&tree(leaf("Seq Scan", 100.0)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_sort_spill() {
        let mut sort = leaf("Sort", 10.0);
        sort.sort_method = Some("external merge".into());
        let (warnings, _) = inspect(&tree(sort));
        assert_eq!(codes(&warnings), vec!["SORT_SPILL"]);

        let mut sort = leaf("Sort", 10.0);
        sort.sort_method = Some("quicksort".into());
        let (warnings, _) = inspect(&tree(sort));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_estimate_mismatch() {
        let mut node = leaf("Index Scan", 100.0);
        node.actual_rows = Some(500.0);
        let (warnings, _) = inspect(&tree(node));
        assert_eq!(codes(&warnings), vec!["ESTIMATE_MISMATCH"]);

        let mut node = leaf("Index Scan", 100.0);
        node.actual_rows = Some(120.0);
        let (warnings, _) = inspect(&tree(node));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_nested_loop_seq_inner() {
        let mut nl = leaf("Nested Loop", 10.0);
        nl.plans = vec![leaf("Index Scan", 10.0), leaf("Seq Scan", 10.0)];
        let (warnings, _) = inspect(&tree(nl));
        assert!(codes(&warnings).contains(&"NESTED_LOOP_SEQ_INNER"));

        let mut nl = leaf("Nested Loop", 10.0);
        nl.plans = vec![leaf("Seq Scan", 10.0), leaf("Index Scan", 10.0)];
        let (warnings, _) = inspect(&tree(nl));
        assert!(!codes(&warnings).contains(&"NESTED_LOOP_SEQ_INNER"));
    }

    #[test]
    fn test_no_index_filter() {
        let mut scan = leaf("Seq Scan", 500_000.0);
        scan.filter = Some("(user_id = 42)".into());
        let (warnings, _) = inspect(&tree(scan));
        let codes = codes(&warnings);
        assert!(codes.contains(&"SEQ_SCAN_LARGE"));
        assert!(codes.contains(&"NO_INDEX_FILTER"));
    }

    #[test]
    fn test_parallel_off_suppressed_by_gather() {
        let mut root = leaf("Gather", 500_000.0);
        root.plans = vec![leaf("Parallel Seq Scan", 250_000.0)];
        let (warnings, _) = inspect(&tree(root));
        assert!(!codes(&warnings).contains(&"PARALLEL_OFF"));
    }

    #[test]
    fn test_pre_order_then_code_order() {
        let mut inner = leaf("Seq Scan", 500_000.0);
        inner.filter = Some("(x = 1)".into());
        let mut root = leaf("Nested Loop", 200_000.0);
        root.plans = vec![leaf("Index Scan", 10.0), inner];
        let (warnings, _) = inspect(&tree(root));
        // Both root warnings sit together at pre-order position 0, in rule
        // order, ahead of the descendant's warnings.
        assert_eq!(
            codes(&warnings),
            vec![
                "NESTED_LOOP_SEQ_INNER",
                "PARALLEL_OFF",
                "SEQ_SCAN_LARGE",
                "NO_INDEX_FILTER"
            ]
        );
    }

    #[test]
    fn test_metrics_rounding() {
        let (_, metrics) = inspect(&tree(leaf("Result", 1.0)));
        assert_eq!(metrics.planning_time_ms, 0.123);
        assert_eq!(metrics.execution_time_ms, 0.0);
        assert_eq!(metrics.node_count, 1);
    }
}
