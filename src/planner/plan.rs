//! EXPLAIN (FORMAT JSON) plan trees
//!
//! PostgreSQL returns a one-element JSON array wrapping the root plan node.
//! The tree is built as an owned structure; child order is preserved.

use serde::{Deserialize, Serialize};

/// One node of a query plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanNode {
    #[serde(rename = "Node Type")]
    pub node_type: String,

    #[serde(rename = "Relation Name", default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,

    #[serde(rename = "Alias", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(rename = "Startup Cost", default)]
    pub startup_cost: f64,

    #[serde(rename = "Total Cost", default)]
    pub total_cost: f64,

    #[serde(rename = "Plan Rows", default)]
    pub plan_rows: f64,

    #[serde(rename = "Plan Width", default)]
    pub plan_width: i64,

    /// Present only when the plan was gathered with ANALYZE.
    #[serde(rename = "Actual Rows", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,

    #[serde(rename = "Sort Method", default, skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,

    #[serde(rename = "Filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Projected expressions when EXPLAIN VERBOSE was requested.
    #[serde(rename = "Output", default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,

    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<PlanNode>,
}

#[derive(Debug, Deserialize)]
struct ExplainItem {
    #[serde(rename = "Plan")]
    plan: PlanNode,
    #[serde(rename = "Planning Time", default)]
    planning_time: f64,
    #[serde(rename = "Execution Time", default)]
    execution_time: f64,
}

/// A parsed plan with its top-level timings.
#[derive(Debug, Clone, Serialize)]
pub struct PlanTree {
    pub root: PlanNode,
    pub planning_time_ms: f64,
    /// 0 when the plan was gathered without ANALYZE.
    pub execution_time_ms: f64,
}

impl PlanTree {
    /// Parse the JSON value returned by `EXPLAIN (FORMAT JSON)`.
    pub fn from_explain_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let items: Vec<ExplainItem> = serde_json::from_value(value.clone())?;
        let item = items.into_iter().next().ok_or_else(|| {
            serde::de::Error::custom("EXPLAIN returned an empty plan array")
        })?;
        let mut tree = Self {
            root: item.plan,
            planning_time_ms: item.planning_time,
            execution_time_ms: item.execution_time,
        };
        sanitize(&mut tree.root);
        Ok(tree)
    }

    /// Planner total cost of the root node.
    pub fn total_cost(&self) -> f64 {
        self.root.total_cost
    }

    pub fn node_count(&self) -> usize {
        fn count(node: &PlanNode) -> usize {
            1 + node.plans.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    /// True when any node's type matches the predicate.
    pub fn any_node(&self, pred: impl Fn(&PlanNode) -> bool + Copy) -> bool {
        fn walk(node: &PlanNode, pred: impl Fn(&PlanNode) -> bool + Copy) -> bool {
            pred(node) || node.plans.iter().any(|c| walk(c, pred))
        }
        walk(&self.root, pred)
    }
}

/// Costs must be non-negative and finite; anything else collapses to 0.
fn sanitize(node: &mut PlanNode) {
    for v in [
        &mut node.startup_cost,
        &mut node.total_cost,
        &mut node.plan_rows,
    ] {
        if !v.is_finite() || *v < 0.0 {
            *v = 0.0;
        }
    }
    for child in &mut node.plans {
        sanitize(child);
    }
}
