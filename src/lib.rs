//! pglens
//!
//! Deterministic optimization advisor for PostgreSQL SELECT statements:
//! parses SQL into a normalized query model, lints it, inspects EXPLAIN
//! plans, synthesizes rewrite and B-tree index advice, optionally ranks
//! index candidates by measured planner-cost deltas using hypothetical
//! (hypopg) indexes, and merges per-query advice into workload-level
//! recommendations.
//!
//! The engine never issues DDL or DML against the catalog, never mutates
//! persistent state, and produces byte-identical output for identical inputs
//! and configuration.

pub mod analyzer;
pub mod config;
pub mod model;
pub mod nl;
pub mod planner;
pub mod schema;
pub mod utils;

// Re-export the engine surface.
pub use analyzer::{
    ExplainOptions, ExplainReport, LintOutcome, OptimizeOptions, OptimizeReport, OptimizeSummary,
    QueryAdvisor, WorkloadOptions,
};
pub use analyzer::linter::{LintIssue, LintReport, RiskLevel, Severity};
pub use analyzer::plan_rules::{PlanMetrics, PlanWarning};
pub use analyzer::suggestion::{Impact, IndexCandidate, Suggestion, SuggestionKind};
pub use analyzer::whatif::{Ranking, WhatIfReport};
pub use analyzer::workload::{WorkloadReport, WorkloadStats};
pub use config::{AdvisorConfig, LintConfig, WhatIfConfig};
pub use model::{QueryModel, StatementKind};
pub use nl::{Audience, ExplanationProducer, NlOptions, NlUnavailable};
pub use planner::{
    HypotheticalTrial, PgPlannerGateway, PlanNode, PlanTree, PlannerFailure, PlannerGateway,
    PlannerResult, SchemaFilter,
};
pub use schema::{ColumnDef, ColumnKind, IndexDef, SchemaSnapshot, TableInfo};
pub use utils::{AdvisorError, AdvisorResult, init_tracing};
