//! Planner gateway
//!
//! The only suspension points in the engine are behind this trait. Every
//! operation carries a caller-supplied statement timeout, and every failure
//! is an explicit variant that callers must handle; nothing here panics or
//! throws across the boundary.

pub mod plan;
pub mod postgres;

pub use plan::{PlanNode, PlanTree};
pub use postgres::PgPlannerGateway;

use crate::schema::SchemaSnapshot;
use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of planner calls.
///
/// `Timeout` and `Transport` are non-fatal: callers degrade to heuristic
/// analysis. `Syntax` on user SQL is fatal to that request. `Unavailable`
/// means the hypothetical-index extension is not installed.
#[derive(Debug, Clone, Error)]
pub enum PlannerFailure {
    #[error("planner call exceeded its statement timeout")]
    Timeout,

    #[error("planner transport error: {0}")]
    Transport(String),

    #[error("planner rejected the statement: {0}")]
    Syntax(String),

    #[error("hypothetical index support is not available")]
    Unavailable,
}

pub type PlannerResult<T> = Result<T, PlannerFailure>;

/// Filter for schema snapshot fetches.
#[derive(Debug, Clone, Default)]
pub struct SchemaFilter {
    /// Schema name; defaults to `public`.
    pub schema: Option<String>,
    /// Restrict to a single relation.
    pub table: Option<String>,
}

impl SchemaFilter {
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

/// Outcome of one hypothetical-index trial.
#[derive(Debug, Clone)]
pub struct HypotheticalTrial {
    pub plan: PlanTree,
    pub trial_duration_ms: u64,
}

/// The outbound planner capability required by the engine.
///
/// Implementations must be session-safe: hypothetical state created during
/// `with_hypothetical_index` is reset on every exit path, so no trial can
/// observe another trial's indexes.
#[async_trait]
pub trait PlannerGateway: Send + Sync {
    /// Run `EXPLAIN (FORMAT JSON[, ANALYZE, BUFFERS, TIMING])`.
    async fn explain(&self, sql: &str, analyze: bool, timeout_ms: u64) -> PlannerResult<PlanTree>;

    /// Costs-only EXPLAIN; never executes the statement. Used in the what-if
    /// hot loop.
    async fn explain_costs(&self, sql: &str, timeout_ms: u64) -> PlannerResult<PlanTree>;

    /// Fetch a read-only schema snapshot.
    async fn fetch_schema(
        &self,
        filter: &SchemaFilter,
        timeout_ms: u64,
    ) -> PlannerResult<SchemaSnapshot>;

    /// Reset hypothetical state, create the hypothetical index, re-plan the
    /// statement, and reset again, all on one dedicated session.
    async fn with_hypothetical_index(
        &self,
        index_ddl: &str,
        sql: &str,
        timeout_ms: u64,
    ) -> PlannerResult<HypotheticalTrial>;

    /// Capability probe for hypothetical indexes. One call per process
    /// lifetime is sufficient; implementations may memoize.
    async fn hypothetical_capability(&self) -> bool;
}

/// Cheap pre-submission check: only SELECT (or WITH ... SELECT) statements
/// are ever handed to EXPLAIN.
pub fn looks_like_select(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    let head: String = trimmed
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    head.starts_with("SELECT") || head.starts_with("WITH")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_select() {
        assert!(looks_like_select("SELECT 1"));
        assert!(looks_like_select("  select * from t"));
        assert!(looks_like_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!looks_like_select("INSERT INTO t VALUES (1)"));
        assert!(!looks_like_select("DELETE FROM t"));
    }

    #[test]
    fn test_schema_filter_default() {
        let f = SchemaFilter::default();
        assert_eq!(f.schema_or_default(), "public");
        let f = SchemaFilter {
            schema: Some("sales".into()),
            table: None,
        };
        assert_eq!(f.schema_or_default(), "sales");
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            PlannerFailure::Timeout.to_string(),
            "planner call exceeded its statement timeout"
        );
        assert!(PlannerFailure::Transport("refused".into())
            .to_string()
            .contains("refused"));
    }
}
