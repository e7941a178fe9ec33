//! Analysis engine
//!
//! Orchestrates the SQL model, linter, plan inspector, rewrite and index
//! advisors, the what-if evaluator and the workload aggregator behind the
//! four inbound operations: lint, explain, optimize, workload.
//!
//! Error policy: only a statement the parser cannot read (Syntax) and a
//! non-SELECT handed to optimize (NonSelect) are fatal. Planner timeouts,
//! transport failures and missing capabilities degrade into structured
//! indicators on the response.

pub mod index;
pub mod linter;
pub mod plan_rules;
pub mod rewrite;
pub mod suggestion;
pub mod whatif;
pub mod workload;


use crate::config::AdvisorConfig;
use crate::model::{self, QueryModel};
use crate::nl::{ExplanationProducer, NlOptions};
use crate::planner::{PlanTree, PlannerFailure, PlannerGateway, SchemaFilter};
use crate::schema::SchemaSnapshot;
use crate::utils::{AdvisorError, AdvisorResult, round3};
use linter::{LintIssue, LintReport, LintRules, RiskLevel, Severity};
use plan_rules::{PlanMetrics, PlanWarning};
use serde::Serialize;
use std::sync::Arc;
use suggestion::{Suggestion, SuggestionKind};
use whatif::{Ranking, WhatIfReport};
use workload::{AnalyzedQuery, WorkloadReport};

/// Statement timeout applied when a request does not carry its own.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// The analysis engine. Owns the configuration and the outbound seams; all
/// per-request state lives on the stack of one operation call.
pub struct QueryAdvisor {
    config: AdvisorConfig,
    lint_rules: LintRules,
    gateway: Arc<dyn PlannerGateway>,
    explainer: Option<Arc<dyn ExplanationProducer>>,
}

// ============================================================================
// Request / response types
// ============================================================================

/// Lint output: the model (when one could be built), issues and risk.
#[derive(Debug, Serialize)]
pub struct LintOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<QueryModel>,
    pub issues: Vec<LintIssue>,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone)]
pub struct ExplainOptions {
    pub analyze: bool,
    pub timeout_ms: u64,
    pub nl: Option<NlOptions>,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            analyze: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            nl: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExplainReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanTree>,
    pub warnings: Vec<PlanWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PlanMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub what_if: bool,
    /// Clamped to [1, 50].
    pub top_k: usize,
    pub timeout_ms: u64,
    /// Attach the original SQL to rewrite suggestions for diff rendering.
    pub diff: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            what_if: true,
            top_k: 10,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            diff: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OptimizeSummary {
    /// Risk-weighted quality score in [0, 1], 3-digit rounding.
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct OptimizeReport {
    pub suggestions: Vec<Suggestion>,
    pub summary: OptimizeSummary,
    pub ranking: Ranking,
    pub what_if_report: WhatIfReport,
    pub plan_warnings: Vec<PlanWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_metrics: Option<PlanMetrics>,
    pub top_k_returned: usize,
}

#[derive(Debug, Clone)]
pub struct WorkloadOptions {
    /// Cap on merged index suggestions returned.
    pub top_k: usize,
    pub what_if: bool,
}

impl Default for WorkloadOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            what_if: false,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

impl QueryAdvisor {
    pub fn new(config: AdvisorConfig, gateway: Arc<dyn PlannerGateway>) -> Self {
        let lint_rules = LintRules::new(&config.lint);
        Self {
            config,
            lint_rules,
            gateway,
            explainer: None,
        }
    }

    /// Attach an optional natural-language producer.
    pub fn with_explainer(mut self, explainer: Arc<dyn ExplanationProducer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Lint one statement. Never contacts the planner.
    pub fn lint(&self, sql: &str) -> LintOutcome {
        match model::parse(sql) {
            Ok(model) => {
                let report = self.lint_rules.lint(&model);
                LintOutcome {
                    model: Some(model),
                    issues: report.issues,
                    risk: report.risk,
                }
            }
            Err(e) => {
                let report = LintReport::parse_error(e.to_string());
                LintOutcome {
                    model: None,
                    issues: report.issues,
                    risk: report.risk,
                }
            }
        }
    }

    /// Explain one statement and inspect its plan.
    pub async fn explain(&self, sql: &str, opts: ExplainOptions) -> AdvisorResult<ExplainReport> {
        let model = model::parse(sql).map_err(|e| AdvisorError::Syntax(e.to_string()))?;
        if !model.is_select() {
            return Err(AdvisorError::NonSelect(model.statement_label));
        }

        match self.gateway.explain(sql, opts.analyze, opts.timeout_ms).await {
            Ok(plan) => {
                let (warnings, metrics) = plan_rules::inspect(&plan);
                let explanation_text = self.explanation_for(&warnings, &metrics, &opts.nl).await;
                Ok(ExplainReport {
                    plan: Some(plan),
                    warnings,
                    metrics: Some(metrics),
                    explanation_text,
                })
            }
            Err(PlannerFailure::Syntax(message)) => Err(AdvisorError::Syntax(message)),
            Err(e) => {
                tracing::warn!("EXPLAIN degraded to empty plan data: {}", e);
                Ok(ExplainReport {
                    plan: None,
                    warnings: Vec::new(),
                    metrics: None,
                    explanation_text: None,
                })
            }
        }
    }

    /// Produce ranked optimization advice for one statement.
    pub async fn optimize(&self, sql: &str, opts: OptimizeOptions) -> AdvisorResult<OptimizeReport> {
        let model = model::parse(sql).map_err(|e| AdvisorError::Syntax(e.to_string()))?;
        if !model.is_select() {
            return Err(AdvisorError::NonSelect(model.statement_label));
        }
        let top_k = opts.top_k.clamp(1, 50);

        let schema = self.snapshot(opts.timeout_ms).await;
        let lint_report = self.lint_rules.lint(&model);

        let (plan_warnings, plan_metrics) =
            match self.gateway.explain_costs(sql, opts.timeout_ms).await {
                Ok(plan) => {
                    let (warnings, metrics) = plan_rules::inspect(&plan);
                    (warnings, Some(metrics))
                }
                Err(PlannerFailure::Syntax(message)) => {
                    return Err(AdvisorError::Syntax(message));
                }
                Err(e) => {
                    tracing::warn!("Optimize continues without plan data: {}", e);
                    (Vec::new(), None)
                }
            };

        let rewrites = rewrite::advise(&model, &schema);
        let index_advice = index::advise(&model, &schema, &self.config);

        let outcome = whatif::evaluate(
            Arc::clone(&self.gateway),
            sql,
            rewrites,
            index_advice,
            &self.config.whatif,
            opts.what_if,
        )
        .await;

        let mut suggestions = outcome.suggestions;
        if opts.diff {
            for s in suggestions
                .iter_mut()
                .filter(|s| s.kind == SuggestionKind::Rewrite)
            {
                s.source_sql = Some(sql.to_string());
            }
        }

        let score = summary_score(&lint_report, &plan_warnings);
        let top_k_returned = suggestions.len().min(top_k);
        suggestions.truncate(top_k);

        Ok(OptimizeReport {
            suggestions,
            summary: OptimizeSummary { score },
            ranking: outcome.ranking,
            what_if_report: outcome.report,
            plan_warnings,
            plan_metrics,
            top_k_returned,
        })
    }

    /// Analyze a workload of statements and merge the advice.
    pub async fn workload(&self, sqls: &[String], opts: WorkloadOptions) -> WorkloadReport {
        let schema = self.snapshot(DEFAULT_TIMEOUT_MS).await;

        let mut analyzed = Vec::with_capacity(sqls.len());
        for sql in sqls {
            analyzed.push(self.analyze_for_workload(sql, &schema, opts.what_if).await);
        }

        let mut report = workload::aggregate(analyzed, &schema, &self.config);
        report.merged_index_suggestions.truncate(opts.top_k.max(1));
        report
    }

    async fn analyze_for_workload(
        &self,
        sql: &str,
        schema: &SchemaSnapshot,
        what_if: bool,
    ) -> AnalyzedQuery {
        let skipped = |sql: &str| AnalyzedQuery {
            sql: sql.to_string(),
            analyzed: false,
            risk: RiskLevel::High,
            has_star: false,
            relations: Vec::new(),
            unfiltered_relations: Vec::new(),
            suggestions: Vec::new(),
            index_advice: Vec::new(),
        };

        let Ok(model) = model::parse(sql) else {
            return skipped(sql);
        };
        if !model.is_select() {
            return skipped(sql);
        }

        let lint_report = self.lint_rules.lint(&model);
        let rewrites = rewrite::advise(&model, schema);
        let mut index_advice = index::advise(&model, schema, &self.config);

        let suggestions = if what_if {
            let outcome = whatif::evaluate(
                Arc::clone(&self.gateway),
                sql,
                rewrites.clone(),
                index_advice.clone(),
                &self.config.whatif,
                true,
            )
            .await;
            // Copy measured costs back onto the advice for cross-query merge.
            for advice in &mut index_advice {
                if let Some(s) = outcome
                    .suggestions
                    .iter()
                    .find(|s| s.title == advice.suggestion.title)
                {
                    advice.suggestion.est_cost_before = s.est_cost_before;
                    advice.suggestion.est_cost_after = s.est_cost_after;
                    advice.suggestion.est_cost_delta = s.est_cost_delta;
                }
            }
            outcome.suggestions
        } else {
            rewrites
                .iter()
                .cloned()
                .chain(index_advice.iter().map(|a| a.suggestion.clone()))
                .collect()
        };

        let mut relations = Vec::new();
        let mut unfiltered_relations = Vec::new();
        for relation in &model.relations {
            if !relations.contains(&relation.name) {
                relations.push(relation.name.clone());
            }
            if !model.has_predicate_on(relation.key())
                && !unfiltered_relations.contains(&relation.name)
            {
                unfiltered_relations.push(relation.name.clone());
            }
        }

        AnalyzedQuery {
            sql: sql.to_string(),
            analyzed: true,
            risk: lint_report.risk,
            has_star: model.has_star_projection(),
            relations,
            unfiltered_relations,
            suggestions,
            index_advice,
        }
    }

    /// Schema fetch with the resource-exhausted degradation: advisors run on
    /// an empty snapshot when the catalog is unreachable.
    async fn snapshot(&self, timeout_ms: u64) -> SchemaSnapshot {
        match self
            .gateway
            .fetch_schema(&SchemaFilter::default(), timeout_ms)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Schema fetch failed, advising on empty snapshot: {}", e);
                SchemaSnapshot::empty()
            }
        }
    }

    /// Consult the optional text producer; any failure degrades to None.
    async fn explanation_for(
        &self,
        warnings: &[PlanWarning],
        metrics: &PlanMetrics,
        nl: &Option<NlOptions>,
    ) -> Option<String> {
        let producer = self.explainer.as_ref()?;
        let opts = nl.as_ref()?;

        let mut parts = vec![format!(
            "PostgreSQL plan with {} node(s); planning {:.3} ms, execution {:.3} ms.",
            metrics.node_count, metrics.planning_time_ms, metrics.execution_time_ms
        )];
        for w in warnings {
            parts.push(format!("{}: {}", w.code, w.detail));
        }
        let prompt = parts.join("\n");

        match producer
            .generate(&prompt, opts.audience, &opts.style, &opts.length)
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("Explanation producer unavailable: {}", e);
                None
            }
        }
    }
}

/// Risk-weighted summary score: start at 1.0, subtract per lint issue and
/// plan warning, clamp to [0, 1], 3-digit rounding.
fn summary_score(lint: &LintReport, plan_warnings: &[PlanWarning]) -> f64 {
    let mut score = 1.0;
    for issue in &lint.issues {
        score -= match issue.severity {
            Severity::High => 0.25,
            Severity::Warn => 0.10,
            Severity::Info => 0.03,
        };
    }
    score -= 0.05 * plan_warnings.len() as f64;
    round3(score.clamp(0.0, 1.0))
}
