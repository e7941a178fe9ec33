//! What-if evaluator
//!
//! Trials the top index candidates against hypothetical indexes on fresh
//! planner sessions, bounded by a worker count and a global wall-clock
//! budget. Workers share a queue and an atomic stop flag; in-flight planner
//! calls are never aborted, and every trial resets hypothetical state on all
//! exit paths (the gateway contract). Trial completions may arrive out of
//! order; the final suggestion list is reordered by a total order, so output
//! stays deterministic for any set of completed trials.

use crate::analyzer::suggestion::{IndexAdvice, Suggestion};
use crate::config::WhatIfConfig;
use crate::planner::{PlannerFailure, PlannerGateway};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How the final suggestion list was ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    Heuristic,
    CostBased,
}

/// Report attached to every optimize response.
#[derive(Debug, Clone, Serialize)]
pub struct WhatIfReport {
    pub enabled: bool,
    pub available: bool,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub trials_filtered_by_pct: usize,
    pub budget_exceeded: bool,
}

impl WhatIfReport {
    fn disabled(enabled: bool) -> Self {
        Self {
            enabled,
            available: false,
            trials_completed: 0,
            trials_failed: 0,
            trials_filtered_by_pct: 0,
            budget_exceeded: false,
        }
    }
}

/// Result of the what-if step.
#[derive(Debug)]
pub struct WhatIfOutcome {
    pub suggestions: Vec<Suggestion>,
    pub report: WhatIfReport,
    pub ranking: Ranking,
}

struct TrialShared {
    gateway: Arc<dyn PlannerGateway>,
    sql: String,
    queue: Mutex<VecDeque<(usize, String)>>,
    stop: AtomicBool,
    budget_exceeded: AtomicBool,
    state: Mutex<TrialState>,
    results: Mutex<Vec<(usize, f64)>>,
    deadline: Instant,
    cost_before: f64,
    trial_timeout_ms: u64,
    early_stop_pct: f64,
    early_stop_after: usize,
}

#[derive(Default)]
struct TrialState {
    completed: usize,
    failed: usize,
    best_reduction_pct: f64,
}

/// Run the what-if step over heuristic advice.
///
/// `requested` is the per-request flag; the configuration switch must also
/// be on. When either is off, or the capability is absent, the heuristic
/// order (rewrites first, then index advice by score) is returned unchanged.
pub async fn evaluate(
    gateway: Arc<dyn PlannerGateway>,
    sql: &str,
    rewrites: Vec<Suggestion>,
    index_advice: Vec<IndexAdvice>,
    config: &WhatIfConfig,
    requested: bool,
) -> WhatIfOutcome {
    let heuristic =
        |rewrites: Vec<Suggestion>, advice: Vec<IndexAdvice>, report: WhatIfReport| WhatIfOutcome {
            suggestions: rewrites
                .into_iter()
                .chain(advice.into_iter().map(|a| a.suggestion))
                .collect(),
            report,
            ranking: Ranking::Heuristic,
        };

    let enabled = requested && config.enabled;
    if !enabled || index_advice.is_empty() {
        return heuristic(rewrites, index_advice, WhatIfReport::disabled(enabled));
    }

    if !gateway.hypothetical_capability().await {
        tracing::debug!("What-if skipped: hypothetical capability absent");
        return heuristic(rewrites, index_advice, WhatIfReport::disabled(true));
    }

    let started = Instant::now();
    let baseline = match gateway.explain_costs(sql, config.trial_timeout_ms).await {
        Ok(plan) => plan,
        Err(PlannerFailure::Transport(e)) => {
            tracing::warn!("What-if baseline failed on transport: {}", e);
            return heuristic(rewrites, index_advice, WhatIfReport::disabled(true));
        }
        Err(e) => {
            tracing::warn!("What-if baseline unavailable: {}", e);
            let mut report = WhatIfReport::disabled(true);
            report.available = true;
            return heuristic(rewrites, index_advice, report);
        }
    };
    let cost_before = baseline.total_cost();

    // Retain the top candidates by heuristic score; the rest keep their
    // heuristic ranking without cost fields.
    let trial_count = index_advice.len().min(config.max_trials);
    let queue: VecDeque<(usize, String)> = index_advice
        .iter()
        .take(trial_count)
        .enumerate()
        .map(|(i, a)| (i, a.candidate.ddl()))
        .collect();

    let shared = Arc::new(TrialShared {
        gateway,
        sql: sql.to_string(),
        queue: Mutex::new(queue),
        stop: AtomicBool::new(false),
        budget_exceeded: AtomicBool::new(false),
        state: Mutex::new(TrialState::default()),
        results: Mutex::new(Vec::new()),
        deadline: started + Duration::from_millis(config.global_timeout_ms),
        cost_before,
        trial_timeout_ms: config.trial_timeout_ms,
        early_stop_pct: config.early_stop_pct,
        early_stop_after: config.max_trials.div_ceil(2),
    });

    let workers: Vec<_> = (0..config.parallelism.max(1))
        .map(|_| tokio::spawn(worker(Arc::clone(&shared))))
        .collect();
    for handle in workers {
        let _ = handle.await;
    }

    let results = std::mem::take(&mut *shared.results.lock().expect("results lock"));
    let state = shared.state.lock().expect("state lock");
    let trials_completed = state.completed;
    let trials_failed = state.failed;
    drop(state);

    // Attach measured costs, then apply the relative-improvement filter to
    // index suggestions. Suggestions without a completed trial survive.
    let mut trials_filtered_by_pct = 0;
    let mut suggestions: Vec<Suggestion> = rewrites;
    for (i, advice) in index_advice.into_iter().enumerate() {
        match results.iter().find(|(idx, _)| *idx == i) {
            Some((_, cost_after)) => {
                let reduction_pct = relative_reduction_pct(cost_before, *cost_after);
                if reduction_pct < config.min_cost_reduction_pct {
                    trials_filtered_by_pct += 1;
                    continue;
                }
                suggestions.push(advice.suggestion.with_costs(cost_before, *cost_after));
            }
            None => suggestions.push(advice.suggestion),
        }
    }

    rerank(&mut suggestions);

    WhatIfOutcome {
        suggestions,
        report: WhatIfReport {
            enabled: true,
            available: true,
            trials_completed,
            trials_failed,
            trials_filtered_by_pct,
            budget_exceeded: shared.budget_exceeded.load(AtomicOrdering::Relaxed),
        },
        ranking: Ranking::CostBased,
    }
}

/// One worker: pull candidates until the queue drains or a flag stops it.
/// The worker owns its planner session for the lifetime of each trial via
/// the gateway contract.
async fn worker(shared: Arc<TrialShared>) {
    loop {
        if shared.stop.load(AtomicOrdering::Relaxed) {
            break;
        }
        if Instant::now() >= shared.deadline {
            shared.budget_exceeded.store(true, AtomicOrdering::Relaxed);
            shared.stop.store(true, AtomicOrdering::Relaxed);
            break;
        }
        let next = shared.queue.lock().expect("queue lock").pop_front();
        let Some((idx, ddl)) = next else {
            break;
        };

        let outcome = shared
            .gateway
            .with_hypothetical_index(&ddl, &shared.sql, shared.trial_timeout_ms)
            .await;

        match outcome {
            Ok(trial) => {
                let cost_after = trial.plan.total_cost();
                shared
                    .results
                    .lock()
                    .expect("results lock")
                    .push((idx, cost_after));
                let mut state = shared.state.lock().expect("state lock");
                state.completed += 1;
                let reduction = relative_reduction_pct(shared.cost_before, cost_after);
                if reduction > state.best_reduction_pct {
                    state.best_reduction_pct = reduction;
                }
                // Early stop: half the trial budget is in and nothing moved.
                if state.completed >= shared.early_stop_after
                    && state.best_reduction_pct < shared.early_stop_pct
                {
                    shared.stop.store(true, AtomicOrdering::Relaxed);
                }
            }
            Err(e) => {
                tracing::debug!("Trial {} failed: {}", idx, e);
                shared.state.lock().expect("state lock").failed += 1;
            }
        }
    }
}

fn relative_reduction_pct(cost_before: f64, cost_after: f64) -> f64 {
    (cost_before - cost_after) / cost_before.max(1e-9) * 100.0
}

/// The total order applied after trials complete:
/// descending cost delta, then impact, then confidence, then title. Items
/// without a delta sort after any positive delta but before zero or negative
/// deltas.
pub fn rerank(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(whatif_order);
}

fn delta_class(s: &Suggestion) -> u8 {
    match s.est_cost_delta {
        Some(d) if d > 0.0 => 0,
        None => 1,
        Some(_) => 2,
    }
}

fn whatif_order(a: &Suggestion, b: &Suggestion) -> Ordering {
    delta_class(a)
        .cmp(&delta_class(b))
        .then_with(|| {
            let da = a.est_cost_delta.unwrap_or(0.0);
            let db = b.est_cost_delta.unwrap_or(0.0);
            db.total_cmp(&da)
        })
        .then_with(|| b.impact.rank().cmp(&a.impact.rank()))
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.title.cmp(&b.title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::suggestion::Impact;

    fn suggestion(title: &str, impact: Impact, confidence: f64, delta: Option<f64>) -> Suggestion {
        let mut s = Suggestion::rewrite(title, "r", impact, confidence, None);
        if let Some(d) = delta {
            s = s.with_costs(d.max(0.0) + 100.0, 100.0 - d.min(0.0).abs());
            // Overwrite with the exact delta for test precision.
            s.est_cost_delta = Some(d);
        }
        s
    }

    #[test]
    fn test_rerank_descending_delta_first() {
        let mut items = vec![
            suggestion("b", Impact::Low, 0.5, Some(10.0)),
            suggestion("a", Impact::Low, 0.5, Some(50.0)),
        ];
        rerank(&mut items);
        assert_eq!(items[0].title, "a");
        assert_eq!(items[1].title, "b");
    }

    #[test]
    fn test_rerank_missing_delta_between_positive_and_zero() {
        let mut items = vec![
            suggestion("zero", Impact::High, 0.9, Some(0.0)),
            suggestion("none", Impact::Low, 0.5, None),
            suggestion("pos", Impact::Low, 0.5, Some(1.0)),
        ];
        rerank(&mut items);
        let titles: Vec<&str> = items.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["pos", "none", "zero"]);
    }

    #[test]
    fn test_rerank_ties_fall_to_impact_confidence_title() {
        let mut items = vec![
            suggestion("c", Impact::Low, 0.5, None),
            suggestion("b", Impact::Low, 0.7, None),
            suggestion("a", Impact::Low, 0.7, None),
            suggestion("d", Impact::High, 0.1, None),
        ];
        rerank(&mut items);
        let titles: Vec<&str> = items.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_rerank_zero_delta_uses_total_order() {
        // The open question on tied zero deltas is pinned here: they follow
        // the same impact/confidence/title order as everything else.
        let mut items = vec![
            suggestion("z2", Impact::Low, 0.5, Some(0.0)),
            suggestion("z1", Impact::Medium, 0.5, Some(0.0)),
            suggestion("neg", Impact::High, 0.9, Some(-5.0)),
        ];
        rerank(&mut items);
        let titles: Vec<&str> = items.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["z1", "z2", "neg"]);
    }

    #[test]
    fn test_relative_reduction_pct() {
        assert!((relative_reduction_pct(200.0, 100.0) - 50.0).abs() < 1e-9);
        assert!((relative_reduction_pct(100.0, 100.0)).abs() < 1e-9);
        assert!(relative_reduction_pct(0.0, 0.0).abs() < 1e-9);
    }
}
