//! Workload aggregator
//!
//! Normalizes each statement into a shape fingerprint, groups per-query
//! advice by fingerprint, merges index candidates across queries and flags
//! cross-query patterns. Inputs are processed in the order supplied; grouped
//! output is sorted by descending count, then ascending fingerprint.

use crate::analyzer::linter::RiskLevel;
use crate::analyzer::plan_rules::LARGE_SCAN_ROWS;
use crate::analyzer::suggestion::{IndexAdvice, Suggestion};
use crate::config::AdvisorConfig;
use crate::schema::SchemaSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

/// Canonical shape string: identifiers lowercased (quoted ones preserved),
/// literals and parameters replaced by `?`, whitespace collapsed, ORDER BY
/// directions omitted.
pub fn normalize_shape(sql: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        match c {
            '\'' => {
                // String literal, with '' as the escape.
                while let Some(n) = chars.next() {
                    if n == '\'' {
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                tokens.push("?".to_string());
            }
            '"' => {
                let mut ident = String::new();
                for n in chars.by_ref() {
                    if n == '"' {
                        break;
                    }
                    ident.push(n);
                }
                tokens.push(format!("\"{}\"", ident));
            }
            '$' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                    chars.next();
                }
                tokens.push("?".to_string());
            }
            _ if c.is_ascii_digit() => {
                while chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_digit() || *n == '.')
                {
                    chars.next();
                }
                tokens.push("?".to_string());
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                word.push(c);
                while chars
                    .peek()
                    .is_some_and(|n| n.is_alphanumeric() || *n == '_')
                {
                    word.push(chars.next().expect("peeked"));
                }
                let lower = word.to_lowercase();
                if lower != "asc" && lower != "desc" {
                    tokens.push(lower);
                }
            }
            _ => tokens.push(c.to_string()),
        }
    }
    tokens.join(" ")
}

/// Stable 64-bit fingerprint of the normalized shape.
pub fn fingerprint(sql: &str) -> u64 {
    xxh3_64(normalize_shape(sql).as_bytes())
}

fn fingerprint_hex(sql: &str) -> String {
    format!("{:016x}", fingerprint(sql))
}

/// Per-input analysis handed to the aggregator by the engine.
#[derive(Debug, Clone)]
pub struct AnalyzedQuery {
    pub sql: String,
    /// False for statements that failed to parse or are not SELECT.
    pub analyzed: bool,
    pub risk: RiskLevel,
    pub has_star: bool,
    /// Resolved relation names referenced by the query.
    pub relations: Vec<String>,
    /// Relation names read without any equality or range predicate.
    pub unfiltered_relations: Vec<String>,
    pub suggestions: Vec<Suggestion>,
    pub index_advice: Vec<IndexAdvice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerQueryRecord {
    pub sql: String,
    pub fingerprint: String,
    pub analyzed: bool,
    pub risk: RiskLevel,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupedQueries {
    pub fingerprint: String,
    pub count: usize,
    /// Lexicographically smallest member, to keep grouping output stable.
    pub example_sql: String,
    pub suggestions: Vec<Suggestion>,
}

/// An index suggestion merged across matching queries.
#[derive(Debug, Clone, Serialize)]
pub struct MergedIndexSuggestion {
    pub frequency: usize,
    #[serde(flatten)]
    pub suggestion: Suggestion,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadRecommendation {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadStats {
    pub total: usize,
    pub analyzed: usize,
    pub skipped: usize,
    pub unique_fingerprints: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub per_query: Vec<PerQueryRecord>,
    pub grouped: Vec<GroupedQueries>,
    pub merged_index_suggestions: Vec<MergedIndexSuggestion>,
    pub workload_recommendations: Vec<WorkloadRecommendation>,
    pub stats: WorkloadStats,
}

/// Merge per-query analyses into the workload report.
pub fn aggregate(
    queries: Vec<AnalyzedQuery>,
    schema: &SchemaSnapshot,
    config: &AdvisorConfig,
) -> WorkloadReport {
    let total = queries.len();
    let analyzed = queries.iter().filter(|q| q.analyzed).count();
    let star_count = queries.iter().filter(|q| q.analyzed && q.has_star).count();

    // Per-query records in input order.
    let per_query: Vec<PerQueryRecord> = queries
        .iter()
        .map(|q| PerQueryRecord {
            sql: q.sql.clone(),
            fingerprint: fingerprint_hex(&q.sql),
            analyzed: q.analyzed,
            risk: q.risk,
            suggestions: q.suggestions.clone(),
        })
        .collect();

    // Group analyzed statements by fingerprint.
    struct Group {
        count: usize,
        example_sql: String,
        suggestions: Vec<Suggestion>,
    }
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for q in queries.iter().filter(|q| q.analyzed) {
        let fp = fingerprint_hex(&q.sql);
        let entry = groups.entry(fp).or_insert_with(|| Group {
            count: 0,
            example_sql: q.sql.clone(),
            suggestions: Vec::new(),
        });
        entry.count += 1;
        if q.sql < entry.example_sql {
            entry.example_sql = q.sql.clone();
        }
        for s in &q.suggestions {
            if !entry.suggestions.iter().any(|e| e.title == s.title) {
                entry.suggestions.push(s.clone());
            }
        }
    }
    let mut grouped: Vec<GroupedQueries> = groups
        .into_iter()
        .map(|(fingerprint, g)| GroupedQueries {
            fingerprint,
            count: g.count,
            example_sql: g.example_sql,
            suggestions: g.suggestions,
        })
        .collect();
    grouped.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });

    // Merge index candidates across queries by (relation, columns, directions).
    struct Merged {
        frequency: usize,
        suggestion: Suggestion,
        costs: Vec<Option<(f64, f64)>>,
    }
    let mut merged: BTreeMap<String, Merged> = BTreeMap::new();
    for q in queries.iter().filter(|q| q.analyzed) {
        for advice in &q.index_advice {
            let entry = merged
                .entry(advice.candidate.identity())
                .or_insert_with(|| Merged {
                    frequency: 0,
                    suggestion: advice.suggestion.clone(),
                    costs: Vec::new(),
                });
            entry.frequency += 1;
            entry.costs.push(
                match (
                    advice.suggestion.est_cost_before,
                    advice.suggestion.est_cost_after,
                ) {
                    (Some(before), Some(after)) => Some((before, after)),
                    _ => None,
                },
            );
            if entry.frequency > 1 {
                let merged_score = entry.suggestion.score.unwrap_or(0.0)
                    + advice.suggestion.score.unwrap_or(0.0);
                entry.suggestion.score = Some(crate::utils::round3(merged_score));
                entry.suggestion.est_reduction_pct = match (
                    entry.suggestion.est_reduction_pct,
                    advice.suggestion.est_reduction_pct,
                ) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                entry.suggestion.impact =
                    entry.suggestion.impact.max(advice.suggestion.impact);
            }
        }
    }
    let mut merged_index_suggestions: Vec<MergedIndexSuggestion> = merged
        .into_values()
        .map(|mut m| {
            // Costs merge only when every matching query carried a completed
            // trial: before and after sum, and the delta derives from the
            // summed pair so that delta = before - after holds on the entry.
            if m.costs.iter().all(|c| c.is_some()) && !m.costs.is_empty() {
                let before = crate::utils::round3(
                    m.costs.iter().map(|c| c.map(|(b, _)| b).unwrap_or(0.0)).sum(),
                );
                let after = crate::utils::round3(
                    m.costs.iter().map(|c| c.map(|(_, a)| a).unwrap_or(0.0)).sum(),
                );
                m.suggestion.est_cost_before = Some(before);
                m.suggestion.est_cost_after = Some(after);
                m.suggestion.est_cost_delta = Some(crate::utils::round3(before - after));
            } else {
                m.suggestion.est_cost_before = None;
                m.suggestion.est_cost_after = None;
                m.suggestion.est_cost_delta = None;
            }
            MergedIndexSuggestion {
                frequency: m.frequency,
                suggestion: m.suggestion,
            }
        })
        .collect();
    merged_index_suggestions.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| {
                b.suggestion
                    .score
                    .unwrap_or(0.0)
                    .total_cmp(&a.suggestion.score.unwrap_or(0.0))
            })
            .then_with(|| a.suggestion.title.cmp(&b.suggestion.title))
    });

    // Cross-query patterns.
    let mut workload_recommendations = Vec::new();

    for group in &grouped {
        if group.count >= config.n1_threshold {
            workload_recommendations.push(WorkloadRecommendation {
                kind: "n_plus_one".to_string(),
                message: format!(
                    "the same statement shape ran {} times; batch it into one query (IN list or join) instead of per-row lookups",
                    group.count
                ),
                fingerprint: Some(group.fingerprint.clone()),
                relation: None,
            });
        }
    }

    // Shared large scan: one large relation read unfiltered by two or more
    // distinct shapes.
    let mut scan_shapes: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for q in queries.iter().filter(|q| q.analyzed) {
        let fp = fingerprint_hex(&q.sql);
        for relation in &q.unfiltered_relations {
            if schema.row_estimate(relation) as f64 > LARGE_SCAN_ROWS {
                let shapes = scan_shapes.entry(relation.as_str()).or_default();
                if !shapes.contains(&fp) {
                    shapes.push(fp.clone());
                }
            }
        }
    }
    for (relation, shapes) in &scan_shapes {
        if shapes.len() >= 2 {
            let merged_hint = merged_index_suggestions
                .iter()
                .find(|m| m.suggestion.title.contains(relation))
                .map(|m| format!("; candidate: {}", m.suggestion.title))
                .unwrap_or_default();
            workload_recommendations.push(WorkloadRecommendation {
                kind: "shared_large_scan".to_string(),
                message: format!(
                    "{} query shapes scan the large relation {} without a filterable index{}",
                    shapes.len(),
                    relation,
                    merged_hint
                ),
                fingerprint: None,
                relation: Some(relation.to_string()),
            });
        }
    }

    if analyzed > 0 && star_count * 2 >= analyzed {
        workload_recommendations.push(WorkloadRecommendation {
            kind: "widespread_select_star".to_string(),
            message: format!(
                "{} of {} analyzed queries project *; switch to explicit projections",
                star_count, analyzed
            ),
            fingerprint: None,
            relation: None,
        });
    }

    let stats = WorkloadStats {
        total,
        analyzed,
        skipped: total - analyzed,
        unique_fingerprints: grouped.len(),
    };

    WorkloadReport {
        per_query,
        grouped,
        merged_index_suggestions,
        workload_recommendations,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::suggestion::{Impact, IndexCandidate, SourceMask, SuggestionKind};

    #[test]
    fn test_normalize_replaces_literals() {
        assert_eq!(
            normalize_shape("SELECT * FROM orders WHERE user_id = 42"),
            "select * from orders where user_id = ?"
        );
        assert_eq!(
            normalize_shape("SELECT * FROM orders WHERE name = 'ann''s'"),
            "select * from orders where name = ?"
        );
        assert_eq!(
            normalize_shape("SELECT * FROM orders WHERE id = $1"),
            "select * from orders where id = ?"
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        let a = normalize_shape("SELECT  *\nFROM Orders\tWHERE user_id=1");
        let b = normalize_shape("select * from orders where USER_ID = 99");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_omits_order_directions() {
        let a = normalize_shape("SELECT * FROM t ORDER BY a DESC");
        let b = normalize_shape("SELECT * FROM t ORDER BY a ASC");
        let c = normalize_shape("SELECT * FROM t ORDER BY a");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_normalize_preserves_quoted_identifiers() {
        let a = normalize_shape(r#"SELECT "UserId" FROM t"#);
        let b = normalize_shape(r#"SELECT "userid" FROM t"#);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_stability() {
        let a = fingerprint("SELECT * FROM orders WHERE user_id = 1");
        let b = fingerprint("select  *  from orders where user_id = 2");
        assert_eq!(a, b);
        let c = fingerprint("SELECT * FROM users WHERE user_id = 1");
        assert_ne!(a, c);
    }

    fn index_advice(relation: &str, score: f64, costs: Option<(f64, f64)>) -> IndexAdvice {
        let candidate = IndexCandidate {
            relation: relation.to_string(),
            columns: vec!["user_id".into()],
            directions: vec![],
            sources: SourceMask::EQUALITY,
        };
        let mut suggestion = Suggestion {
            kind: SuggestionKind::Index,
            title: candidate.title(),
            rationale: "r".into(),
            impact: Impact::Medium,
            confidence: 0.6,
            statements: vec![candidate.ddl()],
            alt_sql: None,
            source_sql: None,
            score: Some(score),
            est_reduction_pct: Some(10.0),
            est_index_width_bytes: Some(8),
            est_cost_before: None,
            est_cost_after: None,
            est_cost_delta: None,
        };
        if let Some((before, after)) = costs {
            suggestion = suggestion.with_costs(before, after);
        }
        IndexAdvice {
            candidate,
            suggestion,
        }
    }

    fn analyzed(sql: &str, advice: Vec<IndexAdvice>) -> AnalyzedQuery {
        AnalyzedQuery {
            sql: sql.to_string(),
            analyzed: true,
            risk: RiskLevel::Low,
            has_star: sql.contains('*'),
            relations: vec!["orders".into()],
            unfiltered_relations: vec![],
            suggestions: vec![],
            index_advice: advice,
        }
    }

    #[test]
    fn test_n_plus_one_detection() {
        let queries: Vec<AnalyzedQuery> = (1..=12)
            .map(|i| {
                analyzed(
                    &format!("SELECT * FROM orders WHERE user_id = {}", i),
                    vec![index_advice("orders", 2.0, None)],
                )
            })
            .collect();
        let report = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());

        assert_eq!(report.stats.total, 12);
        assert_eq!(report.stats.unique_fingerprints, 1);
        assert_eq!(report.grouped.len(), 1);
        assert_eq!(report.grouped[0].count, 12);

        assert_eq!(report.merged_index_suggestions.len(), 1);
        let merged = &report.merged_index_suggestions[0];
        assert_eq!(merged.frequency, 12);
        assert_eq!(merged.suggestion.score, Some(24.0));

        let n1: Vec<_> = report
            .workload_recommendations
            .iter()
            .filter(|r| r.kind == "n_plus_one")
            .collect();
        assert_eq!(n1.len(), 1);
        assert_eq!(n1[0].fingerprint.as_ref(), Some(&report.grouped[0].fingerprint));
    }

    #[test]
    fn test_example_sql_is_lexicographically_smallest() {
        let queries = vec![
            analyzed("SELECT * FROM orders WHERE user_id = 9", vec![]),
            analyzed("SELECT * FROM orders WHERE user_id = 1", vec![]),
        ];
        let report = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());
        assert_eq!(
            report.grouped[0].example_sql,
            "SELECT * FROM orders WHERE user_id = 1"
        );
    }

    #[test]
    fn test_merged_costs_require_all_present() {
        let queries = vec![
            analyzed(
                "SELECT * FROM orders WHERE user_id = 1",
                vec![index_advice("orders", 1.0, Some((100.0, 90.0)))],
            ),
            analyzed(
                "SELECT * FROM orders WHERE user_id = 2 ",
                vec![index_advice("orders", 1.0, None)],
            ),
        ];
        let report = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());
        let merged = &report.merged_index_suggestions[0].suggestion;
        assert_eq!(merged.est_cost_before, None);
        assert_eq!(merged.est_cost_after, None);
        assert_eq!(merged.est_cost_delta, None);
    }

    #[test]
    fn test_merged_costs_sum_and_delta_stays_consistent() {
        let queries = vec![
            analyzed(
                "SELECT * FROM orders WHERE user_id = 1",
                vec![index_advice("orders", 1.0, Some((100.0, 90.0)))],
            ),
            analyzed(
                "SELECT id FROM orders WHERE user_id = 2",
                vec![index_advice("orders", 1.0, Some((50.0, 40.0)))],
            ),
        ];
        let report = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());
        let merged = &report.merged_index_suggestions[0].suggestion;
        assert_eq!(merged.est_cost_before, Some(150.0));
        assert_eq!(merged.est_cost_after, Some(130.0));
        // Delta equals the sum of per-query deltas and the before/after gap.
        assert_eq!(merged.est_cost_delta, Some(20.0));
        assert_eq!(
            merged.est_cost_delta,
            Some(crate::utils::round3(
                merged.est_cost_before.unwrap() - merged.est_cost_after.unwrap()
            ))
        );
    }

    #[test]
    fn test_widespread_select_star() {
        let queries = vec![
            analyzed("SELECT * FROM orders WHERE user_id = 1", vec![]),
            analyzed("SELECT id FROM orders WHERE user_id = 2", vec![]),
        ];
        let report = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());
        assert!(report
            .workload_recommendations
            .iter()
            .any(|r| r.kind == "widespread_select_star"));
    }

    #[test]
    fn test_shared_large_scan() {
        let mut schema = SchemaSnapshot::empty();
        schema.row_estimates.insert("orders".into(), 1_000_000);

        let mut q1 = analyzed("SELECT * FROM orders", vec![]);
        q1.unfiltered_relations = vec!["orders".into()];
        let mut q2 = analyzed("SELECT id FROM orders ORDER BY id", vec![]);
        q2.unfiltered_relations = vec!["orders".into()];

        let report = aggregate(vec![q1, q2], &schema, &AdvisorConfig::default());
        let shared: Vec<_> = report
            .workload_recommendations
            .iter()
            .filter(|r| r.kind == "shared_large_scan")
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].relation.as_deref(), Some("orders"));
    }

    #[test]
    fn test_permuting_inputs_keeps_grouped_output() {
        let mut queries = vec![
            analyzed("SELECT * FROM a WHERE x = 1", vec![]),
            analyzed("SELECT * FROM b WHERE y = 2", vec![]),
            analyzed("SELECT * FROM a WHERE x = 3", vec![]),
        ];
        let report_a = aggregate(queries.clone(), &SchemaSnapshot::empty(), &AdvisorConfig::default());
        queries.reverse();
        let report_b = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());

        let keys_a: Vec<(String, usize)> = report_a
            .grouped
            .iter()
            .map(|g| (g.fingerprint.clone(), g.count))
            .collect();
        let keys_b: Vec<(String, usize)> = report_b
            .grouped
            .iter()
            .map(|g| (g.fingerprint.clone(), g.count))
            .collect();
        assert_eq!(keys_a, keys_b);
        assert_eq!(
            report_a.grouped[0].example_sql,
            report_b.grouped[0].example_sql
        );
    }

    #[test]
    fn test_skipped_statements_counted() {
        let mut skipped = analyzed("INSERT INTO t VALUES (1)", vec![]);
        skipped.analyzed = false;
        skipped.risk = RiskLevel::High;
        let queries = vec![analyzed("SELECT id FROM t WHERE a = 1", vec![]), skipped];
        let report = aggregate(queries, &SchemaSnapshot::empty(), &AdvisorConfig::default());
        assert_eq!(report.stats.total, 2);
        assert_eq!(report.stats.analyzed, 1);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.per_query.len(), 2);
        assert_eq!(report.grouped.len(), 1);
    }
}
