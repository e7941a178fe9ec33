//! SQL linter
//!
//! A fixed, ordered rule set over the query model. Pure function of the
//! model plus the configured glob lists; issue order is the rule order, so
//! output is stable for identical inputs.

use crate::config::LintConfig;
use crate::model::{JoinKind, LiteralShape, Projection, QueryModel, StatementKind};
use crate::utils::GlobList;
use serde::Serialize;

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    High,
}

/// Overall risk summary of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One linter finding.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
}

impl LintIssue {
    fn new(code: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message: message.into(),
        }
    }
}

/// Linter output: ordered issues plus the risk summary.
#[derive(Debug, Clone, Serialize)]
pub struct LintReport {
    pub issues: Vec<LintIssue>,
    pub risk: RiskLevel,
}

impl LintReport {
    /// Report for SQL the parser could not read at all.
    pub fn parse_error(message: impl Into<String>) -> Self {
        let issues = vec![LintIssue::new(
            "PARSE_ERROR",
            Severity::High,
            format!("statement could not be parsed: {}", message.into()),
        )];
        Self {
            risk: summarize(&issues),
            issues,
        }
    }
}

/// Compiled linter heuristics, built once per configuration.
#[derive(Debug, Clone, Default)]
pub struct LintRules {
    large_tables: GlobList,
    numeric_columns: GlobList,
}

impl LintRules {
    pub fn new(config: &LintConfig) -> Self {
        Self {
            large_tables: GlobList::compile(&config.large_table_patterns),
            numeric_columns: GlobList::compile(&config.numeric_column_patterns),
        }
    }

    /// Apply the rule set in its fixed order.
    pub fn lint(&self, model: &QueryModel) -> LintReport {
        let mut issues = Vec::new();

        if model.statement_kind == StatementKind::Other {
            issues.push(LintIssue::new(
                "PARSE_ERROR",
                Severity::High,
                format!(
                    "statement kind {} is not a SELECT and was not analyzed",
                    model.statement_label
                ),
            ));
            return LintReport {
                risk: summarize(&issues),
                issues,
            };
        }

        // 1. SELECT_STAR
        if model.has_star_projection() {
            issues.push(LintIssue::new(
                "SELECT_STAR",
                Severity::Warn,
                "projection uses *; name the needed columns instead",
            ));
        }

        // 2. MISSING_JOIN_ON
        let mut missing_join_on = false;
        for join in &model.joins {
            if matches!(
                join.kind,
                JoinKind::Inner | JoinKind::Left | JoinKind::Right | JoinKind::Full
            ) && join.on_columns.is_empty()
            {
                missing_join_on = true;
                issues.push(LintIssue::new(
                    "MISSING_JOIN_ON",
                    Severity::High,
                    format!("join against {} has no usable join condition", join.right),
                ));
            }
        }

        // 3. CARTESIAN_JOIN
        let has_cartesian = model
            .joins
            .iter()
            .any(|j| matches!(j.kind, JoinKind::Cross | JoinKind::ImplicitComma));
        if has_cartesian || missing_join_on {
            issues.push(LintIssue::new(
                "CARTESIAN_JOIN",
                Severity::High,
                "query can produce a cartesian product",
            ));
        }

        // 4. AMBIGUOUS_COLUMN
        if model.relations.len() > 1 {
            for column in model.unresolved_columns() {
                issues.push(LintIssue::new(
                    "AMBIGUOUS_COLUMN",
                    Severity::Warn,
                    format!(
                        "column {} does not resolve to a declared relation",
                        column.column
                    ),
                ));
            }
        }

        // 5. UNFILTERED_LARGE_TABLE
        if !self.large_tables.is_empty() && model.limit.is_none() {
            for relation in &model.relations {
                if self.large_tables.matches(&relation.name)
                    && !model.has_predicate_on(relation.key())
                {
                    issues.push(LintIssue::new(
                        "UNFILTERED_LARGE_TABLE",
                        Severity::Warn,
                        format!(
                            "large table {} is read without a predicate or LIMIT",
                            relation.name
                        ),
                    ));
                }
            }
        }

        // 6. IMPLICIT_CAST_PREDICATE
        for predicate in &model.equality_predicates {
            if predicate.literal == LiteralShape::Text
                && self.numeric_columns.matches(&predicate.column.column)
            {
                issues.push(LintIssue::new(
                    "IMPLICIT_CAST_PREDICATE",
                    Severity::Info,
                    format!(
                        "column {} looks numeric but is compared against a text literal",
                        predicate.column.column
                    ),
                ));
            }
        }

        // 7. UNUSED_JOINED_TABLE
        if !model.has_star_projection() {
            for relation in &model.relations {
                let key = relation.key();
                if !relation_is_used(model, key) {
                    issues.push(LintIssue::new(
                        "UNUSED_JOINED_TABLE",
                        Severity::Warn,
                        format!("relation {} is never referenced", relation.name),
                    ));
                }
            }
        }

        LintReport {
            risk: summarize(&issues),
            issues,
        }
    }
}

fn relation_is_used(model: &QueryModel, key: &str) -> bool {
    let touches = |rel: &Option<String>| rel.as_deref() == Some(key);

    model.projections.iter().any(|p| match p {
        Projection::Column(c) => touches(&c.relation),
        _ => false,
    }) || model
        .equality_predicates
        .iter()
        .any(|p| touches(&p.column.relation))
        || model
            .range_predicates
            .iter()
            .any(|p| touches(&p.column.relation))
        || model.order_keys.iter().any(|k| touches(&k.column.relation))
        || model.group_keys.iter().any(|k| touches(&k.relation))
        || model
            .joins
            .iter()
            .any(|j| j.on_columns.iter().any(|c| touches(&c.relation)))
        || model
            .like_predicates
            .iter()
            .any(|p| touches(&p.column.relation))
}

/// HIGH if any high issue; MEDIUM if at least two warnings; else LOW.
fn summarize(issues: &[LintIssue]) -> RiskLevel {
    if issues.iter().any(|i| i.severity == Severity::High) {
        RiskLevel::High
    } else if issues.iter().filter(|i| i.severity == Severity::Warn).count() >= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse;

    fn rules() -> LintRules {
        LintRules::new(&LintConfig::default())
    }

    fn rules_with_large(patterns: &[&str]) -> LintRules {
        let config = LintConfig {
            large_table_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            ..LintConfig::default()
        };
        LintRules::new(&config)
    }

    fn codes(report: &LintReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn test_select_star() {
        let model = parse("SELECT * FROM orders WHERE user_id = 1").unwrap();
        let report = rules().lint(&model);
        assert_eq!(codes(&report), vec!["SELECT_STAR"]);
        assert_eq!(report.risk, RiskLevel::Low);
    }

    #[test]
    fn test_cartesian_join_from_comma() {
        let model = parse("SELECT a.id, b.id FROM a, b WHERE a.x = 1").unwrap();
        let report = rules().lint(&model);
        assert!(codes(&report).contains(&"CARTESIAN_JOIN"));
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_missing_join_on_implies_cartesian() {
        let model = parse("SELECT a.id FROM a JOIN b ON true").unwrap();
        let report = rules().lint(&model);
        let codes = codes(&report);
        assert!(codes.contains(&"MISSING_JOIN_ON"));
        assert!(codes.contains(&"CARTESIAN_JOIN"));
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_ambiguous_column() {
        let model = parse("SELECT a.id FROM a, b WHERE x = 1").unwrap();
        let report = rules().lint(&model);
        assert!(codes(&report).contains(&"AMBIGUOUS_COLUMN"));
    }

    #[test]
    fn test_unfiltered_large_table() {
        let model = parse("SELECT id FROM events_log").unwrap();
        let report = rules_with_large(&["events_*", "*_log"]).lint(&model);
        assert!(codes(&report).contains(&"UNFILTERED_LARGE_TABLE"));

        // A predicate suppresses the warning.
        let model = parse("SELECT id FROM events_log WHERE id = 1").unwrap();
        let report = rules_with_large(&["*_log"]).lint(&model);
        assert!(!codes(&report).contains(&"UNFILTERED_LARGE_TABLE"));

        // So does a LIMIT.
        let model = parse("SELECT id FROM events_log LIMIT 10").unwrap();
        let report = rules_with_large(&["*_log"]).lint(&model);
        assert!(!codes(&report).contains(&"UNFILTERED_LARGE_TABLE"));
    }

    #[test]
    fn test_implicit_cast_predicate() {
        let model = parse("SELECT * FROM t WHERE user_id = '42'").unwrap();
        let report = rules().lint(&model);
        assert!(codes(&report).contains(&"IMPLICIT_CAST_PREDICATE"));

        let model = parse("SELECT * FROM t WHERE user_id = 42").unwrap();
        let report = rules().lint(&model);
        assert!(!codes(&report).contains(&"IMPLICIT_CAST_PREDICATE"));
    }

    #[test]
    fn test_unused_joined_table() {
        let model =
            parse("SELECT a.id FROM a JOIN b ON a.x = b.x JOIN c ON a.y = a.z").unwrap();
        let report = rules().lint(&model);
        assert!(codes(&report).contains(&"UNUSED_JOINED_TABLE"));
    }

    #[test]
    fn test_star_suppresses_unused_table() {
        let model = parse("SELECT * FROM a JOIN b ON a.x = b.x").unwrap();
        let report = rules().lint(&model);
        assert!(!codes(&report).contains(&"UNUSED_JOINED_TABLE"));
    }

    #[test]
    fn test_parse_error_report() {
        let report = LintReport::parse_error("unexpected token");
        assert_eq!(codes(&report), vec!["PARSE_ERROR"]);
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_non_select_reports_parse_error_issue() {
        let model = parse("INSERT INTO t (a) VALUES (1)").unwrap();
        let report = rules().lint(&model);
        assert_eq!(codes(&report), vec!["PARSE_ERROR"]);
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_two_warnings_mean_medium_risk() {
        let model = parse("SELECT * FROM events_log").unwrap();
        let report = rules_with_large(&["*_log"]).lint(&model);
        // SELECT_STAR + UNFILTERED_LARGE_TABLE
        assert_eq!(report.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_issue_order_follows_rule_order() {
        let model = parse("SELECT * FROM events_log, b WHERE x = '1'").unwrap();
        let report = rules_with_large(&["*_log"]).lint(&model);
        let codes = codes(&report);
        let pos = |c: &str| codes.iter().position(|x| *x == c);
        assert!(pos("SELECT_STAR") < pos("CARTESIAN_JOIN"));
        assert!(pos("CARTESIAN_JOIN") < pos("AMBIGUOUS_COLUMN"));
        assert!(pos("AMBIGUOUS_COLUMN") < pos("UNFILTERED_LARGE_TABLE"));
    }
}
