//! Index advisor
//!
//! Synthesizes candidate B-tree indexes per relation with the fixed column
//! ordering equality, then range, then order/group. Candidates are deduped
//! against existing indexes, filtered by relation size and width, and scored
//! heuristically. The what-if evaluator may later attach measured costs.

use crate::analyzer::suggestion::{Impact, IndexAdvice, IndexCandidate, SourceMask, Suggestion, SuggestionKind};
use crate::config::AdvisorConfig;
use crate::model::{QueryModel, Relation, SortDirection};
use crate::schema::SchemaSnapshot;
use crate::utils::round3;

/// Produce index advice for one query model, ordered by descending score,
/// then ascending title.
pub fn advise(
    model: &QueryModel,
    schema: &SchemaSnapshot,
    config: &AdvisorConfig,
) -> Vec<IndexAdvice> {
    if !model.is_select() {
        return Vec::new();
    }

    let mut candidates: Vec<IndexCandidate> = Vec::new();
    for relation in &model.relations {
        if let Some(candidate) = candidate_for(model, schema, config, relation) {
            // Same identity from another alias of the relation: merge masks.
            match candidates
                .iter_mut()
                .find(|c| c.identity() == candidate.identity())
            {
                Some(existing) => existing.sources = existing.sources.union(candidate.sources),
                None => candidates.push(candidate),
            }
        }
    }

    let mut advice: Vec<IndexAdvice> = candidates
        .into_iter()
        .filter_map(|c| score_candidate(model, schema, config, c))
        .collect();

    advice.sort_by(|a, b| {
        b.suggestion
            .score
            .unwrap_or(0.0)
            .total_cmp(&a.suggestion.score.unwrap_or(0.0))
            .then_with(|| a.suggestion.title.cmp(&b.suggestion.title))
    });
    advice
}

/// Build the candidate column list for one relation, or nothing when the
/// relation is too small or contributes no usable columns.
fn candidate_for(
    model: &QueryModel,
    schema: &SchemaSnapshot,
    config: &AdvisorConfig,
    relation: &Relation,
) -> Option<IndexCandidate> {
    let key = relation.key();

    if schema.row_estimate(&relation.name) < config.min_rows_for_index {
        return None;
    }

    let on_relation = |rel: &Option<String>| rel.as_deref() == Some(key);

    // Column pools in model order. Ambiguous references are skipped.
    let equality: Vec<&str> = model
        .equality_predicates
        .iter()
        .filter(|p| on_relation(&p.column.relation))
        .map(|p| p.column.column.as_str())
        .collect();
    let range: Vec<&str> = model
        .range_predicates
        .iter()
        .filter(|p| on_relation(&p.column.relation))
        .map(|p| p.column.column.as_str())
        .collect();
    let order: Vec<(&str, SortDirection)> = model
        .order_keys
        .iter()
        .filter(|k| on_relation(&k.column.relation))
        .map(|k| (k.column.column.as_str(), k.direction))
        .collect();
    let group: Vec<&str> = model
        .group_keys
        .iter()
        .filter(|k| on_relation(&k.relation))
        .map(|k| k.column.as_str())
        .collect();

    // L = dedup(E ++ Rg ++ (O ∪ G)), truncated to the column cap.
    let mut columns: Vec<String> = Vec::new();
    let mut directions: Vec<SortDirection> = Vec::new();
    let mut sources = SourceMask::default();
    let mut push = |col: &str, direction: SortDirection, source: SourceMask| {
        if !columns.iter().any(|c| c == col) && columns.len() < config.max_index_cols {
            columns.push(col.to_string());
            directions.push(direction);
        }
        if columns.iter().any(|c| c == col) {
            sources = sources.union(source);
        }
    };
    for &col in &equality {
        push(col, SortDirection::Asc, SourceMask::EQUALITY);
    }
    for &col in &range {
        push(col, SortDirection::Asc, SourceMask::RANGE);
    }
    for &(col, direction) in &order {
        push(col, direction, SourceMask::ORDER);
    }
    for &col in &group {
        push(col, SortDirection::Asc, SourceMask::ORDER);
    }

    if columns.is_empty() {
        return None;
    }

    // A vector whose order-key positions are uniformly descending is served
    // by a backward index scan, so it normalizes to the default.
    let order_positions: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| order.iter().any(|(oc, _)| oc == c))
        .map(|(i, _)| i)
        .collect();
    if !order_positions.is_empty()
        && order_positions
            .iter()
            .all(|i| directions[*i] == SortDirection::Desc)
        && directions
            .iter()
            .enumerate()
            .all(|(i, d)| order_positions.contains(&i) || *d == SortDirection::Asc)
    {
        for i in &order_positions {
            directions[*i] = SortDirection::Asc;
        }
    }
    if directions.iter().all(|d| *d == SortDirection::Asc) {
        directions.clear();
    }

    for edge in &model.joins {
        if edge
            .on_columns
            .iter()
            .any(|c| on_relation(&c.relation) && columns.contains(&c.column))
        {
            sources = sources.union(SourceMask::JOIN);
        }
    }

    let candidate = IndexCandidate {
        relation: relation.name.clone(),
        columns,
        directions,
        sources,
    };

    // Reject when an existing index already has the candidate as a prefix,
    // under direction equivalence.
    let existing_covers = schema.table(&relation.name).is_some_and(|t| {
        t.indexes.iter().any(|ix| {
            ix.columns.len() >= candidate.columns.len()
                && candidate.columns.iter().enumerate().all(|(i, col)| {
                    ix.columns[i] == *col
                        && ix.directions.get(i).copied().unwrap_or(SortDirection::Asc)
                            == candidate
                                .directions
                                .get(i)
                                .copied()
                                .unwrap_or(SortDirection::Asc)
                })
        })
    });
    if existing_covers {
        tracing::debug!(
            "Candidate {} covered by an existing index",
            candidate.identity()
        );
        return None;
    }

    Some(candidate)
}

/// Width estimate, scoring and packaging into a suggestion.
fn score_candidate(
    model: &QueryModel,
    schema: &SchemaSnapshot,
    config: &AdvisorConfig,
    candidate: IndexCandidate,
) -> Option<IndexAdvice> {
    let width: i64 = candidate
        .columns
        .iter()
        .map(|col| {
            schema
                .column(&candidate.relation, col)
                .map(|c| c.width())
                .unwrap_or(8)
        })
        .sum();
    if width > config.index_max_width_bytes {
        return None;
    }

    // Membership counts against the clause pools, by column name.
    let in_pool = |col: &str, pool: &[String]| pool.iter().any(|c| c == col);
    let equality_pool: Vec<String> = model
        .equality_predicates
        .iter()
        .filter(|p| relation_matches(model, &p.column.relation, &candidate.relation))
        .map(|p| p.column.column.clone())
        .collect();
    let range_pool: Vec<String> = model
        .range_predicates
        .iter()
        .filter(|p| relation_matches(model, &p.column.relation, &candidate.relation))
        .map(|p| p.column.column.clone())
        .collect();
    let order_pool: Vec<String> = model
        .order_keys
        .iter()
        .filter(|k| relation_matches(model, &k.column.relation, &candidate.relation))
        .map(|k| k.column.column.clone())
        .collect();
    let group_pool: Vec<String> = model
        .group_keys
        .iter()
        .filter(|k| relation_matches(model, &k.relation, &candidate.relation))
        .map(|k| k.column.clone())
        .collect();

    let eq_hits = candidate
        .columns
        .iter()
        .filter(|c| in_pool(c, &equality_pool))
        .count();
    let range_hits = candidate
        .columns
        .iter()
        .filter(|c| in_pool(c, &range_pool) && !in_pool(c, &equality_pool))
        .count();
    let order_hits = candidate
        .columns
        .iter()
        .filter(|c| in_pool(c, &order_pool) || in_pool(c, &group_pool))
        .count();
    let order_key_hits = candidate
        .columns
        .iter()
        .filter(|c| in_pool(c, &order_pool))
        .count();

    let join_boost = if candidate.sources.contains(SourceMask::JOIN) {
        config.join_col_prior_boost
    } else {
        1.0
    };
    let width_penalty = (config.index_max_width_bytes as f64 / (width.max(1)) as f64)
        .sqrt()
        .max(0.1);
    let score =
        (1.0 * eq_hits as f64 + 0.5 * range_hits as f64 + 0.25 * order_hits as f64) * join_boost
            * width_penalty;

    let est_reduction_pct = f64::min(
        100.0,
        10.0 * eq_hits as f64 + if order_key_hits > 0 { 5.0 } else { 0.0 },
    );
    if est_reduction_pct < config.suppress_low_gain_pct {
        return None;
    }

    let impact = if eq_hits > 0 && order_hits > 0 {
        Impact::High
    } else {
        Impact::Medium
    };
    let confidence = if order_key_hits > 0 { 0.700 } else { 0.600 };

    let suggestion = Suggestion {
        kind: SuggestionKind::Index,
        title: candidate.title(),
        rationale: format!(
            "covers {} equality, {} range and {} order/group column(s) referenced on {}",
            eq_hits, range_hits, order_hits, candidate.relation
        ),
        impact,
        confidence: round3(confidence),
        statements: vec![candidate.ddl()],
        alt_sql: None,
        source_sql: None,
        score: Some(round3(score)),
        est_reduction_pct: Some(round3(est_reduction_pct)),
        est_index_width_bytes: Some(width),
        est_cost_before: None,
        est_cost_after: None,
        est_cost_delta: None,
    };

    Some(IndexAdvice {
        candidate,
        suggestion,
    })
}

/// True when a predicate's relation key refers to the candidate's relation.
fn relation_matches(model: &QueryModel, key: &Option<String>, relation: &str) -> bool {
    key.as_deref()
        .and_then(|k| model.relation_name(k))
        .is_some_and(|name| name == relation)
}
