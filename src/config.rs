//! Advisor configuration
//!
//! Loading order (priority from highest to lowest):
//! 1. Environment variables (prefixed with APP_)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! The configuration is an explicit value passed by reference into each
//! component; there is no process-wide settings singleton.

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Relations with fewer live tuples than this never receive index advice.
    pub min_rows_for_index: i64,
    /// Cap on the number of columns in one candidate index.
    pub max_index_cols: usize,
    /// Candidates wider than this (estimated bytes per entry) are suppressed.
    pub index_max_width_bytes: i64,
    /// Heuristic pre-filter: candidates below this estimated reduction are dropped.
    pub suppress_low_gain_pct: f64,
    /// Score multiplier applied when a candidate covers a join column.
    pub join_col_prior_boost: f64,
    /// Workload fingerprint count at which a repeated shape is flagged as N+1.
    pub n1_threshold: usize,
    pub whatif: WhatIfConfig,
    pub lint: LintConfig,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            min_rows_for_index: 10_000,
            max_index_cols: 3,
            index_max_width_bytes: 8192,
            suppress_low_gain_pct: 5.0,
            join_col_prior_boost: 1.2,
            n1_threshold: 10,
            whatif: WhatIfConfig::default(),
            lint: LintConfig::default(),
        }
    }
}

/// Hypothetical-index trial configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatIfConfig {
    /// Master switch for cost-based ranking.
    pub enabled: bool,
    /// At most this many candidates are trialed per request.
    pub max_trials: usize,
    /// Bounded worker count; each worker owns its planner session.
    pub parallelism: usize,
    /// Statement timeout applied to each trial's planner call.
    pub trial_timeout_ms: u64,
    /// Wall-clock budget for the whole what-if step.
    pub global_timeout_ms: u64,
    /// Stop dispatching when the best completed reduction stays below this
    /// percentage after half the trials have finished.
    pub early_stop_pct: f64,
    /// Trials below this relative cost reduction are filtered out.
    pub min_cost_reduction_pct: f64,
}

impl Default for WhatIfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_trials: 8,
            parallelism: 2,
            trial_timeout_ms: 4000,
            global_timeout_ms: 12_000,
            early_stop_pct: 2.0,
            min_cost_reduction_pct: 5.0,
        }
    }
}

/// Linter heuristics
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Globs naming relations that are assumed large; scanning one without a
    /// predicate or LIMIT raises a warning.
    pub large_table_patterns: Vec<String>,
    /// Globs naming columns that are assumed numeric; comparing one against a
    /// text literal raises an implicit-cast notice.
    pub numeric_column_patterns: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            large_table_patterns: Vec::new(),
            numeric_column_patterns: vec![
                "*_id".to_string(),
                "*_count".to_string(),
                "*_num".to_string(),
                "*_no".to_string(),
            ],
        }
    }
}

impl AdvisorConfig {
    /// Load configuration from an optional TOML file plus environment
    /// overrides, then validate.
    pub fn load(path: Option<&str>) -> Result<Self, anyhow::Error> {
        let mut config = match path {
            Some(p) => Self::from_toml(p)?,
            None => {
                tracing::debug!("No configuration file given, using defaults");
                AdvisorConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: AdvisorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - APP_MIN_ROWS_FOR_INDEX, APP_MAX_INDEX_COLS, APP_INDEX_MAX_WIDTH_BYTES
    /// - APP_SUPPRESS_LOW_GAIN_PCT, APP_JOIN_COL_PRIOR_BOOST, APP_N1_THRESHOLD
    /// - APP_WHATIF_ENABLED, APP_WHATIF_MAX_TRIALS, APP_WHATIF_PARALLELISM
    /// - APP_WHATIF_TRIAL_TIMEOUT_MS, APP_WHATIF_GLOBAL_TIMEOUT_MS
    /// - APP_WHATIF_EARLY_STOP_PCT, APP_WHATIF_MIN_COST_REDUCTION_PCT
    fn apply_env_overrides(&mut self) {
        fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
            let raw = std::env::var(name).ok()?;
            match raw.parse() {
                Ok(v) => {
                    tracing::info!("Override {} from env: {}", name, raw);
                    Some(v)
                }
                Err(_) => {
                    tracing::warn!("Ignoring unparsable env override {}={}", name, raw);
                    None
                }
            }
        }

        if let Some(v) = parse_env("APP_MIN_ROWS_FOR_INDEX") {
            self.min_rows_for_index = v;
        }
        if let Some(v) = parse_env("APP_MAX_INDEX_COLS") {
            self.max_index_cols = v;
        }
        if let Some(v) = parse_env("APP_INDEX_MAX_WIDTH_BYTES") {
            self.index_max_width_bytes = v;
        }
        if let Some(v) = parse_env("APP_SUPPRESS_LOW_GAIN_PCT") {
            self.suppress_low_gain_pct = v;
        }
        if let Some(v) = parse_env("APP_JOIN_COL_PRIOR_BOOST") {
            self.join_col_prior_boost = v;
        }
        if let Some(v) = parse_env("APP_N1_THRESHOLD") {
            self.n1_threshold = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_ENABLED") {
            self.whatif.enabled = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_MAX_TRIALS") {
            self.whatif.max_trials = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_PARALLELISM") {
            self.whatif.parallelism = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_TRIAL_TIMEOUT_MS") {
            self.whatif.trial_timeout_ms = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_GLOBAL_TIMEOUT_MS") {
            self.whatif.global_timeout_ms = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_EARLY_STOP_PCT") {
            self.whatif.early_stop_pct = v;
        }
        if let Some(v) = parse_env("APP_WHATIF_MIN_COST_REDUCTION_PCT") {
            self.whatif.min_cost_reduction_pct = v;
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_index_cols == 0 {
            anyhow::bail!("max_index_cols must be at least 1");
        }
        if self.index_max_width_bytes <= 0 {
            anyhow::bail!("index_max_width_bytes must be positive");
        }
        if self.whatif.parallelism == 0 {
            anyhow::bail!("whatif.parallelism must be at least 1");
        }
        if self.whatif.max_trials == 0 {
            anyhow::bail!("whatif.max_trials must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.whatif.min_cost_reduction_pct) {
            anyhow::bail!("whatif.min_cost_reduction_pct must be in [0, 100]");
        }
        Ok(())
    }
}
