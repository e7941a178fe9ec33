//! Glob pattern lists for linter heuristics
//!
//! Patterns use shell-style `*` and `?` wildcards and match case-insensitively
//! against the whole identifier. Compiled once per configuration value.

use regex::Regex;

/// A compiled list of glob patterns.
#[derive(Debug, Clone, Default)]
pub struct GlobList {
    patterns: Vec<Regex>,
}

impl GlobList {
    /// Compile a list of glob patterns. Invalid patterns are dropped with a
    /// warning rather than failing the whole configuration.
    pub fn compile(globs: &[String]) -> Self {
        let patterns = globs
            .iter()
            .filter_map(|g| match Regex::new(&glob_to_regex(g)) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Ignoring invalid glob pattern {:?}: {}", g, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whole-string, case-insensitive match against any pattern in the list.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push_str("(?i)^");
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_suffix() {
        let list = GlobList::compile(&["*_log".to_string()]);
        assert!(list.matches("audit_log"));
        assert!(list.matches("AUDIT_LOG"));
        assert!(!list.matches("audit_logs"));
    }

    #[test]
    fn test_star_prefix() {
        let list = GlobList::compile(&["events*".to_string()]);
        assert!(list.matches("events"));
        assert!(list.matches("events_2024"));
        assert!(!list.matches("user_events"));
    }

    #[test]
    fn test_question_mark() {
        let list = GlobList::compile(&["t?".to_string()]);
        assert!(list.matches("t1"));
        assert!(!list.matches("t12"));
    }

    #[test]
    fn test_literal_dots_escaped() {
        let list = GlobList::compile(&["a.b".to_string()]);
        assert!(list.matches("a.b"));
        assert!(!list.matches("aXb"));
    }

    #[test]
    fn test_empty_list() {
        let list = GlobList::compile(&[]);
        assert!(list.is_empty());
        assert!(!list.matches("anything"));
    }

    #[test]
    fn test_invalid_pattern_dropped() {
        // glob_to_regex escapes everything except * and ?, so any glob
        // compiles; an empty glob still only matches the empty string
        let list = GlobList::compile(&["".to_string()]);
        assert!(list.matches(""));
        assert!(!list.matches("x"));
    }
}
