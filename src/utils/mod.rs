pub mod error;
pub mod glob;
pub mod round;

pub use error::{AdvisorError, AdvisorResult};
pub use glob::GlobList;
pub use round::{round3, round3_opt};

/// Quote an identifier for rendering into SQL or DDL text.
///
/// Identifiers that are already plain lowercase names are emitted verbatim;
/// anything else (mixed case preserved from a quoted source identifier,
/// reserved characters) is double-quoted.
pub fn quote_ident(ident: &str) -> String {
    let plain = !ident.is_empty()
        && ident
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Install a global tracing subscriber honoring `RUST_LOG`-style filters.
///
/// Embedders call this once at startup; the library itself only emits events.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_plain() {
        assert_eq!(quote_ident("orders"), "orders");
        assert_eq!(quote_ident("user_id2"), "user_id2");
        assert_eq!(quote_ident("_tmp"), "_tmp");
    }

    #[test]
    fn test_quote_ident_mixed_case() {
        assert_eq!(quote_ident("Orders"), "\"Orders\"");
        assert_eq!(quote_ident("userId"), "\"userId\"");
    }

    #[test]
    fn test_quote_ident_reserved_chars() {
        assert_eq!(quote_ident("my table"), "\"my table\"");
        assert_eq!(quote_ident("1st"), "\"1st\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
