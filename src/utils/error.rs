//! Library error type
//!
//! Only two error kinds are ever fatal to a request: a SQL statement the
//! parser cannot read at all, and a non-SELECT statement handed to an
//! operation that only advises on SELECT. Every other failure degrades into
//! structured indicators on the response.

use thiserror::Error;

pub type AdvisorResult<T> = Result<T, AdvisorError>;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// The statement could not be parsed into any tree.
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    /// The statement parsed but is not a SELECT.
    #[error("unsupported statement kind: {0}")]
    NonSelect(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = AdvisorError::Syntax("unexpected token".into());
        assert_eq!(e.to_string(), "SQL syntax error: unexpected token");

        let e = AdvisorError::NonSelect("INSERT".into());
        assert_eq!(e.to_string(), "unsupported statement kind: INSERT");
    }
}
