//! Natural-language explanation seam
//!
//! The engine treats explanation generation as an opaque text producer
//! consulted after core analysis. Failures are never fatal; a missing
//! producer or an `Unavailable` answer simply leaves the explanation out.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Who the explanation is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Beginner,
    Practitioner,
    Dba,
}

/// Options forwarded with an explanation request. Style and length are
/// opaque to the core.
#[derive(Debug, Clone, Deserialize)]
pub struct NlOptions {
    pub audience: Audience,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub length: String,
}

/// The producer declined or failed; callers degrade silently.
#[derive(Debug, Clone, Error)]
#[error("explanation producer unavailable")]
pub struct NlUnavailable;

/// An optional outbound text producer.
#[async_trait]
pub trait ExplanationProducer: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        audience: Audience,
        style: &str,
        length: &str,
    ) -> Result<String, NlUnavailable>;
}
