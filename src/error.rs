//! Error taxonomy for the pipeline.
//!
//! Only `ValidationError` and `PipelineError` are user-visible.
//! `ProviderError` and `ParseError` are recoverable and are absorbed at
//! stage boundaries by each stage's degraded-output policy: a placeholder
//! report, an unchanged report, a fail-open approval, or a computed
//! fallback synthesis.

use thiserror::Error;

/// Failure of a reasoning-provider call (transport, auth, rate limits).
///
/// Always recoverable at the per-item level - a provider error never
/// crosses a stage boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cannot connect to provider at {url}")]
    Connection { url: String },

    #[error("provider API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

/// Structured output did not decode into the expected shape.
///
/// Recoverable - each stage defines its own fallback.
#[derive(Debug, Error)]
#[error("failed to parse structured output: {reason}")]
pub struct ParseError {
    pub reason: String,
    /// Raw response text, kept for the audit trail.
    pub raw: String,
}

/// Malformed input, rejected before the pipeline runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("exactly 5 responses are required, got {got}")]
    WrongResponseCount { got: usize },

    #[error("response {index} is empty")]
    EmptyResponse { index: usize },
}

/// Example retrieval failure.
#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("no examples for specialist id {0} (must be 1-5)")]
    NotFound(u8),

    #[error("failed to load casebook: {0}")]
    Load(String),
}

/// Unexpected condition inside the coordinator, surfaced to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("pipeline failed: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Timeout { seconds: 30 };
        assert_eq!(err.to_string(), "request timed out after 30s");

        let err = ProviderError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_validation_error_wraps_into_pipeline_error() {
        let err: PipelineError = ValidationError::WrongResponseCount { got: 2 }.into();
        assert!(err.to_string().contains("exactly 5 responses"));
    }
}
