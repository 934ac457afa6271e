//! Typed errors for the research library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only [`ResearchError::Configuration`] is fatal. Everything else is caught
//! at the boundary of the component that raised it and degraded to an empty
//! or placeholder value.

use thiserror::Error;

/// Top-level errors surfaced by the research library.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Invalid schema, limits, or provider routing. Rejects session creation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Search provider failed
    #[error("search provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Completion service failed
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Model output could not be interpreted
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ResearchError {
    /// Shorthand for a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Shorthand for a malformed-response error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Whether this error must abort before a session starts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Errors raised by a single search provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call failed; skip this query and continue the batch.
    #[error("{provider} search failed: {reason}")]
    Failed { provider: String, reason: String },

    /// The call timed out; skip this query.
    #[error("{provider} search timed out")]
    Timeout { provider: String },

    /// The response could not be normalized into sources.
    #[error("{provider} returned a malformed response: {reason}")]
    Malformed { provider: String, reason: String },

    /// The backing client cannot serve requests at all (missing key,
    /// rejected credentials, unreachable). Routes substitute a fallback.
    #[error("{provider} is unavailable: {reason}")]
    Unavailable { provider: String, reason: String },
}

impl ProviderError {
    /// Create a `Failed` error.
    pub fn failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create an `Unavailable` error.
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Whether a fallback provider should take over.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Name of the provider that raised the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Failed { provider, .. }
            | Self::Timeout { provider }
            | Self::Malformed { provider, .. }
            | Self::Unavailable { provider, .. } => provider,
        }
    }
}

/// Errors raised by the text-completion service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport-level failure
    #[error("request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success HTTP status
    #[error("completion API returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// The service answered without any text
    #[error("completion returned no content")]
    EmptyResponse,

    /// The service is not configured
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for research operations.
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Result type alias for completion calls.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(ResearchError::config("bad schema").is_fatal());
        assert!(!ResearchError::malformed("not json").is_fatal());
        assert!(!ResearchError::from(ModelError::EmptyResponse).is_fatal());
        assert!(!ResearchError::from(ProviderError::failed("tavily", "500")).is_fatal());
    }

    #[test]
    fn test_provider_error_accessors() {
        let err = ProviderError::unavailable("tavily", "TAVILY_API_KEY not set");
        assert!(err.is_unavailable());
        assert_eq!(err.provider(), "tavily");
        assert_eq!(
            err.to_string(),
            "tavily is unavailable: TAVILY_API_KEY not set"
        );

        let timeout = ProviderError::Timeout {
            provider: "brave".to_string(),
        };
        assert!(!timeout.is_unavailable());
        assert_eq!(timeout.provider(), "brave");
    }
}
