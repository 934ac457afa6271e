//! Search provider trait.
//!
//! One implementation per search vendor (Tavily, Brave, a local index, ...).
//! Each implementation normalizes its vendor's response into [`Source`]
//! records, so nothing downstream branches on response shape.
//!
//! # Failure contract
//!
//! - [`ProviderError::Unavailable`] means the backing client cannot serve at
//!   all. Fallback routes substitute the next provider for the rest of the
//!   batch.
//! - Any other [`ProviderError`] means this one query failed; it is skipped.
//! - A response that is not a result list is zero results, not an error.
//!
//! ```rust,ignore
//! let provider = TavilyProvider::from_env();
//! let hits = provider.search("Acme Corp headquarters", 3).await?;
//! for hit in hits {
//!     println!("{} - {}", hit.url, hit.title);
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ProviderError, ProviderResult};
use crate::types::source::Source;

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Registry name, also used as the provider tag on returned sources.
    fn name(&self) -> &str;

    /// Run one query, returning at most `max_results` sources.
    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>>;
}

#[async_trait]
impl<P: SearchProvider + ?Sized> SearchProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>> {
        (**self).search(query, max_results).await
    }
}

/// Stand-in for a provider whose client could not be built.
///
/// Every call reports [`ProviderError::Unavailable`], which lets a fallback
/// chain move on without special-casing missing credentials.
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    name: String,
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str, _max_results: usize) -> ProviderResult<Vec<Source>> {
        Err(ProviderError::unavailable(&self.name, &self.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_provider_is_unavailable() {
        let provider = UnconfiguredProvider::new("brave", "BRAVE_API_KEY not set");
        let err = provider.search("anything", 3).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.provider(), "brave");
    }

    #[tokio::test]
    async fn test_arc_forwards() {
        let provider: Arc<dyn SearchProvider> =
            Arc::new(UnconfiguredProvider::new("tavily", "missing key"));
        assert_eq!(provider.name(), "tavily");
        assert!(provider.search("q", 1).await.is_err());
    }
}
