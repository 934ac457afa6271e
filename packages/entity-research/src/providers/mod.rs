//! Search provider implementations and the name → provider registry.

pub mod brave;
pub mod google;
mod http;
pub mod serpapi;
pub mod tavily;

pub use brave::BraveProvider;
pub use google::GoogleProvider;
pub use serpapi::SerpApiProvider;
pub use tavily::TavilyProvider;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ResearchError, Result};
use crate::traits::searcher::{SearchProvider, UnconfiguredProvider};

/// Providers addressable by name from a [`crate::RoutingPolicy`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers: tavily, brave, serpapi, google.
    ///
    /// A provider whose credentials are missing is still registered, as an
    /// [`UnconfiguredProvider`], so fallback chains can route around it.
    pub fn from_env() -> Self {
        Self::new()
            .with_provider(configured(TavilyProvider::NAME, TavilyProvider::from_env()))
            .with_provider(configured(BraveProvider::NAME, BraveProvider::from_env()))
            .with_provider(configured(SerpApiProvider::NAME, SerpApiProvider::from_env()))
            .with_provider(configured(GoogleProvider::NAME, GoogleProvider::from_env()))
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.get(name).cloned()
    }

    /// Look up a provider, failing with a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<dyn SearchProvider>> {
        self.get(name).ok_or_else(|| {
            let mut known: Vec<&str> = self.names().collect();
            known.sort_unstable();
            ResearchError::config(format!(
                "unknown search provider '{name}' (registered: {})",
                known.join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn configured<P>(name: &str, provider: Result<P>) -> Arc<dyn SearchProvider>
where
    P: SearchProvider + 'static,
{
    match provider {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::warn!(provider = name, error = %e, "Search provider is not configured");
            Arc::new(UnconfiguredProvider::new(name, e.to_string()))
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}
