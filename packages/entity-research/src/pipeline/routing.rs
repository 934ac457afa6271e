//! Provider routing: single, fallback chain, hybrid split.
//!
//! A [`RoutingPolicy`] names providers; [`ProviderRoute::resolve`] binds it to
//! concrete providers once per session. Dispatch is organised in lanes: a lane
//! is an ordered provider list plus a cursor. Queries go to the provider under
//! the cursor; when that provider reports itself unavailable the cursor moves
//! on and the same query is retried. Ordinary failures skip the query.

use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::ProviderRegistry;
use crate::traits::rate_limit::RateLimit;
use crate::traits::searcher::SearchProvider;
use crate::types::config::RoutingPolicy;
use crate::types::query::Query;
use crate::types::source::Source;

/// A routing policy bound to concrete providers.
#[derive(Clone)]
pub enum ProviderRoute {
    Single(Arc<dyn SearchProvider>),
    FallbackChain(Vec<Arc<dyn SearchProvider>>),
    HybridSplit {
        primary: Arc<dyn SearchProvider>,
        secondary: Arc<dyn SearchProvider>,
    },
}

impl ProviderRoute {
    /// Bind `policy` to providers from `registry`.
    ///
    /// Unknown names are a configuration error.
    pub fn resolve(policy: &RoutingPolicy, registry: &ProviderRegistry) -> Result<Self> {
        Ok(match policy {
            RoutingPolicy::Single { provider } => Self::Single(registry.require(provider)?),
            RoutingPolicy::FallbackChain { providers } => Self::FallbackChain(
                providers
                    .iter()
                    .map(|name| registry.require(name))
                    .collect::<Result<Vec<_>>>()?,
            ),
            RoutingPolicy::HybridSplit { primary, secondary } => Self::HybridSplit {
                primary: registry.require(primary)?,
                secondary: registry.require(secondary)?,
            },
        })
    }

    pub fn provider_names(&self) -> Vec<String> {
        match self {
            Self::Single(p) => vec![p.name().to_string()],
            Self::FallbackChain(ps) => ps.iter().map(|p| p.name().to_string()).collect(),
            Self::HybridSplit { primary, secondary } => {
                vec![primary.name().to_string(), secondary.name().to_string()]
            }
        }
    }

    /// Run `queries` through the route. Reports come back in query order.
    pub(crate) async fn dispatch(
        &self,
        queries: &[Query],
        ctx: &DispatchContext<'_>,
    ) -> Vec<QueryReport> {
        if queries.is_empty() {
            return Vec::new();
        }

        match self {
            Self::Single(provider) => Lane::new(vec![provider.clone()]).run(queries, ctx).await,
            Self::FallbackChain(providers) => {
                // substitution depends on order
                let sequential = DispatchContext {
                    concurrency: 1,
                    ..*ctx
                };
                Lane::new(providers.clone()).run(queries, &sequential).await
            }
            Self::HybridSplit { primary, secondary } => {
                let (first, second) = queries.split_at(queries.len() / 2);
                let primary_lane = Lane::new(vec![primary.clone(), secondary.clone()]);
                let secondary_lane = Lane::new(vec![secondary.clone(), primary.clone()]);

                let (mut reports, rest) = if ctx.concurrency > 1 {
                    futures::join!(primary_lane.run(first, ctx), secondary_lane.run(second, ctx))
                } else {
                    let a = primary_lane.run(first, ctx).await;
                    let b = secondary_lane.run(second, ctx).await;
                    (a, b)
                };
                reports.extend(rest);
                reports
            }
        }
    }
}

impl std::fmt::Debug for ProviderRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Single(_) => "Single",
            Self::FallbackChain(_) => "FallbackChain",
            Self::HybridSplit { .. } => "HybridSplit",
        };
        f.debug_struct("ProviderRoute")
            .field("kind", &kind)
            .field("providers", &self.provider_names())
            .finish()
    }
}

/// Per-batch dispatch settings.
#[derive(Clone, Copy)]
pub(crate) struct DispatchContext<'a> {
    pub rate_limit: &'a dyn RateLimit,
    pub max_results: usize,
    pub concurrency: usize,
}

/// What happened to one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    pub query: Query,

    /// Provider that answered, or the last one tried
    pub provider: String,

    /// Hits returned, tagged with `provider`
    pub sources: Vec<Source>,

    /// Why the query was skipped
    pub error: Option<String>,
}

impl QueryReport {
    pub fn is_skipped(&self) -> bool {
        self.error.is_some()
    }
}

struct Lane {
    providers: Vec<Arc<dyn SearchProvider>>,
    cursor: AtomicUsize,
}

impl Lane {
    fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self {
            providers,
            cursor: AtomicUsize::new(0),
        }
    }

    async fn run(&self, queries: &[Query], ctx: &DispatchContext<'_>) -> Vec<QueryReport> {
        // built up front: a borrowing map closure would make the session future !Send
        let pending: Vec<_> = queries.iter().map(|query| self.run_query(query, ctx)).collect();

        // buffered keeps query order regardless of completion order
        stream::iter(pending)
            .buffered(ctx.concurrency.max(1))
            .collect()
            .await
    }

    async fn run_query(&self, query: &Query, ctx: &DispatchContext<'_>) -> QueryReport {
        loop {
            let idx = self.cursor.load(Ordering::SeqCst);
            let Some(provider) = self.providers.get(idx) else {
                let last = self
                    .providers
                    .last()
                    .map(|p| p.name().to_string())
                    .unwrap_or_default();
                tracing::warn!(query = %query, "No search provider available, skipping query");
                return QueryReport {
                    query: query.clone(),
                    provider: last,
                    sources: Vec::new(),
                    error: Some("no search provider available".to_string()),
                };
            };

            ctx.rate_limit.acquire().await;
            match provider.search(&query.text, ctx.max_results).await {
                Ok(mut hits) => {
                    hits.truncate(ctx.max_results);
                    for hit in &mut hits {
                        hit.provider = provider.name().to_string();
                    }
                    tracing::debug!(
                        provider = provider.name(),
                        query = %query,
                        hits = hits.len(),
                        "Search completed"
                    );
                    return QueryReport {
                        query: query.clone(),
                        provider: provider.name().to_string(),
                        sources: hits,
                        error: None,
                    };
                }
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(
                        provider = provider.name(),
                        query = %query,
                        error = %e,
                        "Search provider unavailable, switching to next provider"
                    );
                    // another in-flight query may already have advanced it
                    let _ = self.cursor.compare_exchange(
                        idx,
                        idx + 1,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        query = %query,
                        error = %e,
                        "Search failed, skipping query"
                    );
                    return QueryReport {
                        query: query.clone(),
                        provider: provider.name().to_string(),
                        sources: Vec::new(),
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSearchProvider;
    use crate::traits::rate_limit::NoRateLimit;

    fn queries(n: usize) -> Vec<Query> {
        (0..n).map(|i| Query::initial(format!("q{i}"))).collect()
    }

    fn ctx(concurrency: usize) -> DispatchContext<'static> {
        DispatchContext {
            rate_limit: &NoRateLimit,
            max_results: 3,
            concurrency,
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_provider() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(MockSearchProvider::new("tavily")));
        let err = ProviderRoute::resolve(&RoutingPolicy::hybrid_split("tavily", "google"), &registry)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_single_preserves_order_with_concurrency() {
        let provider = MockSearchProvider::new("tavily").with_generated_results(1);
        let route = ProviderRoute::Single(Arc::new(provider.clone()));

        let reports = route.dispatch(&queries(5), &ctx(4)).await;

        let order: Vec<_> = reports.iter().map(|r| r.query.text.as_str()).collect();
        assert_eq!(order, vec!["q0", "q1", "q2", "q3", "q4"]);
        assert_eq!(provider.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_hits_tagged_and_capped() {
        let provider = MockSearchProvider::new("brave").with_generated_results(10);
        let route = ProviderRoute::Single(Arc::new(provider));

        let reports = route.dispatch(&queries(1), &ctx(1)).await;

        assert_eq!(reports[0].sources.len(), 3);
        assert!(reports[0].sources.iter().all(|s| s.provider == "brave"));
    }

    #[tokio::test]
    async fn test_fallback_substitutes_and_sticks() {
        let a = MockSearchProvider::new("a").unavailable();
        let b = MockSearchProvider::new("b").with_generated_results(1);
        let route = ProviderRoute::FallbackChain(vec![Arc::new(a.clone()), Arc::new(b.clone())]);

        let reports = route.dispatch(&queries(3), &ctx(4)).await;

        // a tried once, b answers every query including the one a refused
        assert_eq!(a.calls().len(), 1);
        assert_eq!(b.calls().len(), 3);
        assert!(reports.iter().all(|r| r.provider == "b" && !r.is_skipped()));
    }

    #[tokio::test]
    async fn test_exhausted_chain_skips_without_calls() {
        let a = MockSearchProvider::new("a").unavailable();
        let route = ProviderRoute::Single(Arc::new(a.clone()));

        let reports = route.dispatch(&queries(3), &ctx(1)).await;

        assert_eq!(a.calls().len(), 1);
        assert!(reports.iter().all(QueryReport::is_skipped));
    }

    #[tokio::test]
    async fn test_hybrid_split_halves() {
        let a = MockSearchProvider::new("a").with_generated_results(1);
        let b = MockSearchProvider::new("b").with_generated_results(1);
        let route = ProviderRoute::HybridSplit {
            primary: Arc::new(a.clone()),
            secondary: Arc::new(b.clone()),
        };

        let reports = route.dispatch(&queries(7), &ctx(1)).await;

        assert_eq!(a.queries(), vec!["q0", "q1", "q2"]);
        assert_eq!(b.queries(), vec!["q3", "q4", "q5", "q6"]);
        let order: Vec<_> = reports.iter().map(|r| r.query.text.as_str()).collect();
        assert_eq!(order, vec!["q0", "q1", "q2", "q3", "q4", "q5", "q6"]);
    }

    #[tokio::test]
    async fn test_hybrid_reroutes_unavailable_side() {
        let a = MockSearchProvider::new("a").with_generated_results(1);
        let b = MockSearchProvider::new("b").unavailable();
        let route = ProviderRoute::HybridSplit {
            primary: Arc::new(a.clone()),
            secondary: Arc::new(b.clone()),
        };

        let reports = route.dispatch(&queries(4), &ctx(1)).await;

        assert_eq!(a.queries(), vec!["q0", "q1", "q2", "q3"]);
        assert!(reports.iter().all(|r| !r.is_skipped()));
    }

    #[tokio::test]
    async fn test_hybrid_does_not_reroute_ordinary_failures() {
        let a = MockSearchProvider::new("a").with_generated_results(1).fail_query("q0");
        let b = MockSearchProvider::new("b").with_generated_results(1);
        let route = ProviderRoute::HybridSplit {
            primary: Arc::new(a.clone()),
            secondary: Arc::new(b.clone()),
        };

        let reports = route.dispatch(&queries(2), &ctx(1)).await;

        assert!(reports[0].is_skipped());
        assert_eq!(b.queries(), vec!["q1"]);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let a = MockSearchProvider::new("a");
        let route = ProviderRoute::Single(Arc::new(a.clone()));
        assert!(route.dispatch(&[], &ctx(1)).await.is_empty());
        assert!(a.calls().is_empty());
    }
}
