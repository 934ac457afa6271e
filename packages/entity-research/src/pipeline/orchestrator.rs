//! Search orchestration: route a query batch, dedup, format.

use std::sync::Arc;

use crate::pipeline::dedup::deduplicate_batches;
use crate::pipeline::format::{format_sources, FormatOptions};
use crate::pipeline::routing::{DispatchContext, ProviderRoute, QueryReport};
use crate::traits::rate_limit::RateLimit;
use crate::types::config::ResearchConfig;
use crate::types::query::Query;
use crate::types::source::Source;

/// Per-batch search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Result cap per query
    pub max_results: usize,

    /// Queries in flight at once on one provider
    pub concurrency: usize,

    pub format: FormatOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for SearchOptions {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            max_results: config.max_search_results,
            concurrency: config.search_concurrency,
            format: FormatOptions::new(config.include_raw_content, config.max_tokens_per_source),
        }
    }
}

/// Everything one batch produced.
#[derive(Debug, Clone)]
pub struct SearchOutput {
    /// One report per query, in query order
    pub reports: Vec<QueryReport>,

    /// Hits before dedup
    pub raw_hits: usize,

    /// Unique sources in first-occurrence order
    pub sources: Vec<Source>,

    /// Formatted digest of `sources`
    pub digest: String,
}

impl SearchOutput {
    /// Queries that produced no result because they failed.
    pub fn skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Runs query batches through a resolved provider route.
#[derive(Clone)]
pub struct SearchOrchestrator {
    route: ProviderRoute,
    rate_limit: Arc<dyn RateLimit>,
}

impl SearchOrchestrator {
    pub fn new(route: ProviderRoute, rate_limit: Arc<dyn RateLimit>) -> Self {
        Self { route, rate_limit }
    }

    pub fn route(&self) -> &ProviderRoute {
        &self.route
    }

    /// Search every query, then dedup and format the hits.
    ///
    /// Never fails: failed queries are skipped and reported. An empty batch
    /// makes no provider calls.
    pub async fn search(&self, queries: &[Query], options: &SearchOptions) -> SearchOutput {
        let ctx = DispatchContext {
            rate_limit: self.rate_limit.as_ref(),
            max_results: options.max_results,
            concurrency: options.concurrency,
        };

        let reports = self.route.dispatch(queries, &ctx).await;
        let raw_hits = reports.iter().map(|r| r.sources.len()).sum();
        let sources = deduplicate_batches(reports.iter().map(|r| r.sources.iter().cloned()));
        let digest = format_sources(&sources, options.format);

        let output = SearchOutput {
            reports,
            raw_hits,
            sources,
            digest,
        };

        tracing::info!(
            queries = queries.len(),
            raw_hits = output.raw_hits,
            unique = output.sources.len(),
            skipped = output.skipped(),
            "Search batch complete"
        );

        output
    }
}
