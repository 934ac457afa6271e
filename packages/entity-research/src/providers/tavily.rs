//! Tavily-powered web search.
//!
//! Calls the Tavily search API and normalizes its results into [`Source`]
//! records. Uses the "advanced" search depth and asks for raw page content
//! so the formatter has something beyond the snippet to work with.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::http;
use crate::error::{ProviderResult, Result};
use crate::security::ApiKey;
use crate::traits::searcher::SearchProvider;
use crate::types::source::Source;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com/";

/// Tavily search request.
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_raw_content: bool,
}

/// Search provider backed by the Tavily API.
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    search_depth: String,
    include_raw_content: bool,
}

impl TavilyProvider {
    /// Registry name.
    pub const NAME: &'static str = "tavily";

    /// Create a provider with the given API key.
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self {
            client: http::client(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            search_depth: "advanced".to_string(),
            include_raw_content: true,
        }
    }

    /// Create from the `TAVILY_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ApiKey::from_env("TAVILY_API_KEY")?))
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    /// Ask for full page content alongside snippets.
    pub fn with_raw_content(mut self, include: bool) -> Self {
        self.include_raw_content = include;
        self
    }

    /// Point at a different API host (proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        http::validate_base_url(Self::NAME, base_url)?;
        self.base_url = base_url.to_string();
        Ok(self)
    }

    fn endpoint(&self) -> ProviderResult<Url> {
        http::endpoint(Self::NAME, &self.base_url, "search")
    }
}

/// Convert a Tavily response body into sources.
///
/// Anything other than an object with a `results` array is zero results.
fn parse_results(body: &Value) -> Vec<Source> {
    http::result_items(TavilyProvider::NAME, body, &["results"])
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            let mut source = Source::new(http::text(item, "title"), http::text(item, "url"))
                .with_snippet(http::text(item, "content"))
                .with_provider(TavilyProvider::NAME);
            if let Some(raw) = item.get("raw_content").and_then(Value::as_str) {
                source = source.with_raw_content(raw);
            }
            source
        })
        .collect()
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>> {
        let request = TavilyRequest {
            query,
            search_depth: &self.search_depth,
            max_results,
            include_raw_content: self.include_raw_content,
        };

        let response = self
            .client
            .post(self.endpoint()?)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e))?;

        let body = http::read_json(Self::NAME, response).await?;
        Ok(parse_results(&body))
    }
}
