//! Google Programmable Search (Custom Search JSON API).

use async_trait::async_trait;
use serde_json::Value;

use super::http;
use crate::error::{ProviderResult, Result};
use crate::security::ApiKey;
use crate::traits::searcher::SearchProvider;
use crate::types::source::Source;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/";

/// The API returns at most 10 items per request.
const MAX_NUM: usize = 10;

/// Search provider backed by a Google Programmable Search engine.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: ApiKey,
    engine_id: String,
    base_url: String,
}

impl GoogleProvider {
    pub const NAME: &'static str = "google";

    /// Create a provider for the search engine `engine_id` (the `cx` id).
    pub fn new(api_key: impl Into<ApiKey>, engine_id: impl Into<String>) -> Self {
        Self {
            client: http::client(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from `GOOGLE_API_KEY` and `GOOGLE_CSE_ID`.
    pub fn from_env() -> Result<Self> {
        let api_key = ApiKey::from_env("GOOGLE_API_KEY")?;
        let engine_id = ApiKey::from_env("GOOGLE_CSE_ID")?;
        Ok(Self::new(api_key, engine_id.expose()))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        http::validate_base_url(Self::NAME, base_url)?;
        self.base_url = base_url.to_string();
        Ok(self)
    }

    fn request(&self, query: &str, max_results: usize) -> ProviderResult<reqwest::RequestBuilder> {
        let url = http::endpoint(Self::NAME, &self.base_url, "customsearch/v1")?;
        Ok(self.client.get(url).query(&[
            ("key", self.api_key.expose().to_string()),
            ("cx", self.engine_id.clone()),
            ("q", query.to_string()),
            ("num", max_results.clamp(1, MAX_NUM).to_string()),
        ]))
    }
}

/// Sources from `items`. A query with no hits has no `items` key at all.
fn parse_results(body: &Value) -> Vec<Source> {
    if body.get("items").is_none() {
        return Vec::new();
    }
    http::result_items(GoogleProvider::NAME, body, &["items"])
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            Source::new(http::text(item, "title"), http::text(item, "link"))
                .with_snippet(http::text(item, "snippet"))
                .with_provider(GoogleProvider::NAME)
        })
        .collect()
}

#[async_trait]
impl SearchProvider for GoogleProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>> {
        let response = self
            .request(query, max_results)?
            .send()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e.without_url()))?;

        let body = http::read_json(Self::NAME, response).await?;
        Ok(parse_results(&body))
    }
}
