//! Google results through SerpAPI.

use async_trait::async_trait;
use serde_json::Value;

use super::http;
use crate::error::{ProviderError, ProviderResult, Result};
use crate::security::ApiKey;
use crate::traits::searcher::SearchProvider;
use crate::types::source::Source;

const DEFAULT_BASE_URL: &str = "https://serpapi.com/";

/// Search provider backed by SerpAPI's Google engine.
#[derive(Debug, Clone)]
pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    engine: String,
}

impl SerpApiProvider {
    pub const NAME: &'static str = "serpapi";

    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self {
            client: http::client(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            engine: "google".to_string(),
        }
    }

    /// Create from the `SERPAPI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ApiKey::from_env("SERPAPI_API_KEY")?))
    }

    /// SerpAPI engine (default: google).
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        http::validate_base_url(Self::NAME, base_url)?;
        self.base_url = base_url.to_string();
        Ok(self)
    }

    fn request(&self, query: &str, max_results: usize) -> ProviderResult<reqwest::RequestBuilder> {
        let url = http::endpoint(Self::NAME, &self.base_url, "search.json")?;
        Ok(self.client.get(url).query(&[
            ("engine", self.engine.clone()),
            ("q", query.to_string()),
            ("num", max_results.to_string()),
            ("api_key", self.api_key.expose().to_string()),
        ]))
    }
}

/// Sources from `organic_results`.
fn parse_results(body: &Value) -> Vec<Source> {
    http::result_items(SerpApiProvider::NAME, body, &["organic_results"])
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            Source::new(http::text(item, "title"), http::text(item, "link"))
                .with_snippet(http::text(item, "snippet"))
                .with_provider(SerpApiProvider::NAME)
        })
        .collect()
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>> {
        let response = self
            .request(query, max_results)?
            .send()
            .await
            // the key travels in the query string, keep it out of error text
            .map_err(|e| http::transport_error(Self::NAME, e.without_url()))?;

        let body = http::read_json(Self::NAME, response).await?;
        if let Some(message) = body.get("error").and_then(Value::as_str) {
            return Err(ProviderError::failed(Self::NAME, message));
        }
        Ok(parse_results(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_organic_results() {
        let body = json!({
            "search_metadata": {"status": "Success"},
            "organic_results": [
                {"position": 1, "title": "Acme Corp", "link": "https://acme.com", "snippet": "Anvils"},
                {"position": 2, "title": "Acme on Wikipedia", "link": "https://en.wikipedia.org/wiki/Acme"}
            ]
        });

        let sources = parse_results(&body);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://acme.com");
        assert_eq!(sources[0].snippet, "Anvils");
        assert!(sources.iter().all(|s| s.provider == "serpapi"));
    }

    #[test]
    fn test_no_organic_results_is_empty() {
        assert!(parse_results(&json!({"answer_box": {}})).is_empty());
    }

    #[test]
    fn test_request_shape() {
        let request = SerpApiProvider::new("serp-key")
            .request("acme corp", 3)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.url().path(), "/search.json");
        assert_eq!(
            request.url().query(),
            Some("engine=google&q=acme+corp&num=3&api_key=serp-key")
        );
    }
}
