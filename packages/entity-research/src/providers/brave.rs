//! Brave Search web results.

use async_trait::async_trait;
use serde_json::Value;

use super::http;
use crate::error::{ProviderResult, Result};
use crate::security::ApiKey;
use crate::traits::searcher::SearchProvider;
use crate::types::source::Source;

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/";

/// Brave caps `count` at 20.
const MAX_COUNT: usize = 20;

/// Search provider backed by the Brave Search API.
#[derive(Debug, Clone)]
pub struct BraveProvider {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
}

impl BraveProvider {
    pub const NAME: &'static str = "brave";

    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self {
            client: http::client(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `BRAVE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ApiKey::from_env("BRAVE_API_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        http::validate_base_url(Self::NAME, base_url)?;
        self.base_url = base_url.to_string();
        Ok(self)
    }

    fn request(&self, query: &str, max_results: usize) -> ProviderResult<reqwest::RequestBuilder> {
        let url = http::endpoint(Self::NAME, &self.base_url, "res/v1/web/search")?;
        Ok(self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose())
            .query(&[
                ("q", query.to_string()),
                ("count", max_results.min(MAX_COUNT).to_string()),
            ]))
    }
}

/// Sources from `web.results`.
fn parse_results(body: &Value) -> Vec<Source> {
    http::result_items(BraveProvider::NAME, body, &["web", "results"])
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            Source::new(http::text(item, "title"), http::text(item, "url"))
                .with_snippet(http::text(item, "description"))
                .with_provider(BraveProvider::NAME)
        })
        .collect()
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>> {
        let response = self
            .request(query, max_results)?
            .send()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e))?;

        let body = http::read_json(Self::NAME, response).await?;
        Ok(parse_results(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_web_results() {
        let body = json!({
            "type": "search",
            "web": {
                "results": [
                    {"title": "Acme Corp", "url": "https://acme.com", "description": "Anvils since 1949"},
                    {"title": "Acme news", "url": "https://news.com/acme"}
                ]
            }
        });

        let sources = parse_results(&body);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].snippet, "Anvils since 1949");
        assert_eq!(sources[1].snippet, "");
        assert!(sources.iter().all(|s| s.provider == "brave" && s.raw_content.is_none()));
    }

    #[test]
    fn test_missing_web_section_is_empty() {
        assert!(parse_results(&json!({"type": "search"})).is_empty());
    }

    #[test]
    fn test_request_shape() {
        let request = BraveProvider::new("brave-key")
            .request("acme corp", 50)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.url().path(), "/res/v1/web/search");
        assert_eq!(request.url().query(), Some("q=acme+corp&count=20"));
        assert_eq!(request.headers()["X-Subscription-Token"], "brave-key");
    }
}
