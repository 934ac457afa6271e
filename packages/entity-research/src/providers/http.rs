//! Shared HTTP plumbing for the search vendors.

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::{ProviderError, ProviderResult, ResearchError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client with the per-request timeout every provider uses.
pub(crate) fn client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Check a base url given through a `with_base_url` builder.
pub(crate) fn validate_base_url(provider: &str, base_url: &str) -> Result<()> {
    Url::parse(base_url)
        .map(|_| ())
        .map_err(|e| ResearchError::config(format!("invalid {provider} base url: {e}")))
}

/// `base` joined with `path`.
pub(crate) fn endpoint(provider: &str, base: &str, path: &str) -> ProviderResult<Url> {
    Url::parse(base)
        .and_then(|base| base.join(path))
        .map_err(|e| ProviderError::unavailable(provider, format!("bad endpoint: {e}")))
}

/// Timeouts and connection failures are told apart from other errors.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
        }
    } else if e.is_connect() {
        ProviderError::unavailable(provider, e.to_string())
    } else {
        ProviderError::failed(provider, e.to_string())
    }
}

/// Read a JSON body, mapping rejected credentials to `Unavailable`.
pub(crate) async fn read_json(provider: &str, response: Response) -> ProviderResult<Value> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::unavailable(
            provider,
            format!("credentials rejected ({status})"),
        ));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::failed(
            provider,
            format!("API error {status}: {body}"),
        ));
    }

    response.json().await.map_err(|e| ProviderError::Malformed {
        provider: provider.to_string(),
        reason: e.to_string(),
    })
}

/// The array at `path` (nested keys), or nothing with a warning.
pub(crate) fn result_items<'a>(provider: &str, body: &'a Value, path: &[&str]) -> &'a [Value] {
    let items = path
        .iter()
        .try_fold(body, |node, key| node.get(*key))
        .and_then(Value::as_array);
    match items {
        Some(items) => items,
        None => {
            tracing::warn!(provider, "Search response has no results list, treating as empty");
            &[]
        }
    }
}

/// String field of a result item, empty when absent.
pub(crate) fn text(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
