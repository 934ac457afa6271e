//! Canonical search hit, normalized at each provider boundary.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single search result.
///
/// Every provider converts its own response shape into this record before it
/// enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Page title
    pub title: String,

    /// Page URL (identity key)
    pub url: String,

    /// Short snippet from the provider
    pub snippet: String,

    /// Full page text, when the provider returns it
    #[serde(default)]
    pub raw_content: Option<String>,

    /// Name of the provider that produced this hit
    pub provider: String,
}

/// Identity used to collapse duplicate sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Sources with a url are identified by it.
    Url(String),

    /// Sources without a url are identified by a hash of their content.
    Content(String),
}

impl Source {
    /// Create a source with the given title and url.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: String::new(),
            raw_content: None,
            provider: String::new(),
        }
    }

    /// Set the snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Set the raw page content.
    pub fn with_raw_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }

    /// Tag with the originating provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Whether this source carries a usable url.
    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// The dedup identity of this source.
    ///
    /// Url when present; otherwise a SHA-256 over title, snippet and raw
    /// content, so identical url-less hits collapse and distinct ones survive.
    pub fn dedup_key(&self) -> DedupKey {
        if self.has_url() {
            return DedupKey::Url(self.url.clone());
        }

        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.snippet.as_bytes());
        hasher.update([0u8]);
        if let Some(raw) = &self.raw_content {
            hasher.update(raw.as_bytes());
        }
        DedupKey::Content(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_is_identity() {
        let a = Source::new("A", "https://example.com").with_snippet("one");
        let b = Source::new("B", "https://example.com").with_snippet("two");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_missing_url_hashes_content() {
        let a = Source::new("Same", "").with_snippet("text");
        let b = Source::new("Same", "  ").with_snippet("text");
        let c = Source::new("Other", "").with_snippet("text");

        assert!(!a.has_url());
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
        assert!(matches!(a.dedup_key(), DedupKey::Content(ref h) if h.len() == 64));
    }

    #[test]
    fn test_field_boundaries_matter() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = Source::new("ab", "").with_snippet("c");
        let b = Source::new("a", "").with_snippet("bc");
        assert_ne!(a.dedup_key(), b.dedup_key());
    }
}
