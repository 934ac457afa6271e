//! Configuration types for research sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ResearchError, Result};

/// Hard cap on queries per cycle.
pub const MAX_SEARCH_QUERIES: usize = 10;

/// Hard cap on results per query.
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Hard cap on reflection steps.
pub const MAX_REFLECTION_STEPS: usize = 5;

/// How a query batch is routed to search providers.
///
/// Textual form: `tavily`, `fallback:tavily,brave`, `hybrid:tavily,google`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// All queries go to one provider.
    Single { provider: String },

    /// Try providers in order; move on when one is unavailable.
    FallbackChain { providers: Vec<String> },

    /// First half of the batch to `primary`, the rest to `secondary`.
    HybridSplit { primary: String, secondary: String },
}

impl RoutingPolicy {
    pub fn single(provider: impl Into<String>) -> Self {
        Self::Single {
            provider: provider.into(),
        }
    }

    pub fn fallback_chain(providers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::FallbackChain {
            providers: providers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn hybrid_split(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self::HybridSplit {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Every provider name the policy refers to.
    pub fn provider_names(&self) -> Vec<&str> {
        match self {
            Self::Single { provider } => vec![provider.as_str()],
            Self::FallbackChain { providers } => providers.iter().map(String::as_str).collect(),
            Self::HybridSplit { primary, secondary } => vec![primary.as_str(), secondary.as_str()],
        }
    }

    fn validate(&self) -> Result<()> {
        if let Self::FallbackChain { providers } = self {
            if providers.is_empty() {
                return Err(ResearchError::config("fallback chain needs at least one provider"));
            }
        }
        if self.provider_names().iter().any(|name| name.trim().is_empty()) {
            return Err(ResearchError::config("search provider names must not be empty"));
        }
        Ok(())
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::single("tavily")
    }
}

impl fmt::Display for RoutingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { provider } => f.write_str(provider),
            Self::FallbackChain { providers } => write!(f, "fallback:{}", providers.join(",")),
            Self::HybridSplit { primary, secondary } => write!(f, "hybrid:{primary},{secondary}"),
        }
    }
}

impl FromStr for RoutingPolicy {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let names = |list: &str| -> Vec<String> {
            list.split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()
        };

        let policy = if let Some(rest) = s.strip_prefix("fallback:") {
            Self::FallbackChain {
                providers: names(rest),
            }
        } else if let Some(rest) = s.strip_prefix("hybrid:") {
            match names(rest).as_slice() {
                [primary, secondary] => Self::hybrid_split(primary.clone(), secondary.clone()),
                _ => {
                    return Err(ResearchError::config(format!(
                        "hybrid routing needs exactly two providers: {s}"
                    )))
                }
            }
        } else {
            Self::single(s)
        };

        policy.validate()?;
        Ok(policy)
    }
}

/// Configuration for a research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Queries run per cycle (1..=10). Default: 3.
    pub max_search_queries: usize,

    /// Results requested per query (1..=10). Default: 3.
    pub max_search_results: usize,

    /// Reflection budget (0..=5). A session runs at most `max(1, n)`
    /// extraction passes. Default: 1.
    pub max_reflection_steps: usize,

    /// Provider routing. Default: single `tavily`.
    pub search_provider: RoutingPolicy,

    /// Stop once the completeness score exceeds this. Default: 0.85.
    pub completeness_threshold: f64,

    /// Include raw page content in the source digest. Default: true.
    pub include_raw_content: bool,

    /// Per-source raw content budget in tokens (4 chars each). Default: 1000.
    pub max_tokens_per_source: usize,

    /// Concurrent queries against a single provider. Default: 1.
    pub search_concurrency: usize,

    /// Deadline for the whole session. Default: none.
    #[serde(default, with = "duration_secs")]
    pub session_timeout: Option<Duration>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_search_queries: 3,
            max_search_results: 3,
            max_reflection_steps: 1,
            search_provider: RoutingPolicy::default(),
            completeness_threshold: 0.85,
            include_raw_content: true,
            max_tokens_per_source: 1000,
            search_concurrency: 1,
            session_timeout: None,
        }
    }
}

impl ResearchConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (and `.env` if present).
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(v) = env_parse("RESEARCH_MAX_SEARCH_QUERIES")? {
            config.max_search_queries = v;
        }
        if let Some(v) = env_parse("RESEARCH_MAX_SEARCH_RESULTS")? {
            config.max_search_results = v;
        }
        if let Some(v) = env_parse("RESEARCH_MAX_REFLECTION_STEPS")? {
            config.max_reflection_steps = v;
        }
        if let Some(v) = env_parse::<RoutingPolicy>("RESEARCH_SEARCH_PROVIDER")? {
            config.search_provider = v;
        }
        if let Some(v) = env_parse("RESEARCH_COMPLETENESS_THRESHOLD")? {
            config.completeness_threshold = v;
        }
        if let Some(v) = env_parse("RESEARCH_SEARCH_CONCURRENCY")? {
            config.search_concurrency = v;
        }
        if let Some(secs) = env_parse::<u64>("RESEARCH_SESSION_TIMEOUT_SECS")? {
            config.session_timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check limits. Violations are configuration errors.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SEARCH_QUERIES).contains(&self.max_search_queries) {
            return Err(ResearchError::config(format!(
                "max_search_queries must be between 1 and {MAX_SEARCH_QUERIES}, got {}",
                self.max_search_queries
            )));
        }
        if !(1..=MAX_SEARCH_RESULTS).contains(&self.max_search_results) {
            return Err(ResearchError::config(format!(
                "max_search_results must be between 1 and {MAX_SEARCH_RESULTS}, got {}",
                self.max_search_results
            )));
        }
        if self.max_reflection_steps > MAX_REFLECTION_STEPS {
            return Err(ResearchError::config(format!(
                "max_reflection_steps must be at most {MAX_REFLECTION_STEPS}, got {}",
                self.max_reflection_steps
            )));
        }
        if !(0.0..=1.0).contains(&self.completeness_threshold) {
            return Err(ResearchError::config(format!(
                "completeness_threshold must be within [0, 1], got {}",
                self.completeness_threshold
            )));
        }
        if self.max_tokens_per_source == 0 {
            return Err(ResearchError::config("max_tokens_per_source must be at least 1"));
        }
        if self.search_concurrency == 0 {
            return Err(ResearchError::config("search_concurrency must be at least 1"));
        }
        self.search_provider.validate()
    }

    /// Set queries per cycle.
    pub fn with_max_search_queries(mut self, n: usize) -> Self {
        self.max_search_queries = n;
        self
    }

    /// Set results per query.
    pub fn with_max_search_results(mut self, n: usize) -> Self {
        self.max_search_results = n;
        self
    }

    /// Set the reflection budget.
    pub fn with_max_reflection_steps(mut self, n: usize) -> Self {
        self.max_reflection_steps = n;
        self
    }

    /// Set provider routing.
    pub fn with_search_provider(mut self, policy: RoutingPolicy) -> Self {
        self.search_provider = policy;
        self
    }

    /// Set the completeness threshold.
    pub fn with_completeness_threshold(mut self, threshold: f64) -> Self {
        self.completeness_threshold = threshold;
        self
    }

    /// Toggle raw content in the digest.
    pub fn with_raw_content(mut self, include: bool) -> Self {
        self.include_raw_content = include;
        self
    }

    /// Set the per-source token budget.
    pub fn with_max_tokens_per_source(mut self, tokens: usize) -> Self {
        self.max_tokens_per_source = tokens;
        self
    }

    /// Set the per-provider worker pool size.
    pub fn with_search_concurrency(mut self, workers: usize) -> Self {
        self.search_concurrency = workers;
        self
    }

    /// Set a deadline for the whole session.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ResearchError::config(format!("{key}: {e}"))),
        _ => Ok(None),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}
