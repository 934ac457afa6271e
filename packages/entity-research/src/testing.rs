//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the research library
//! without making real model or network calls.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{ModelError, ModelResult, ProviderError, ProviderResult};
use crate::pipeline::prompts::PromptTemplate;
use crate::traits::ai::{PromptVariables, TextCompletion};
use crate::traits::searcher::SearchProvider;
use crate::types::source::Source;

/// A mock completion service for testing.
///
/// Each template has a response queue. Queued responses are returned in
/// order and the last one repeats, so a single response covers every cycle.
/// Templates without responses get a harmless default.
#[derive(Clone, Default)]
pub struct MockCompletion {
    /// Queued responses by template
    responses: Arc<RwLock<HashMap<PromptTemplate, VecDeque<String>>>>,

    /// Templates that always fail
    failing: Arc<RwLock<HashSet<PromptTemplate>>>,

    /// Artificial latency per call
    delay: Option<Duration>,

    /// Extra latency for specific templates
    template_delays: Arc<RwLock<HashMap<PromptTemplate, Duration>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockCompletionCall>>>,
}

/// Record of a call made to the mock completion service.
#[derive(Debug, Clone)]
pub struct MockCompletionCall {
    pub template: PromptTemplate,
    pub variables: PromptVariables,
}

impl MockCompletion {
    /// Create a new mock with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a template.
    pub fn with_response(self, template: PromptTemplate, response: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .entry(template)
            .or_default()
            .push_back(response.into());
        self
    }

    /// Make every call for a template fail.
    pub fn fail_on(self, template: PromptTemplate) -> Self {
        self.failing.write().unwrap().insert(template);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering calls for one template only.
    pub fn with_delay_on(self, template: PromptTemplate, delay: Duration) -> Self {
        self.template_delays.write().unwrap().insert(template, delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockCompletionCall> {
        self.calls.read().unwrap().clone()
    }

    /// Calls for one template.
    pub fn calls_for(&self, template: PromptTemplate) -> Vec<MockCompletionCall> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.template == template)
            .cloned()
            .collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn next_response(&self, template: PromptTemplate, variables: &PromptVariables) -> String {
        let mut responses = self.responses.write().unwrap();
        if let Some(queue) = responses.get_mut(&template) {
            if queue.len() > 1 {
                if let Some(response) = queue.pop_front() {
                    return response;
                }
            }
            if let Some(response) = queue.front() {
                return response.clone();
            }
        }
        drop(responses);
        Self::default_response(template, variables)
    }

    fn default_response(template: PromptTemplate, variables: &PromptVariables) -> String {
        let entity = variables.get("entity").map(String::as_str).unwrap_or("entity");
        match template {
            PromptTemplate::QueryWriter => {
                serde_json::json!([format!("{entity} overview"), format!("{entity} news")])
                    .to_string()
            }
            PromptTemplate::ResearchNotes => format!("Research notes on {entity}."),
            PromptTemplate::Extraction => "{}".to_string(),
            PromptTemplate::Reflection => {
                r#"{"analysis": "", "follow_up_queries": [], "is_complete": false}"#.to_string()
            }
        }
    }
}

#[async_trait]
impl TextCompletion for MockCompletion {
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> ModelResult<String> {
        self.calls.write().unwrap().push(MockCompletionCall {
            template,
            variables: variables.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let template_delay = self.template_delays.read().unwrap().get(&template).copied();
        if let Some(delay) = template_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().unwrap().contains(&template) {
            return Err(ModelError::Status {
                code: 500,
                body: format!("mock failure for {template}"),
            });
        }

        Ok(self.next_response(template, variables))
    }
}

/// A mock search provider for testing.
///
/// Returns predefined sources without making network requests.
#[derive(Clone)]
pub struct MockSearchProvider {
    name: String,

    /// Predefined results by query
    results: Arc<RwLock<HashMap<String, Vec<Source>>>>,

    /// Hits synthesized for queries without predefined results
    generated_results: usize,

    /// Queries that should fail
    fail_queries: Arc<RwLock<HashSet<String>>>,

    /// Report unavailable on every call
    unavailable: bool,

    /// Artificial latency per call
    delay: Option<Duration>,

    /// Call tracking
    calls: Arc<RwLock<Vec<MockSearchCall>>>,
}

/// Record of a call made to the mock search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSearchCall {
    pub query: String,
    pub max_results: usize,
}

impl MockSearchProvider {
    /// Create a provider registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Arc::default(),
            generated_results: 0,
            fail_queries: Arc::default(),
            unavailable: false,
            delay: None,
            calls: Arc::default(),
        }
    }

    /// Add predefined results for a query.
    pub fn with_results(self, query: impl Into<String>, sources: Vec<Source>) -> Self {
        self.results.write().unwrap().insert(query.into(), sources);
        self
    }

    /// Synthesize `n` distinct hits for any query without predefined results.
    pub fn with_generated_results(mut self, n: usize) -> Self {
        self.generated_results = n;
        self
    }

    /// Mark a query as failing.
    pub fn fail_query(self, query: impl Into<String>) -> Self {
        self.fail_queries.write().unwrap().insert(query.into());
        self
    }

    /// Report the provider as unavailable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockSearchCall> {
        self.calls.read().unwrap().clone()
    }

    /// Query texts received, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.query).collect()
    }

    fn generate(&self, query: &str, max_results: usize) -> Vec<Source> {
        let slug: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        (0..self.generated_results.min(max_results))
            .map(|i| {
                Source::new(
                    format!("{query} result {i}"),
                    format!("https://{}.example/{slug}/{i}", self.name),
                )
                .with_snippet(format!("Snippet {i} about {query}"))
                .with_raw_content(format!("Full page {i} about {query}"))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<Source>> {
        self.calls.write().unwrap().push(MockSearchCall {
            query: query.to_string(),
            max_results,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable {
            return Err(ProviderError::unavailable(&self.name, "mock unavailable"));
        }
        if self.fail_queries.read().unwrap().contains(query) {
            return Err(ProviderError::failed(&self.name, "mock failure"));
        }

        let predefined = self.results.read().unwrap().get(query).cloned();
        let hits = predefined.unwrap_or_else(|| self.generate(query, max_results));
        Ok(hits
            .into_iter()
            .map(|s| s.with_provider(self.name.clone()))
            .collect())
    }
}
