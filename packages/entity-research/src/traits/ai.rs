//! Text completion trait for LLM operations.
//!
//! The research loop needs four kinds of generation, all addressed by a
//! [`PromptTemplate`] id plus string variables:
//! - Query writing (initial search queries from the schema)
//! - Research notes (digest of search results)
//! - Extraction (notes → JSON record)
//! - Reflection (missing fields → follow-up queries)
//!
//! Implementations own prompt rendering, model choice and transport. Callers
//! treat the returned text as untrusted and parse it defensively.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ModelResult;
use crate::pipeline::prompts::PromptTemplate;

/// Named string variables substituted into a template.
pub type PromptVariables = HashMap<String, String>;

/// Opaque text-completion service.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Generate text for `template` with `variables` filled in.
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> ModelResult<String>;
}

#[async_trait]
impl<T: TextCompletion + ?Sized> TextCompletion for Arc<T> {
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> ModelResult<String> {
        (**self).complete(template, variables).await
    }
}

/// Build a [`PromptVariables`] map from pairs.
pub fn prompt_vars<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PromptVariables
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
