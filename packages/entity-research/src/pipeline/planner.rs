//! Query planning: decide the next batch of search queries.

use std::sync::Arc;

use crate::pipeline::extract::parse_queries_from_response;
use crate::pipeline::prompts::{user_context_block, PromptTemplate};
use crate::traits::ai::{prompt_vars, TextCompletion};
use crate::traits::rate_limit::RateLimit;
use crate::types::query::Query;
use crate::types::schema::Schema;

/// Inputs for one planning step.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub entity: &'a str,
    pub schema: &'a Schema,
    pub user_context: &'a str,
    /// Follow-ups from the prior cycle's reflection
    pub follow_up_queries: &'a [String],
    pub max_search_queries: usize,
}

/// Chooses between reusing follow-up queries and generating fresh ones.
#[derive(Clone)]
pub struct QueryPlanner {
    completion: Arc<dyn TextCompletion>,
    rate_limit: Arc<dyn RateLimit>,
}

impl QueryPlanner {
    pub fn new(completion: Arc<dyn TextCompletion>, rate_limit: Arc<dyn RateLimit>) -> Self {
        Self {
            completion,
            rate_limit,
        }
    }

    /// Plan the next query batch.
    ///
    /// Non-empty follow-ups are used verbatim. Otherwise queries are
    /// generated from the schema; if that fails or yields nothing, the entity
    /// name itself is searched. Never returns more than
    /// `max_search_queries` queries.
    pub async fn plan(&self, request: PlanRequest<'_>) -> Vec<Query> {
        let limit = request.max_search_queries.max(1);

        let follow_ups: Vec<Query> = request
            .follow_up_queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .take(limit)
            .map(|q| Query::follow_up(q.as_str()))
            .collect();
        if !follow_ups.is_empty() {
            tracing::debug!(count = follow_ups.len(), "Reusing follow-up queries");
            return follow_ups;
        }

        let generated = self.generate(&request).await;
        if generated.is_empty() {
            tracing::warn!(
                entity = %request.entity,
                "Query generation produced nothing, searching the entity name"
            );
            return vec![Query::initial(request.entity)];
        }

        generated
            .into_iter()
            .take(limit)
            .map(Query::initial)
            .collect()
    }

    async fn generate(&self, request: &PlanRequest<'_>) -> Vec<String> {
        let vars = prompt_vars([
            ("entity", request.entity.to_string()),
            ("schema", request.schema.to_prompt_string()),
            ("user_context", user_context_block(request.user_context)),
            ("max_search_queries", request.max_search_queries.to_string()),
        ]);

        self.rate_limit.acquire().await;
        match self.completion.complete(PromptTemplate::QueryWriter, &vars).await {
            Ok(text) => parse_queries_from_response(&text),
            Err(e) => {
                tracing::warn!(error = %e, "Query generation failed");
                Vec::new()
            }
        }
    }
}
