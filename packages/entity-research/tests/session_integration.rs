//! Integration tests for the research session loop.
//!
//! These tests drive full sessions against mock providers and a mock
//! completion service:
//! 1. Plan queries
//! 2. Search across providers
//! 3. Write notes and extract
//! 4. Score and reflect
//! 5. Stop with a structured outcome

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mockall::mock;
use serde_json::{json, Value};
use tokio_test::assert_ok;

use entity_research::error::ModelResult;
use entity_research::testing::{MockCompletion, MockSearchProvider};
use entity_research::{
    NoRateLimit, PromptTemplate, PromptVariables, ProviderRegistry, ReflectionController,
    ReflectionOutcome, ResearchConfig, ResearchEvent, RoutingPolicy, Schema, SessionStatus,
    TextCompletion,
};

/// Helper to build a controller over the given providers.
fn controller(
    providers: Vec<MockSearchProvider>,
    completion: Arc<dyn TextCompletion>,
) -> ReflectionController {
    let registry = providers
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, p| registry.with_provider(Arc::new(p)));
    ReflectionController::new(registry, completion).with_rate_limit(Arc::new(NoRateLimit))
}

fn four_field_schema() -> Schema {
    Schema::from_json(&json!({
        "title": "Company",
        "properties": {
            "name": {"type": "string", "description": "Official name"},
            "founded": {"type": "string", "description": "Year founded"},
            "ceo": {"type": "string", "description": "Current CEO"},
            "revenue": {"type": "string", "description": "Latest annual revenue"}
        },
        "required": ["name"]
    }))
    .unwrap()
}

fn query_list(n: usize) -> String {
    let queries: Vec<String> = (0..n).map(|i| format!("acme query {i}")).collect();
    serde_json::to_string(&queries).unwrap()
}

#[tokio::test]
async fn test_required_fields_filled_stops_after_first_cycle() {
    let schema = Schema::from_json(&json!({
        "properties": {
            "name": {"type": "string"},
            "website": {"type": "string"}
        },
        "required": ["name", "website"]
    }))
    .unwrap();
    let completion = MockCompletion::new().with_response(
        PromptTemplate::Extraction,
        r#"{"name": "Acme Corp", "website": "https://acme.com"}"#,
    );
    let tavily = MockSearchProvider::new("tavily").with_generated_results(2);

    let outcome = assert_ok!(
        controller(vec![tavily], Arc::new(completion.clone()))
            .run_session("Acme Corp", schema, "", &ResearchConfig::default())
            .await
    );

    assert_eq!(outcome.score, 1.0);
    assert!(outcome.missing_fields.is_empty());
    assert_eq!(outcome.iterations_run, 1);
    assert_eq!(outcome.status, SessionStatus::Complete);
    assert!(completion.calls_for(PromptTemplate::Reflection).is_empty());
}

#[tokio::test]
async fn test_low_score_requests_follow_up() {
    let completion = MockCompletion::new()
        .with_response(PromptTemplate::Extraction, r#"{"name": "Acme Corp"}"#)
        .with_response(
            PromptTemplate::Reflection,
            r#"{"analysis": "No leadership data", "follow_up_queries": ["acme corp ceo"], "is_complete": false}"#,
        );
    let tavily = MockSearchProvider::new("tavily").with_generated_results(2);
    let config = ResearchConfig::default().with_max_reflection_steps(3);

    let outcome = controller(vec![tavily.clone()], Arc::new(completion.clone()))
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    let first = &outcome.cycles[0];
    assert_eq!(first.completeness.score, 0.25);
    assert_eq!(
        first.outcome,
        ReflectionOutcome::Continue {
            follow_up_queries: vec!["acme corp ceo".to_string()]
        }
    );

    // reflection saw what was still missing
    let reflection = &completion.calls_for(PromptTemplate::Reflection)[0];
    assert_eq!(reflection.variables["missing_fields"], "founded, ceo, revenue");
    assert!(tavily.queries().contains(&"acme corp ceo".to_string()));
    assert_eq!(outcome.iterations_run, 3);
    assert_eq!(outcome.status, SessionStatus::MaxIterations);
}

#[tokio::test]
async fn test_zero_reflection_steps_runs_one_pass() {
    let completion = MockCompletion::new()
        .with_response(PromptTemplate::Extraction, r#"{"name": "Acme Corp"}"#);
    let tavily = MockSearchProvider::new("tavily").with_generated_results(1);
    let config = ResearchConfig::default().with_max_reflection_steps(0);

    let controller = controller(vec![tavily], Arc::new(completion.clone()));
    let outcome = controller
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    assert_eq!(outcome.iterations_run, 1);
    assert_eq!(outcome.status, SessionStatus::MaxIterations);
    assert_eq!(outcome.missing_fields, vec!["founded", "ceo", "revenue"]);
    assert!(completion.calls_for(PromptTemplate::Reflection).is_empty());
    assert!(outcome.cycles[0].outcome.is_terminal());
}

#[tokio::test]
async fn test_hybrid_split_routes_half_each() {
    let completion =
        MockCompletion::new().with_response(PromptTemplate::QueryWriter, query_list(6));
    let tavily = MockSearchProvider::new("tavily").with_generated_results(1);
    let google = MockSearchProvider::new("google").with_generated_results(1);
    let config = ResearchConfig::default()
        .with_max_search_queries(6)
        .with_max_reflection_steps(0)
        .with_search_provider(RoutingPolicy::hybrid_split("tavily", "google"));

    let outcome = controller(vec![tavily.clone(), google.clone()], Arc::new(completion))
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    assert_eq!(
        tavily.queries(),
        vec!["acme query 0", "acme query 1", "acme query 2"]
    );
    assert_eq!(
        google.queries(),
        vec!["acme query 3", "acme query 4", "acme query 5"]
    );

    // sources keep query order across the split
    let providers: Vec<_> = outcome.sources.iter().map(|s| s.provider.as_str()).collect();
    assert_eq!(
        providers,
        vec!["tavily", "tavily", "tavily", "google", "google", "google"]
    );
}

#[tokio::test]
async fn test_failing_queries_are_skipped() {
    let completion =
        MockCompletion::new().with_response(PromptTemplate::QueryWriter, query_list(5));
    let tavily = MockSearchProvider::new("tavily")
        .with_generated_results(1)
        .fail_query("acme query 1")
        .fail_query("acme query 3");
    let config = ResearchConfig::default()
        .with_max_search_queries(5)
        .with_max_reflection_steps(0);

    let events: Vec<_> = controller(vec![tavily.clone()], Arc::new(completion.clone()))
        .run_stream("Acme Corp", four_field_schema(), "", &config)
        .collect()
        .await;

    assert_eq!(tavily.calls().len(), 5);
    let search = events
        .iter()
        .find_map(|e| match e {
            Ok(ResearchEvent::SearchCompleted {
                raw_hits,
                unique_sources,
                skipped_queries,
                ..
            }) => Some((*raw_hits, *unique_sources, *skipped_queries)),
            _ => None,
        })
        .unwrap();
    assert_eq!(search, (3, 3, 2));

    // the remaining three made it into the digest
    let notes_call = &completion.calls_for(PromptTemplate::ResearchNotes)[0];
    let digest = &notes_call.variables["content"];
    assert!(digest.contains("Source 3:"));
    assert!(!digest.contains("Source 4:"));
    assert!(digest.contains("acme query 4 result 0"));
}

#[tokio::test]
async fn test_fallback_chain_substitutes_second_provider() {
    let tavily = MockSearchProvider::new("tavily").unavailable();
    let brave = MockSearchProvider::new("brave").with_generated_results(2);
    let config = ResearchConfig::default()
        .with_max_reflection_steps(0)
        .with_search_provider(RoutingPolicy::fallback_chain(["tavily", "brave"]));

    let outcome = controller(
        vec![tavily.clone(), brave.clone()],
        Arc::new(MockCompletion::new()),
    )
    .run_session("Acme Corp", four_field_schema(), "", &config)
    .await
    .unwrap();

    assert_eq!(tavily.calls().len(), 1);
    assert_eq!(brave.calls().len(), 2);
    assert!(!outcome.sources.is_empty());
    assert!(outcome.sources.iter().all(|s| s.provider == "brave"));
}

#[tokio::test]
async fn test_total_search_failure_still_extracts() {
    let tavily = MockSearchProvider::new("tavily").unavailable();
    let completion = MockCompletion::new();
    let config = ResearchConfig::default().with_max_reflection_steps(0);

    let outcome = controller(vec![tavily], Arc::new(completion.clone()))
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    assert!(outcome.sources.is_empty());
    assert_eq!(outcome.notes, "");
    assert_eq!(outcome.score, 0.0);
    assert!(completion.calls_for(PromptTemplate::ResearchNotes).is_empty());

    let extraction = &completion.calls_for(PromptTemplate::Extraction)[0];
    assert_eq!(extraction.variables["notes"], "No research notes available.");
}

#[tokio::test]
async fn test_failed_extraction_yields_null_record() {
    let completion = MockCompletion::new().fail_on(PromptTemplate::Extraction);
    let tavily = MockSearchProvider::new("tavily").with_generated_results(1);
    let config = ResearchConfig::default().with_max_reflection_steps(0);

    let outcome = controller(vec![tavily], Arc::new(completion))
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    assert_eq!(outcome.extracted.len(), 4);
    assert!(outcome.extracted.iter().all(|(_, v)| v.is_null()));
    assert_eq!(outcome.missing_fields.len(), 4);
    assert!(!outcome.notes.is_empty());
}

#[tokio::test]
async fn test_later_cycles_never_erase_earlier_values() {
    let completion = MockCompletion::new()
        .with_response(PromptTemplate::Extraction, r#"{"name": "Acme Corp", "founded": "1949"}"#)
        .with_response(PromptTemplate::Extraction, r#"{"name": null, "founded": "unknown", "ceo": "W. E. Coyote"}"#)
        .with_response(
            PromptTemplate::Reflection,
            r#"{"follow_up_queries": ["acme ceo"]}"#,
        );
    let tavily = MockSearchProvider::new("tavily").with_generated_results(1);
    let config = ResearchConfig::default().with_max_reflection_steps(2);

    let outcome = controller(vec![tavily], Arc::new(completion))
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    assert_eq!(outcome.iterations_run, 2);
    assert_eq!(outcome.extracted.get("name"), &json!("Acme Corp"));
    assert_eq!(outcome.extracted.get("founded"), &json!("1949"));
    assert_eq!(outcome.extracted.get("ceo"), &json!("W. E. Coyote"));
    assert_eq!(outcome.missing_fields, vec!["revenue"]);
    assert!(outcome.notes.contains("Research Iteration 2:"));
}

#[tokio::test]
async fn test_session_deadline_returns_partial_outcome() {
    let tavily = MockSearchProvider::new("tavily")
        .with_generated_results(1)
        .with_delay(Duration::from_secs(10));
    let config = ResearchConfig::default().with_session_timeout(Duration::from_millis(50));

    let outcome = controller(vec![tavily], Arc::new(MockCompletion::new()))
        .run_session("Acme Corp", four_field_schema(), "", &config)
        .await
        .unwrap();

    assert_eq!(outcome.status, SessionStatus::DeadlineExceeded);
    assert!(outcome.status.is_partial());
    assert_eq!(outcome.extracted.len(), 4);
}

#[tokio::test]
async fn test_extraction_passes_are_bounded() {
    for steps in 0..=5 {
        let completion = MockCompletion::new().with_response(
            PromptTemplate::Reflection,
            r#"{"follow_up_queries": ["more", "and more"]}"#,
        );
        let tavily = MockSearchProvider::new("tavily").with_generated_results(1);
        let config = ResearchConfig::default().with_max_reflection_steps(steps);

        let outcome = controller(vec![tavily], Arc::new(completion.clone()))
            .run_session("Acme Corp", four_field_schema(), "", &config)
            .await
            .unwrap();

        let passes = completion.calls_for(PromptTemplate::Extraction).len();
        assert!(passes <= steps + 1, "steps={steps} passes={passes}");
        assert_eq!(passes, outcome.iterations_run);
        assert_eq!(outcome.status, SessionStatus::MaxIterations);
    }
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let config = ResearchConfig::default().with_search_provider(RoutingPolicy::single("bing"));
    let result = controller(
        vec![MockSearchProvider::new("tavily")],
        Arc::new(MockCompletion::new()),
    )
    .run_session("Acme Corp", four_field_schema(), "", &config)
    .await;

    assert!(result.unwrap_err().is_fatal());
}

mock! {
    pub Model {}

    #[async_trait]
    impl TextCompletion for Model {
        async fn complete(
            &self,
            template: PromptTemplate,
            variables: &PromptVariables,
        ) -> ModelResult<String>;
    }
}

#[tokio::test]
async fn test_prompts_receive_session_inputs() {
    let mut model = MockModel::new();
    model
        .expect_complete()
        .withf(|template, vars| {
            *template == PromptTemplate::QueryWriter
                && vars["entity"] == "Acme Corp"
                && vars["user_context"].contains("Additional context: EU subsidiary")
        })
        .times(1)
        .returning(|_, _| Ok(r#"["acme corp gmbh"]"#.to_string()));
    model
        .expect_complete()
        .withf(|template, vars| {
            *template == PromptTemplate::ResearchNotes && vars["content"].contains("Source 1:")
        })
        .times(1)
        .returning(|_, _| Ok("Acme Corp GmbH was founded in 1990.".to_string()));
    model
        .expect_complete()
        .withf(|template, vars| {
            *template == PromptTemplate::Extraction && vars["notes"].contains("founded in 1990")
        })
        .times(1)
        .returning(|_, _| Ok(r#"{"name": "Acme Corp GmbH", "founded": "1990"}"#.to_string()));

    let tavily = MockSearchProvider::new("tavily").with_generated_results(1);
    let config = ResearchConfig::default().with_max_reflection_steps(0);

    let outcome = controller(vec![tavily], Arc::new(model))
        .run_session("Acme Corp", four_field_schema(), "EU subsidiary", &config)
        .await
        .unwrap();

    assert_eq!(outcome.score, 0.5);
    assert_eq!(outcome.extracted.get("founded"), &Value::String("1990".into()));
}
