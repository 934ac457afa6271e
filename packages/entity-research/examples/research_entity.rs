//! Research one entity end to end.
//!
//! Searches with the built-in providers, extracts with an OpenAI-compatible
//! model and prints the session outcome as JSON.
//!
//! ```bash
//! export TAVILY_API_KEY=... OPENAI_API_KEY=...
//! # optional: BRAVE_API_KEY, SERPAPI_API_KEY, GOOGLE_API_KEY + GOOGLE_CSE_ID
//! export RESEARCH_SEARCH_PROVIDER=hybrid:tavily,google
//! cargo run --example research_entity --features openai -- "Acme Corp" [schema.json] [context]
//! ```
//!
//! Session knobs come from `RESEARCH_*` variables (see `ResearchConfig::from_env`).

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entity_research::{
    GovernorRateLimit, OpenAiCompletion, ProviderRegistry, ReflectionController, ResearchConfig,
    ResearchEvent, Schema,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,entity_research=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let entity = args
        .next()
        .context("usage: research_entity <entity> [schema.json] [context]")?;
    let schema = match args.next() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read schema {path}"))?;
            Schema::from_json(&serde_json::from_str(&raw)?)?
        }
        None => Schema::company_profile(),
    };
    let user_context = args.next().unwrap_or_default();

    let config = ResearchConfig::from_env().context("Failed to load research config")?;
    let completion = OpenAiCompletion::from_env()?;
    let controller = ReflectionController::new(ProviderRegistry::from_env(), Arc::new(completion))
        .with_rate_limit(Arc::new(GovernorRateLimit::conservative()));

    tracing::info!(entity = %entity, fields = schema.len(), "Starting research");

    let mut events = controller.run_stream(&entity, schema, &user_context, &config);
    while let Some(event) = events.next().await {
        match event? {
            ResearchEvent::Finished(outcome) => {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            other => tracing::debug!(event = ?other, "Session event"),
        }
    }

    Ok(())
}
