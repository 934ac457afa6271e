//! Entity Research Library
//!
//! Gathers facts about a named entity by repeatedly searching the web,
//! extracting a structured record against a schema, and judging whether the
//! record is good enough, within a bounded number of cycles.
//!
//! # Design Philosophy
//!
//! - Schema-driven: the caller says which fields matter
//! - Fail open: a failed search, model call or parse degrades one step,
//!   never the session
//! - Bounded: at most `max(1, max_reflection_steps)` extraction passes
//! - Library handles mechanics, collaborators handle vendors (search APIs
//!   and models are traits)
//!
//! # Usage
//!
//! ```rust,ignore
//! use entity_research::{ProviderRegistry, ReflectionController, ResearchConfig, Schema};
//! use entity_research::testing::{MockCompletion, MockSearchProvider};
//!
//! let registry = ProviderRegistry::new()
//!     .with_provider(Arc::new(MockSearchProvider::new("tavily").with_generated_results(3)));
//! let controller = ReflectionController::new(registry, Arc::new(MockCompletion::new()));
//!
//! let outcome = controller
//!     .run_session("Acme Corp", Schema::company_profile(), "", &ResearchConfig::default())
//!     .await?;
//! println!("{:.0}% complete after {} cycles", outcome.score * 100.0, outcome.iterations_run);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (SearchProvider, TextCompletion, RateLimit)
//! - [`types`] - Schema, sources, records, config and session state
//! - [`pipeline`] - Planning, routing, dedup, formatting, scoring, reflection
//! - [`providers`] - Search provider implementations and registry
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod providers;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{ModelError, ProviderError, ResearchError, Result};
pub use traits::{
    ai::{prompt_vars, PromptVariables, TextCompletion},
    rate_limit::{GovernorRateLimit, NoRateLimit, RateLimit},
    searcher::{SearchProvider, UnconfiguredProvider},
};
pub use types::{
    config::{ResearchConfig, RoutingPolicy},
    query::{Query, QueryOrigin},
    record::{CompletenessResult, ExtractedRecord, MissingField},
    schema::{FieldSpec, Schema},
    session::{
        CycleReport, ReflectionOutcome, ResearchEvent, SessionOutcome, SessionPhase,
        SessionState, SessionStatus,
    },
    source::{DedupKey, Source},
};

// Re-export pipeline components
pub use pipeline::{
    // Core functions
    deduplicate, deduplicate_batches, format_all_notes, format_sources, score_completeness,
    truncate_text, FormatOptions,
    // Model output parsing
    parse_extraction_response, parse_queries_from_response, parse_reflection_response,
    ReflectionResponse,
    // Prompts
    PromptTemplate,
    // Search
    ProviderRoute, QueryReport, SearchOptions, SearchOrchestrator, SearchOutput,
    // Session
    PlanRequest, QueryPlanner, ReflectionController,
};

// Re-export providers
pub use providers::{
    BraveProvider, GoogleProvider, ProviderRegistry, SerpApiProvider, TavilyProvider,
};

pub use security::ApiKey;

#[cfg(feature = "openai")]
pub use ai::OpenAiCompletion;

// Re-export testing utilities
pub use testing::{MockCompletion, MockSearchProvider};
