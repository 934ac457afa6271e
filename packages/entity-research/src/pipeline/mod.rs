//! Research pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Query planning (follow-ups or freshly generated queries)
//! - Search dispatch across providers (single / fallback / hybrid)
//! - Source dedup and bounded-length formatting
//! - Extraction and completeness scoring against a schema
//! - Reflection: continue with follow-up queries, or stop

pub mod completeness;
pub mod dedup;
pub mod extract;
pub mod format;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod reflection;
pub mod routing;

pub use completeness::score_completeness;
pub use dedup::{deduplicate, deduplicate_batches};
pub use extract::{
    extract_json_object, parse_extraction_response, parse_queries_from_response,
    parse_reflection_response, ReflectionResponse,
};
pub use format::{format_all_notes, format_sources, truncate_text, FormatOptions};
pub use orchestrator::{SearchOptions, SearchOrchestrator, SearchOutput};
pub use planner::{PlanRequest, QueryPlanner};
pub use prompts::{render_template, PromptTemplate};
pub use reflection::ReflectionController;
pub use routing::{ProviderRoute, QueryReport};
