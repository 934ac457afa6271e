//! The research session state machine.
//!
//! Each cycle runs `RESEARCHING → EXTRACTING → REFLECTING`, then either loops
//! back with follow-up queries or terminates:
//!
//! 1. Plan queries (follow-ups, or freshly generated)
//! 2. Search, dedup and format
//! 3. Synthesize notes from the digest
//! 4. Extract a record from the consolidated notes and merge it
//! 5. Score completeness and decide whether to continue
//!
//! Any external failure inside a cycle degrades that step to an empty value.
//! Once a session has started it always produces a [`SessionOutcome`].

use async_stream::stream;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::pipeline::completeness::score_completeness;
use crate::pipeline::extract::{parse_extraction_response, parse_reflection_response};
use crate::pipeline::format::{format_all_notes, truncate_text, TRUNCATION_MARKER};
use crate::pipeline::orchestrator::{SearchOptions, SearchOrchestrator, SearchOutput};
use crate::pipeline::planner::{PlanRequest, QueryPlanner};
use crate::pipeline::prompts::{user_context_block, PromptTemplate};
use crate::pipeline::routing::ProviderRoute;
use crate::providers::ProviderRegistry;
use crate::traits::ai::{prompt_vars, TextCompletion};
use crate::traits::rate_limit::{GovernorRateLimit, RateLimit};
use crate::types::config::ResearchConfig;
use crate::types::record::ExtractedRecord;
use crate::types::schema::Schema;
use crate::types::session::{
    CycleReport, ReflectionOutcome, ResearchEvent, SessionOutcome, SessionPhase, SessionState,
    SessionStatus,
};

/// Notes passed to the reflection prompt are cut to this many characters.
pub const REFLECTION_NOTES_LIMIT: usize = 2000;

type EventSender = mpsc::UnboundedSender<ResearchEvent>;

/// Drives research sessions.
///
/// Cheap to clone; every session gets its own [`SessionState`].
#[derive(Clone)]
pub struct ReflectionController {
    registry: Arc<ProviderRegistry>,
    completion: Arc<dyn TextCompletion>,
    rate_limit: Arc<dyn RateLimit>,
}

impl ReflectionController {
    /// Create a controller with the default call-rate budget.
    pub fn new(registry: ProviderRegistry, completion: Arc<dyn TextCompletion>) -> Self {
        Self {
            registry: Arc::new(registry),
            completion,
            rate_limit: Arc::new(GovernorRateLimit::default()),
        }
    }

    /// Replace the call-rate budget.
    pub fn with_rate_limit(mut self, rate_limit: Arc<dyn RateLimit>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Research `entity` until the schema is filled or the budget runs out.
    ///
    /// Only configuration problems (invalid limits, unknown providers) are
    /// returned as errors, before any call is made.
    pub async fn run_session(
        &self,
        entity: &str,
        schema: Schema,
        user_context: &str,
        config: &ResearchConfig,
    ) -> Result<SessionOutcome> {
        self.run_session_with_cancel(entity, schema, user_context, config, CancellationToken::new())
            .await
    }

    /// Like [`run_session`](Self::run_session), stopping early when `cancel`
    /// fires. A cancelled session returns what it had gathered so far.
    pub async fn run_session_with_cancel(
        &self,
        entity: &str,
        schema: Schema,
        user_context: &str,
        config: &ResearchConfig,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        let search = self.prepare(config)?;
        let state = SessionState::new(entity, schema, user_context);
        Ok(self.execute(state, config, &search, cancel, None).await)
    }

    /// Run a session, yielding progress events as they happen.
    ///
    /// The last item is [`ResearchEvent::Finished`]. Dropping the stream
    /// cancels the session.
    pub fn run_stream(
        &self,
        entity: &str,
        schema: Schema,
        user_context: &str,
        config: &ResearchConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<ResearchEvent>> + Send>> {
        let controller = self.clone();
        let entity = entity.to_string();
        let user_context = user_context.to_string();
        let config = config.clone();

        Box::pin(stream! {
            let search = match controller.prepare(&config) {
                Ok(search) => search,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let cancel = CancellationToken::new();
            let _guard = cancel.clone().drop_guard();
            let (tx, mut rx) = mpsc::unbounded_channel();

            let state = SessionState::new(entity, schema, user_context);
            let task = tokio::spawn(async move {
                controller.execute(state, &config, &search, cancel, Some(&tx)).await;
            });

            while let Some(event) = rx.recv().await {
                yield Ok(event);
            }

            if let Err(e) = task.await {
                warn!(error = %e, "Research session task failed");
            }
        })
    }

    /// Validate config and bind the routing policy.
    fn prepare(&self, config: &ResearchConfig) -> Result<SearchOrchestrator> {
        config.validate()?;
        let route = ProviderRoute::resolve(&config.search_provider, &self.registry)?;
        Ok(SearchOrchestrator::new(route, self.rate_limit.clone()))
    }

    #[instrument(skip_all, fields(session_id = %state.session_id, entity = %state.entity))]
    async fn execute(
        &self,
        mut state: SessionState,
        config: &ResearchConfig,
        search: &SearchOrchestrator,
        cancel: CancellationToken,
        events: Option<&EventSender>,
    ) -> SessionOutcome {
        info!(
            route = ?search.route(),
            max_reflection_steps = config.max_reflection_steps,
            "Starting research session"
        );

        let deadline = config.session_timeout.map(|t| Instant::now() + t);
        let interrupted = {
            let cycles = self.drive(&mut state, config, search, events);
            tokio::pin!(cycles);
            tokio::select! {
                _ = &mut cycles => None,
                _ = cancel.cancelled() => Some(SessionStatus::Cancelled),
                _ = deadline_elapsed(deadline) => Some(SessionStatus::DeadlineExceeded),
            }
        };

        if let Some(status) = interrupted {
            warn!(
                ?status,
                iteration = state.iteration,
                cycles = state.cycles.len(),
                "Research session interrupted, returning partial result"
            );
            state.terminate(status);
        }

        let outcome = state.into_outcome();
        info!(
            status = ?outcome.status,
            score = outcome.score,
            iterations = outcome.iterations_run,
            sources = outcome.sources.len(),
            "Research session finished"
        );
        emit(events, ResearchEvent::Finished(Box::new(outcome.clone())));
        outcome
    }

    /// Run cycles until reflection says stop.
    async fn drive(
        &self,
        state: &mut SessionState,
        config: &ResearchConfig,
        search: &SearchOrchestrator,
        events: Option<&EventSender>,
    ) {
        let planner = QueryPlanner::new(self.completion.clone(), self.rate_limit.clone());
        let options = SearchOptions::from(config);

        loop {
            let iteration = state.iteration;
            state.phase = SessionPhase::Researching;

            let queries = planner
                .plan(PlanRequest {
                    entity: &state.entity,
                    schema: &state.schema,
                    user_context: &state.user_context,
                    follow_up_queries: &state.follow_up_queries,
                    max_search_queries: config.max_search_queries,
                })
                .await;
            info!(iteration, queries = queries.len(), "Research cycle started");
            emit(
                events,
                ResearchEvent::CycleStarted {
                    iteration,
                    queries: queries.clone(),
                },
            );

            let output = search.search(&queries, &options).await;
            let new_sources = state.absorb_sources(output.sources.iter().cloned());
            emit(
                events,
                ResearchEvent::SearchCompleted {
                    iteration,
                    raw_hits: output.raw_hits,
                    unique_sources: output.sources.len(),
                    skipped_queries: output.skipped(),
                },
            );

            let notes = self.write_notes(state, &output).await;
            state.push_notes(&notes);
            emit(
                events,
                ResearchEvent::NotesWritten {
                    iteration,
                    chars: notes.chars().count(),
                },
            );

            state.phase = SessionPhase::Extracting;
            let extracted = self.extract(state).await;
            let changed = state.extracted.merge(&extracted);
            state.completeness = score_completeness(&state.extracted, &state.schema);
            state.passes += 1;
            debug!(iteration, changed = ?changed, "Merged extraction");
            emit(
                events,
                ResearchEvent::Extracted {
                    iteration,
                    filled: state.extracted.filled_count(),
                    total: state.schema.len(),
                },
            );

            state.phase = SessionPhase::Reflecting;
            let outcome = self.reflect(state, config).await;
            info!(
                iteration,
                score = state.completeness.score,
                missing = state.completeness.missing_fields.len(),
                decision = ?outcome,
                "Reflection complete"
            );
            emit(
                events,
                ResearchEvent::Reflected {
                    iteration,
                    score: state.completeness.score,
                    missing_fields: state.completeness.missing_labels(),
                    outcome: outcome.clone(),
                },
            );

            state.cycles.push(CycleReport {
                iteration,
                queries,
                new_sources,
                notes,
                extracted,
                completeness: state.completeness.clone(),
                outcome: outcome.clone(),
            });

            match outcome {
                ReflectionOutcome::Continue { follow_up_queries } => {
                    state.follow_up_queries = follow_up_queries;
                    state.iteration += 1;
                }
                ReflectionOutcome::Stop { status, .. } => {
                    state.terminate(status);
                    return;
                }
            }
        }
    }

    /// Synthesize notes from this cycle's digest. Empty on failure, and when
    /// the cycle found nothing.
    async fn write_notes(&self, state: &SessionState, output: &SearchOutput) -> String {
        if output.is_empty() {
            debug!(iteration = state.iteration, "No sources found, skipping notes");
            return String::new();
        }

        let vars = prompt_vars([
            ("entity", state.entity.clone()),
            ("schema", state.schema.to_prompt_string()),
            ("content", output.digest.clone()),
            ("user_context", user_context_block(&state.user_context)),
        ]);

        self.rate_limit.acquire().await;
        match self.completion.complete(PromptTemplate::ResearchNotes, &vars).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(iteration = state.iteration, error = %e, "Notes synthesis failed");
                String::new()
            }
        }
    }

    /// Extract a record from every cycle's notes. All-null on failure.
    async fn extract(&self, state: &SessionState) -> ExtractedRecord {
        let mut notes = state.notes_text();
        if notes.is_empty() {
            notes = format_all_notes(&[]);
        }

        let vars = prompt_vars([
            ("entity", state.entity.clone()),
            ("schema", state.schema.to_prompt_string()),
            ("notes", notes),
        ]);

        self.rate_limit.acquire().await;
        let text = match self.completion.complete(PromptTemplate::Extraction, &vars).await {
            Ok(text) => text,
            Err(e) => {
                warn!(iteration = state.iteration, error = %e, "Extraction failed");
                return ExtractedRecord::empty(&state.schema);
            }
        };

        parse_extraction_response(&state.schema, &text).unwrap_or_else(|e| {
            warn!(iteration = state.iteration, error = %e, "Extraction response unusable");
            ExtractedRecord::empty(&state.schema)
        })
    }

    /// Decide whether to run another cycle.
    async fn reflect(&self, state: &SessionState, config: &ResearchConfig) -> ReflectionOutcome {
        let completeness = &state.completeness;
        let good_enough = completeness.is_complete()
            || completeness.score > config.completeness_threshold;

        if good_enough {
            return ReflectionOutcome::stop(SessionStatus::Complete);
        }
        if state.iteration >= config.max_reflection_steps {
            return ReflectionOutcome::stop(SessionStatus::MaxIterations);
        }

        let vars = prompt_vars([
            ("entity", state.entity.clone()),
            ("schema", state.schema.to_prompt_string()),
            (
                "extracted_info",
                serde_json::to_string_pretty(&state.extracted.to_json()).unwrap_or_default(),
            ),
            ("missing_fields", completeness.missing_labels().join(", ")),
            (
                "notes",
                truncate_text(&state.notes_text(), REFLECTION_NOTES_LIMIT, TRUNCATION_MARKER),
            ),
        ]);

        self.rate_limit.acquire().await;
        let response = match self.completion.complete(PromptTemplate::Reflection, &vars).await {
            Ok(text) => parse_reflection_response(&text),
            Err(e) => Err(e.into()),
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(iteration = state.iteration, error = %e, "Reflection failed, stopping");
                return ReflectionOutcome::stop(SessionStatus::FollowUpUnavailable);
            }
        };

        let follow_up_queries = response.queries();
        let is_complete = response.is_complete;
        let analysis = Some(response.analysis).filter(|a| !a.trim().is_empty());

        if is_complete {
            debug!(iteration = state.iteration, "Model judged the record complete");
            return ReflectionOutcome::Stop {
                status: SessionStatus::Complete,
                analysis,
            };
        }
        if follow_up_queries.is_empty() {
            return ReflectionOutcome::Stop {
                status: SessionStatus::FollowUpUnavailable,
                analysis,
            };
        }
        if state.iteration + 1 >= config.max_reflection_steps {
            return ReflectionOutcome::Stop {
                status: SessionStatus::MaxIterations,
                analysis,
            };
        }

        ReflectionOutcome::Continue { follow_up_queries }
    }
}

fn emit(events: Option<&EventSender>, event: ResearchEvent) {
    if let Some(tx) = events {
        // receiver gone means nobody is listening
        let _ = tx.send(event);
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
