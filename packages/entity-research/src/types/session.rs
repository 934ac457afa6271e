//! Session state owned by the reflection controller, and what it returns.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{CompletenessResult, ExtractedRecord, MissingField};
use super::schema::Schema;
use super::source::{DedupKey, Source};
use super::query::Query;
use crate::pipeline::format::format_all_notes;

/// Where the controller is in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Researching,
    Extracting,
    Reflecting,
    Terminated,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No missing fields, or the score cleared the threshold.
    Complete,

    /// The reflection budget ran out.
    MaxIterations,

    /// Reflection failed or produced no follow-up queries.
    FollowUpUnavailable,

    /// The session deadline passed; the outcome is partial.
    DeadlineExceeded,

    /// The caller cancelled; the outcome is partial.
    Cancelled,
}

impl SessionStatus {
    /// Whether the session was cut short from outside.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}

/// What reflection decided at the end of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReflectionOutcome {
    /// Run another cycle with these queries.
    Continue { follow_up_queries: Vec<String> },

    /// Stop the session.
    Stop {
        status: SessionStatus,
        /// Model commentary, when the analysis call ran
        #[serde(default)]
        analysis: Option<String>,
    },
}

impl ReflectionOutcome {
    pub fn stop(status: SessionStatus) -> Self {
        Self::Stop {
            status,
            analysis: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }
}

/// Delta one cycle merged into the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Zero-based iteration index
    pub iteration: usize,

    /// Queries dispatched this cycle
    pub queries: Vec<Query>,

    /// Sources first seen this cycle
    pub new_sources: usize,

    /// Notes synthesized this cycle (empty when synthesis was skipped or failed)
    pub notes: String,

    /// Record extracted this cycle, before merging
    pub extracted: ExtractedRecord,

    /// Completeness of the merged record after this cycle
    pub completeness: CompletenessResult,

    /// Reflection decision
    pub outcome: ReflectionOutcome,
}

/// Mutable state of one session.
///
/// Created once per request and owned exclusively by the controller.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: Uuid,
    pub entity: String,
    pub schema: Schema,
    pub user_context: String,
    pub phase: SessionPhase,
    pub iteration: usize,
    /// Extraction passes merged so far
    pub passes: usize,
    pub follow_up_queries: Vec<String>,
    pub extracted: ExtractedRecord,
    pub completeness: CompletenessResult,
    pub status: Option<SessionStatus>,
    pub cycles: Vec<CycleReport>,
    pub started_at: DateTime<Utc>,
    sources: IndexMap<DedupKey, Source>,
    notes: Vec<String>,
}

impl SessionState {
    /// Fresh state: researching, iteration 0, every field null.
    pub fn new(entity: impl Into<String>, schema: Schema, user_context: impl Into<String>) -> Self {
        let extracted = ExtractedRecord::empty(&schema);
        let completeness = CompletenessResult {
            missing_fields: schema
                .field_names()
                .map(|name| MissingField {
                    name: name.to_string(),
                    required: schema.is_required(name),
                })
                .collect(),
            score: if schema.is_empty() { 1.0 } else { 0.0 },
        };

        Self {
            session_id: Uuid::now_v7(),
            entity: entity.into(),
            schema,
            user_context: user_context.into(),
            phase: SessionPhase::Researching,
            iteration: 0,
            passes: 0,
            follow_up_queries: Vec::new(),
            extracted,
            completeness,
            status: None,
            cycles: Vec::new(),
            started_at: Utc::now(),
            sources: IndexMap::new(),
            notes: Vec::new(),
        }
    }

    /// Add sources not seen before. Returns how many were new.
    pub fn absorb_sources(&mut self, sources: impl IntoIterator<Item = Source>) -> usize {
        let before = self.sources.len();
        for source in sources {
            self.sources.entry(source.dedup_key()).or_insert(source);
        }
        self.sources.len() - before
    }

    /// Record one cycle's notes. Empty notes are not kept.
    pub fn push_notes(&mut self, notes: &str) {
        if !notes.trim().is_empty() {
            self.notes.push(notes.to_string());
        }
    }

    /// All sources gathered so far, in first-seen order.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Notes from every cycle, consolidated.
    pub fn notes_text(&self) -> String {
        if self.notes.is_empty() {
            return String::new();
        }
        format_all_notes(&self.notes)
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    /// Stop the session with the given status.
    pub fn terminate(&mut self, status: SessionStatus) {
        self.phase = SessionPhase::Terminated;
        self.status = Some(status);
        self.follow_up_queries.clear();
    }

    /// Consume the state into the caller-facing outcome.
    pub fn into_outcome(self) -> SessionOutcome {
        let notes = self.notes_text();
        SessionOutcome {
            session_id: self.session_id,
            entity: self.entity,
            missing_fields: self.completeness.missing_labels(),
            score: self.completeness.score,
            extracted: self.extracted,
            notes,
            iterations_run: self.passes,
            status: self.status.unwrap_or(SessionStatus::Cancelled),
            sources: self.sources.into_values().collect(),
            cycles: self.cycles,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Structured result of a session. Always returned once a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub entity: String,
    pub extracted: ExtractedRecord,
    pub notes: String,
    /// Missing fields, required ones tagged `(required)`
    pub missing_fields: Vec<String>,
    pub score: f64,
    /// Extraction passes completed
    pub iterations_run: usize,
    pub status: SessionStatus,
    pub sources: Vec<Source>,
    pub cycles: Vec<CycleReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Progress notifications emitted while a session runs.
#[derive(Debug, Clone)]
pub enum ResearchEvent {
    CycleStarted {
        iteration: usize,
        queries: Vec<Query>,
    },
    SearchCompleted {
        iteration: usize,
        raw_hits: usize,
        unique_sources: usize,
        skipped_queries: usize,
    },
    NotesWritten {
        iteration: usize,
        chars: usize,
    },
    Extracted {
        iteration: usize,
        filled: usize,
        total: usize,
    },
    Reflected {
        iteration: usize,
        score: f64,
        missing_fields: Vec<String>,
        outcome: ReflectionOutcome,
    },
    Finished(Box<SessionOutcome>),
}
