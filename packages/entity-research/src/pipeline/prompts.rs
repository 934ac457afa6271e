//! LLM prompts for the research loop.
//!
//! Each prompt is addressed by a [`PromptTemplate`] id. Variables use
//! `{name}` placeholders; literal braces in JSON examples are doubled.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::traits::ai::PromptVariables;

/// Prompt for writing the initial search queries.
pub const QUERY_WRITER_PROMPT: &str = r#"You are a search query expert researching an entity.

Target: {entity}

Generate at most {max_search_queries} targeted web search queries that together
gather the information described by this schema:

<schema>
{schema}
</schema>

<user_context>
{user_context}
</user_context>

Your queries should:
1. Include the entity name and relevant terms
2. Target official sources, news coverage, and reliable registries or databases
3. Cover indirect sources too (partner announcements, filings, directories)
4. Be specific enough to avoid irrelevant results

Return ONLY a JSON array of query strings:
["query 1", "query 2", "query 3"]"#;

/// Prompt for turning search results into research notes.
pub const RESEARCH_NOTES_PROMPT: &str = r#"You are conducting web research on: {entity}

The following schema shows the information we are interested in:

<schema>
{schema}
</schema>

Here is the content gathered from web search:

<website_contents>
{content}
</website_contents>

<user_context>
{user_context}
</user_context>

Write clear, organized research notes that:
1. Focus on topics mentioned in the schema
2. Include specific facts, dates, and figures when available
3. Stay faithful to the source content
4. Point out information that appears missing or unclear
5. Distinguish direct sources (official site, announcements) from indirect ones

Do not format the notes to match the schema. Just capture the relevant facts."#;

/// Prompt for extracting a JSON record from research notes.
pub const EXTRACTION_PROMPT: &str = r#"You are a data extraction specialist.

Extract information about {entity} from the research notes according to this JSON schema:

<schema>
{schema}
</schema>

<research_notes>
{notes}
</research_notes>

Rules:
1. Fill only fields that the notes support
2. Use null where information is not available
3. Match the schema's types (strings, arrays, objects)
4. Include every relevant item for array fields
5. Do not guess or invent values

Return ONLY a valid JSON object whose keys are the schema's property names."#;

/// Prompt for reflection: explain gaps and propose follow-up queries.
pub const REFLECTION_PROMPT: &str = r#"You are a research quality analyst reviewing what we know about {entity}.

<schema>
{schema}
</schema>

<extracted_info>
{extracted_info}
</extracted_info>

<missing_fields>
{missing_fields}
</missing_fields>

<previous_research_notes>
{notes}
</previous_research_notes>

Tasks:
1. Decide which missing fields matter most
2. Consider why they might be missing
3. Write 2-3 specific search queries likely to find them
4. Consider both direct and indirect sources

Some fields may legitimately be unavailable. Focus on what can be found.

Return JSON:
{{
    "analysis": "Brief analysis of what is missing and why",
    "follow_up_queries": ["specific query 1", "specific query 2"],
    "is_complete": false
}}"#;

/// Template ids understood by every [`crate::TextCompletion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    QueryWriter,
    ResearchNotes,
    Extraction,
    Reflection,
}

impl PromptTemplate {
    /// Stable id, for logs and mocks.
    pub fn id(&self) -> &'static str {
        match self {
            Self::QueryWriter => "query_writer",
            Self::ResearchNotes => "research_notes",
            Self::Extraction => "extraction",
            Self::Reflection => "reflection",
        }
    }

    /// Template text with `{placeholders}`.
    pub fn text(&self) -> &'static str {
        match self {
            Self::QueryWriter => QUERY_WRITER_PROMPT,
            Self::ResearchNotes => RESEARCH_NOTES_PROMPT,
            Self::Extraction => EXTRACTION_PROMPT,
            Self::Reflection => REFLECTION_PROMPT,
        }
    }

    /// Short instruction sent as the user turn alongside the template.
    pub fn instruction(&self, entity: &str) -> String {
        match self {
            Self::QueryWriter => format!("Generate search queries for: {entity}"),
            Self::ResearchNotes => format!("Create research notes for {entity}."),
            Self::Extraction => format!("Extract structured data for {entity}."),
            Self::Reflection => format!("Analyze extraction quality for {entity}."),
        }
    }

    /// Suggested sampling temperature.
    pub fn temperature(&self) -> f32 {
        match self {
            Self::QueryWriter | Self::ResearchNotes => 0.7,
            Self::Extraction => 0.3,
            Self::Reflection => 0.5,
        }
    }

    /// Render with variables. Unknown placeholders are left as-is.
    pub fn render(&self, variables: &PromptVariables) -> String {
        render_template(self.text(), variables)
    }

    /// Hash of the template text, for caching/versioning.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text().as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Render caller-supplied context for the `{user_context}` slot.
pub fn user_context_block(user_context: &str) -> String {
    let trimmed = user_context.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\nAdditional context: {trimmed}")
    }
}

/// Single-pass `{name}` substitution.
///
/// `{{` and `}}` render as literal braces. Substituted values are never
/// re-scanned, so braces inside variables are safe.
pub fn render_template(template: &str, variables: &PromptVariables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            match tail[1..].find('}') {
                Some(end) => {
                    let name = &tail[1..1 + end];
                    match variables.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&tail[..end + 2]),
                    }
                    rest = &tail[end + 2..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}
