//! Bounded-length text rendering of sources and notes.

use crate::types::source::Source;

/// Appended to any text cut short by the formatter.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Rough characters-per-token ratio used for content limits.
pub const CHARS_PER_TOKEN: usize = 4;

const RULE_WIDTH: usize = 60;

/// Formatting knobs for [`format_sources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Append each source's raw page content
    pub include_raw_content: bool,

    /// Raw content limit per source, in tokens
    pub max_tokens_per_source: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            include_raw_content: true,
            max_tokens_per_source: 1000,
        }
    }
}

impl FormatOptions {
    pub fn new(include_raw_content: bool, max_tokens_per_source: usize) -> Self {
        Self {
            include_raw_content,
            max_tokens_per_source,
        }
    }

    /// Character budget for raw content.
    pub fn char_limit(&self) -> usize {
        self.max_tokens_per_source.saturating_mul(CHARS_PER_TOKEN)
    }
}

/// Render sources as one deterministic text block for the model.
///
/// Input order is preserved. Empty input renders `No sources found.`.
pub fn format_sources(sources: &[Source], options: FormatOptions) -> String {
    if sources.is_empty() {
        return "No sources found.".to_string();
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::from("Sources:\n\n");

    for (idx, source) in sources.iter().enumerate() {
        out.push_str(&format!("Source {}: {}\n", idx + 1, source.title));
        out.push_str(&format!("{rule}\nURL: {}\n", source.url));
        out.push_str(&format!("{rule}\nSnippet: {}\n{rule}\n", source.snippet));

        if options.include_raw_content {
            let raw = source.raw_content.as_deref().unwrap_or_default();
            let raw = truncate_text(raw, options.char_limit(), TRUNCATION_MARKER);
            out.push_str(&format!(
                "Full Content (limited to {} tokens):\n{}\n\n",
                options.max_tokens_per_source, raw
            ));
        }
    }

    out.trim().to_string()
}

/// Consolidate per-cycle notes, one headed section per cycle.
pub fn format_all_notes(notes: &[String]) -> String {
    if notes.is_empty() {
        return "No research notes available.".to_string();
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    for (idx, note) in notes.iter().enumerate() {
        out.push_str(&format!(
            "\n{rule}\nResearch Iteration {}:\n{rule}\n{note}\n{rule}\n",
            idx + 1
        ));
    }
    out.trim().to_string()
}

/// Cut `text` to at most `max_chars` characters, appending `suffix` when cut.
///
/// Counts chars, so a multi-byte code point is never split.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], suffix),
        None => text.to_string(),
    }
}
