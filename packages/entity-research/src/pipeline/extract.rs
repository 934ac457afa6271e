//! Defensive parsing of model output.
//!
//! Models wrap JSON in prose or code fences, return numbered lists instead of
//! arrays, or drop keys. Every parser here accepts the common shapes and
//! reports [`ResearchError::MalformedResponse`] only when nothing usable is
//! left.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{ResearchError, Result};
use crate::types::record::ExtractedRecord;
use crate::types::schema::Schema;

/// Upper bound on queries parsed out of one response.
pub const MAX_PARSED_QUERIES: usize = 10;

/// Upper bound on follow-up queries taken from one reflection.
pub const MAX_FOLLOW_UP_QUERIES: usize = 3;

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^(?:\d+[.)]?|[-*])\s*").expect("list marker pattern is valid")
    })
}

/// Parse search queries from a query-writer response.
///
/// Strict JSON array first; otherwise every line that starts with a digit,
/// `-` or `*` is taken with its marker stripped. Blank entries are dropped
/// and the result is capped at [`MAX_PARSED_QUERIES`].
pub fn parse_queries_from_response(text: &str) -> Vec<String> {
    let trimmed = strip_code_fence(text.trim());

    let queries: Vec<String> = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => trimmed
            .lines()
            .map(str::trim)
            .filter(|line| {
                line.starts_with(|c: char| c.is_ascii_digit())
                    || line.starts_with('-')
                    || line.starts_with('*')
            })
            .map(|line| list_marker().replace(line, "").trim().to_string())
            .collect(),
    };

    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_PARSED_QUERIES)
        .collect()
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Find the first JSON object in `text`.
///
/// Tries the whole (fence-stripped) text, then the span from the first `{`
/// to the last `}`.
pub fn extract_json_object(text: &str) -> Result<serde_json::Map<String, Value>> {
    let text = strip_code_fence(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            match serde_json::from_str::<Value>(&text[start..=end])? {
                Value::Object(map) => Ok(map),
                _ => Err(ResearchError::malformed("expected a JSON object")),
            }
        }
        _ => Err(ResearchError::malformed("no JSON object in response")),
    }
}

/// Parse an extraction response into a record projected onto `schema`.
///
/// Unknown keys are dropped; missing keys are null.
pub fn parse_extraction_response(schema: &Schema, text: &str) -> Result<ExtractedRecord> {
    let map = extract_json_object(text)?;
    Ok(ExtractedRecord::from_value(schema, &Value::Object(map)))
}

/// Reflection payload returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionResponse {
    #[serde(default)]
    pub analysis: String,

    #[serde(default)]
    pub follow_up_queries: Vec<String>,

    #[serde(default)]
    pub is_complete: bool,
}

impl ReflectionResponse {
    /// Non-blank follow-up queries, capped at [`MAX_FOLLOW_UP_QUERIES`].
    pub fn queries(&self) -> Vec<String> {
        self.follow_up_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .take(MAX_FOLLOW_UP_QUERIES)
            .map(str::to_string)
            .collect()
    }
}

/// Parse a reflection response.
///
/// Accepts a JSON object anywhere in the text. Non-string queries are
/// dropped rather than failing the parse.
pub fn parse_reflection_response(text: &str) -> Result<ReflectionResponse> {
    let map = extract_json_object(text)?;

    let analysis = map
        .get("analysis")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let follow_up_queries = map
        .get("follow_up_queries")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let is_complete = map
        .get("is_complete")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(ReflectionResponse {
        analysis,
        follow_up_queries,
        is_complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queries_from_json_array() {
        let queries = parse_queries_from_response(r#"["acme history", "acme founder"]"#);
        assert_eq!(queries, vec!["acme history", "acme founder"]);
    }

    #[test]
    fn test_queries_from_fenced_json() {
        let queries = parse_queries_from_response("```json\n[\"a\", \"b\"]\n```");
        assert_eq!(queries, vec!["a", "b"]);
    }

    #[test]
    fn test_queries_from_numbered_list() {
        let text = "Here are some queries:\n1. acme headquarters\n2) acme revenue 2024\n- acme ceo\n* acme products\n\nThanks";
        let queries = parse_queries_from_response(text);
        assert_eq!(
            queries,
            vec!["acme headquarters", "acme revenue 2024", "acme ceo", "acme products"]
        );
    }

    #[test]
    fn test_queries_capped_and_blank_dropped() {
        let items: Vec<String> = (0..15).map(|i| format!("q{i}")).collect();
        let mut json = serde_json::to_string(&items).unwrap();
        json = json.replacen("\"q0\"", "\"  \"", 1);
        let queries = parse_queries_from_response(&json);
        assert_eq!(queries.len(), MAX_PARSED_QUERIES);
        assert_eq!(queries[0], "q1");
    }

    #[test]
    fn test_queries_from_prose_is_empty() {
        assert!(parse_queries_from_response("I cannot help with that.").is_empty());
    }

    #[test]
    fn test_extraction_inside_prose() {
        let schema = Schema::from_json(&json!({
            "properties": {"name": {"type": "string"}, "city": {"type": "string"}}
        }))
        .unwrap();
        let text = "Sure! Here is the data:\n```json\n{\"name\": \"Acme\", \"extra\": 1}\n```";
        let record = parse_extraction_response(&schema, text).unwrap();
        assert_eq!(record.get("name"), &json!("Acme"));
        assert_eq!(record.get("city"), &Value::Null);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_extraction_without_object_is_malformed() {
        let schema = Schema::company_profile();
        let err = parse_extraction_response(&schema, "no data found").unwrap_err();
        assert!(matches!(err, ResearchError::MalformedResponse { .. }));
    }

    #[test]
    fn test_reflection_tolerates_missing_keys() {
        let parsed = parse_reflection_response(r#"{"follow_up_queries": ["a", 3, "b", "c", "d"]}"#)
            .unwrap();
        assert_eq!(parsed.analysis, "");
        assert!(!parsed.is_complete);
        assert_eq!(parsed.queries(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reflection_full_payload() {
        let parsed = parse_reflection_response(
            r#"Analysis follows. {"analysis": "missing revenue", "follow_up_queries": ["acme revenue"], "is_complete": false}"#,
        )
        .unwrap();
        assert_eq!(parsed.analysis, "missing revenue");
        assert_eq!(parsed.queries(), vec!["acme revenue"]);
    }
}
