//! Schema-driven completeness scoring.

use crate::types::record::{CompletenessResult, ExtractedRecord, MissingField};
use crate::types::schema::Schema;

/// Score `record` against `schema`.
///
/// Pure: every schema field whose value is empty is listed as missing, in
/// schema order. `score = filled / total`, and an empty schema scores 1.0.
pub fn score_completeness(record: &ExtractedRecord, schema: &Schema) -> CompletenessResult {
    let total = schema.len();
    if total == 0 {
        return CompletenessResult {
            missing_fields: Vec::new(),
            score: 1.0,
        };
    }

    let missing_fields: Vec<MissingField> = schema
        .field_names()
        .filter(|name| !record.is_filled(name))
        .map(|name| MissingField {
            name: name.to_string(),
            required: schema.is_required(name),
        })
        .collect();

    let filled = total - missing_fields.len();
    CompletenessResult {
        missing_fields,
        score: filled as f64 / total as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(&json!({
            "properties": {
                "name": {"type": "string"},
                "founded": {"type": "string"},
                "products": {"type": "array"},
                "people": {"type": "object"}
            },
            "required": ["name", "founded"]
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_record_scores_zero() {
        let schema = schema();
        let result = score_completeness(&ExtractedRecord::empty(&schema), &schema);
        assert_eq!(result.score, 0.0);
        assert_eq!(
            result.missing_labels(),
            vec!["name (required)", "founded (required)", "products", "people"]
        );
    }

    #[test]
    fn test_one_of_four_filled() {
        let schema = schema();
        let record = ExtractedRecord::from_value(&schema, &json!({"name": "Acme"}));
        let result = score_completeness(&record, &schema);
        assert_eq!(result.score, 0.25);
        assert_eq!(result.missing_fields.len(), 3);
        assert!(result.missing_required());
    }

    #[test]
    fn test_sentinels_and_empty_collections_are_missing() {
        let schema = schema();
        let record = ExtractedRecord::from_value(
            &schema,
            &json!({"name": "unknown", "founded": "N/A", "products": [], "people": {}}),
        );
        let result = score_completeness(&record, &schema);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.missing_fields.len(), 4);
    }

    #[test]
    fn test_all_filled() {
        let schema = schema();
        let record = ExtractedRecord::from_value(
            &schema,
            &json!({"name": "Acme", "founded": "1949", "products": ["anvils"], "people": {"ceo": "W. E. Coyote"}}),
        );
        let result = score_completeness(&record, &schema);
        assert_eq!(result.score, 1.0);
        assert!(result.is_complete());
    }

    #[test]
    fn test_empty_schema_is_vacuously_complete() {
        let schema = Schema::new();
        let result = score_completeness(&ExtractedRecord::empty(&schema), &schema);
        assert_eq!(result.score, 1.0);
        assert!(result.missing_fields.is_empty());
    }
}
