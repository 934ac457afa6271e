//! Extracted records and completeness results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::schema::Schema;

/// Strings the model uses to say "I don't know".
pub const EMPTY_SENTINELS: &[&str] = &["null", "unknown", "N/A"];

/// Whether an extracted value counts as empty.
///
/// Empty means null, empty string, one of [`EMPTY_SENTINELS`], or an empty
/// list/map. Numbers and booleans are always filled.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || EMPTY_SENTINELS.contains(&s.as_str()),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Schema field name → extracted value (or null).
///
/// Always holds exactly the schema's fields, in schema order. Unknown keys
/// from the model are dropped; absent known keys are null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord {
    values: IndexMap<String, Value>,
}

impl ExtractedRecord {
    /// A record with every schema field set to null.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            values: schema
                .field_names()
                .map(|name| (name.to_string(), Value::Null))
                .collect(),
        }
    }

    /// Project a model-produced JSON object onto the schema.
    ///
    /// Non-object input yields an all-null record.
    pub fn from_value(schema: &Schema, value: &Value) -> Self {
        let mut record = Self::empty(schema);
        if let Value::Object(map) = value {
            for (name, slot) in record.values.iter_mut() {
                if let Some(v) = map.get(name) {
                    *slot = v.clone();
                }
            }
        }
        record
    }

    /// Value for a field; unknown fields read as null.
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&Value::Null)
    }

    /// Set a field. Ignored if the field is not part of the record.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Whether a field holds a non-empty value.
    pub fn is_filled(&self, field: &str) -> bool {
        !is_empty_value(self.get(field))
    }

    /// Number of filled fields.
    pub fn filled_count(&self) -> usize {
        self.values.values().filter(|v| !is_empty_value(v)).count()
    }

    /// Fold a newer record into this one.
    ///
    /// Newer non-empty values win; newer empty values never erase an
    /// existing one. Returns the names of fields that changed.
    pub fn merge(&mut self, newer: &ExtractedRecord) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, value) in &newer.values {
            if is_empty_value(value) {
                continue;
            }
            if let Some(slot) = self.values.get_mut(name) {
                if slot != value {
                    *slot = value.clone();
                    changed.push(name.clone());
                }
            }
        }
        changed
    }

    /// Iterate fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A schema field with no usable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    pub name: String,
    pub required: bool,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.required {
            write!(f, "{} (required)", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Output of completeness scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessResult {
    /// Empty fields in schema order
    pub missing_fields: Vec<MissingField>,

    /// Filled fields / total fields, in [0, 1]
    pub score: f64,
}

impl CompletenessResult {
    /// Whether every field is filled.
    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }

    /// Missing fields rendered as `name` or `name (required)`.
    pub fn missing_labels(&self) -> Vec<String> {
        self.missing_fields.iter().map(ToString::to_string).collect()
    }

    /// Whether any required field is missing.
    pub fn missing_required(&self) -> bool {
        self.missing_fields.iter().any(|f| f.required)
    }
}
