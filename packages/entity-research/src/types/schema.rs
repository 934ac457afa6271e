//! Extraction schema: the fields a session tries to fill.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ResearchError, Result};

/// One named field of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Type hint passed through to the model ("string", "array", ...)
    #[serde(rename = "type", default = "default_type_hint")]
    pub type_hint: String,

    /// What the field should contain
    #[serde(default)]
    pub description: String,
}

fn default_type_hint() -> String {
    "string".to_string()
}

impl FieldSpec {
    /// Create a field spec.
    pub fn new(type_hint: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            type_hint: type_hint.into(),
            description: description.into(),
        }
    }
}

/// Named fields with type hints and descriptions, a subset marked required.
///
/// Field names are unique and keep their declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// Optional schema title
    pub title: Option<String>,

    /// Optional schema description
    pub description: Option<String>,

    fields: IndexMap<String, FieldSpec>,

    required: Vec<String>,

    /// Original JSON for fields we don't model (nested items etc.)
    raw_properties: Map<String, Value>,
}

impl Schema {
    /// Start an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a field. Fails on a duplicate name.
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        type_hint: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let spec = FieldSpec::new(type_hint, description);
        if self.fields.contains_key(&name) {
            return Err(ResearchError::config(format!(
                "duplicate schema field: {name}"
            )));
        }
        self.raw_properties.insert(
            name.clone(),
            json!({ "type": spec.type_hint, "description": spec.description }),
        );
        self.fields.insert(name, spec);
        Ok(self)
    }

    /// Add a required field. Fails on a duplicate name.
    pub fn with_required_field(
        self,
        name: impl Into<String>,
        type_hint: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let mut schema = self.with_field(name.clone(), type_hint, description)?;
        schema.required.push(name);
        Ok(schema)
    }

    /// Parse `{properties: {name: {type, description}}, required: [..]}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ResearchError::config("schema must be a JSON object"))?;

        let properties = match obj.get("properties") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ResearchError::config(
                    "schema `properties` must be an object",
                ))
            }
        };

        let mut fields = IndexMap::with_capacity(properties.len());
        for (name, spec) in &properties {
            if name.trim().is_empty() {
                return Err(ResearchError::config("schema field names must not be empty"));
            }
            let spec = spec.as_object().ok_or_else(|| {
                ResearchError::config(format!("schema field `{name}` must be an object"))
            })?;
            let type_hint = match spec.get("type") {
                None => default_type_hint(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            let description = spec
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            fields.insert(name.clone(), FieldSpec::new(type_hint, description));
        }

        let required = match obj.get("required") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ResearchError::config("schema `required` entries must be strings")
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(ResearchError::config("schema `required` must be an array"))
            }
        };

        for name in &required {
            if !fields.contains_key(name) {
                return Err(ResearchError::config(format!(
                    "required field `{name}` is not declared in properties"
                )));
            }
        }

        Ok(Self {
            title: obj.get("title").and_then(Value::as_str).map(str::to_string),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            fields,
            required,
            raw_properties: properties,
        })
    }

    /// Render back to JSON (used when prompting the model).
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(title) = &self.title {
            obj.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(description) = &self.description {
            obj.insert("description".into(), Value::String(description.clone()));
        }
        obj.insert("type".into(), Value::String("object".into()));
        obj.insert("properties".into(), Value::Object(self.raw_properties.clone()));
        obj.insert("required".into(), json!(self.required));
        Value::Object(obj)
    }

    /// Pretty JSON for prompt templates.
    pub fn to_prompt_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields with their specs, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a field.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Whether a field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Whether a field is required.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Required field names.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field name → description, for prompt context.
    pub fn field_descriptions(&self) -> IndexMap<String, String> {
        self.fields
            .iter()
            .map(|(name, spec)| {
                let description = if spec.description.is_empty() {
                    "No description".to_string()
                } else {
                    spec.description.clone()
                };
                (name.clone(), description)
            })
            .collect()
    }

    /// The default company profile schema.
    pub fn company_profile() -> Self {
        let value = json!({
            "title": "Company Information",
            "description": "Comprehensive information about a company",
            "type": "object",
            "properties": {
                "company_name": {"type": "string", "description": "Official registered company name"},
                "founded": {"type": "string", "description": "Year the company was founded"},
                "headquarters": {"type": "string", "description": "City and country of headquarters location"},
                "industry": {"type": "string", "description": "Primary industry or sector"},
                "description": {"type": "string", "description": "Brief overview of what the company does (2-3 sentences)"},
                "products": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of main products or services offered"
                },
                "key_people": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "Person's full name"},
                            "role": {"type": "string", "description": "Job title or position"}
                        },
                        "required": ["name", "role"]
                    },
                    "description": "Key executives and leadership"
                },
                "revenue": {"type": "string", "description": "Most recent annual revenue (if publicly available)"},
                "employee_count": {"type": "string", "description": "Approximate number of employees"},
                "website": {"type": "string", "description": "Official company website URL"}
            },
            "required": ["company_name", "description"]
        });

        // Static literal above is always a valid schema.
        Self::from_json(&value).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_preserves_order_and_required() {
        let schema = Schema::from_json(&json!({
            "properties": {
                "name": {"type": "string", "description": "Entity name"},
                "year": {"type": "integer", "description": "Founding year"},
                "tags": {"type": "array"}
            },
            "required": ["name"]
        }))
        .unwrap();

        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["name", "year", "tags"]);
        assert!(schema.is_required("name"));
        assert!(!schema.is_required("year"));
        assert_eq!(schema.field("year").unwrap().type_hint, "integer");
        assert_eq!(schema.field_descriptions()["tags"], "No description");
    }

    #[test]
    fn test_required_must_be_declared() {
        let err = Schema::from_json(&json!({
            "properties": {"name": {"type": "string"}},
            "required": ["website"]
        }))
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(Schema::from_json(&json!(["name"])).is_err());
        assert!(Schema::from_json(&json!({"properties": []})).is_err());
        assert!(Schema::from_json(&json!({"properties": {}, "required": "name"})).is_err());
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let result = Schema::new()
            .with_field("name", "string", "Name")
            .and_then(|s| s.with_field("name", "string", "Again"));
        assert!(matches!(result, Err(ResearchError::Configuration(_))));
    }

    #[test]
    fn test_to_json_round_trips_fields() {
        let schema = Schema::new()
            .with_title("Person")
            .with_required_field("name", "string", "Full name")
            .unwrap()
            .with_field("born", "string", "Birth year")
            .unwrap();

        let reparsed = Schema::from_json(&schema.to_json()).unwrap();
        assert_eq!(reparsed.field_names().collect::<Vec<_>>(), vec!["name", "born"]);
        assert_eq!(reparsed.required(), &["name".to_string()]);
        assert_eq!(reparsed.title.as_deref(), Some("Person"));
    }

    #[test]
    fn test_company_profile() {
        let schema = Schema::company_profile();
        assert_eq!(schema.len(), 10);
        assert!(schema.is_required("company_name"));
        assert!(schema.is_required("description"));
        // Nested item definitions survive for the prompt
        assert!(schema.to_prompt_string().contains("Person's full name"));
    }
}
