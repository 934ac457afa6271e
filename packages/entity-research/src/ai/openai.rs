//! OpenAI implementation of the [`TextCompletion`] trait.
//!
//! A reference implementation using the chat completions endpoint. Any
//! OpenAI-compatible server works via [`OpenAiCompletion::with_base_url`].
//!
//! # Example
//!
//! ```rust,ignore
//! use entity_research::ai::OpenAiCompletion;
//!
//! let completion = OpenAiCompletion::from_env()?.with_model("gpt-4o");
//! let controller = ReflectionController::new(registry, Arc::new(completion));
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult, Result};
use crate::pipeline::prompts::PromptTemplate;
use crate::security::ApiKey;
use crate::traits::ai::{PromptVariables, TextCompletion};

/// OpenAI-backed text completion.
///
/// The rendered template is sent as the system message and a short
/// per-template instruction as the user message. Temperature follows the
/// template.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiCompletion {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 4096,
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ApiKey::from_env("OPENAI_API_KEY")?))
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for Azure, proxies, local servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Cap on generated tokens per call.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, template: PromptTemplate, variables: &PromptVariables) -> ChatRequest {
        let entity = variables.get("entity").map(String::as_str).unwrap_or_default();
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: template.render(variables),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: template.instruction(entity),
                },
            ],
            temperature: Some(template.temperature()),
            max_tokens: Some(self.max_tokens),
        }
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> ModelResult<String> {
        let request = self.build_request(template, variables);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Request(Box::new(e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ai::prompt_vars;

    #[test]
    fn test_request_uses_rendered_template() {
        let completion = OpenAiCompletion::new("sk-test").with_model("gpt-4o");
        let vars = prompt_vars([
            ("entity", "Acme"),
            ("schema", "{}"),
            ("notes", "Founded 1949."),
        ]);

        let request = completion.build_request(PromptTemplate::Extraction, &vars);

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.3));
        assert!(request.messages[0].content.contains("Founded 1949."));
        assert_eq!(request.messages[1].content, "Extract structured data for Acme.");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let completion = OpenAiCompletion::new("sk-test").with_base_url("http://localhost:11434/v1/");
        assert_eq!(completion.base_url, "http://localhost:11434/v1");
        assert!(!format!("{:?}", completion).contains("sk-test"));
    }
}
