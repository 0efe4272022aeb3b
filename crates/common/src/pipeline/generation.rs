//! Text generation clients
//!
//! A generator turns a rendered prompt into candidate replies. Only the
//! first candidate is consumed downstream; asking for more is useful for
//! logging and offline evaluation.

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::models::NO_ANSWER_TEXT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for prompt completion
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete the prompt. An empty list is not an error at this stage.
    async fn generate(&self, prompt: &str) -> Result<Vec<String>>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible chat-completions endpoints
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    candidates: u32,
    base_url: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    n: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            candidates: config.candidates.max(1),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    /// Resolve the chat completions endpoint from the base URL
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

fn candidates_from(response: ChatResponse) -> Vec<String> {
    response
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .collect()
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            n: self.candidates,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::GenerationError {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| AppError::GenerationError {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        let replies = candidates_from(chat_response);
        debug!(candidates = replies.len(), model = %self.model, "Generation completed");
        Ok(replies)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Canned generator for tests and offline runs
pub struct MockGenerator {
    replies: Vec<String>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::with_replies(vec![serde_json::json!({
            "answer": NO_ANSWER_TEXT,
            "references": []
        })
        .to_string()])
    }
}

impl MockGenerator {
    /// Always answer with these replies, whatever the prompt
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self { replies }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Vec<String>> {
        Ok(self.replies.clone())
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "mock" => Ok(Arc::new(MockGenerator::default())),
        other => Err(AppError::Configuration {
            message: format!("Unknown generation provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_contents_are_dropped() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [
                {"message": {"role": "assistant", "content": null}},
                {"message": {"role": "assistant", "content": "{\"answer\": \"a\", \"references\": []}"}}
            ]}"#,
        )
        .unwrap();
        let replies = candidates_from(response);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with('{'));
    }

    #[test]
    fn test_missing_choices_gives_no_candidates() {
        let response: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(candidates_from(response).is_empty());
    }

    #[test]
    fn test_endpoint_resolution() {
        let mut config = GenerationConfig::default();
        config.api_base = Some("http://localhost:1234/v1/".into());
        assert_eq!(
            OpenAIGenerator::new(&config).unwrap().endpoint(),
            "http://localhost:1234/v1/chat/completions"
        );

        config.api_base = Some("https://llm.internal/v1/chat/completions".into());
        assert_eq!(
            OpenAIGenerator::new(&config).unwrap().endpoint(),
            "https://llm.internal/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage { role: "user", content: "prompt" }],
            max_tokens: 256,
            temperature: 0.1,
            n: 2,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["n"], 2);
        assert_eq!(value["max_tokens"], 256);
    }

    #[tokio::test]
    async fn test_mock_generator_defaults_to_no_answer() {
        let replies = MockGenerator::default().generate("anything").await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains(NO_ANSWER_TEXT));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = GenerationConfig {
            provider: "bedrock".into(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
