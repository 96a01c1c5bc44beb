//! # Definition Provider Module
//!
//! ## Purpose
//! Client interface to the external definition generation service. Given a
//! sentence context with the target word marked, the provider returns a
//! structured definition with one or more senses and a usage example.
//!
//! ## Input/Output Specification
//! - **Input**: `{ context_text, word }` where the context contains the word
//!   exactly once wrapped in the selection marker
//! - **Output**: `WordDefinition` with at least one definition line
//! - **Failure**: Any malformed or empty response is a provider error scoped
//!   to the single requesting word
//!
//! ## Key Features
//! - Trait seam so sessions and tests can swap implementations
//! - OpenAI-compatible chat-completions implementation with JSON response
//!   format and a templated glossary prompt
//! - Scalar `definition` payloads promoted to one-element lists

use crate::config::ProviderConfig;
use crate::errors::{AnnotateError, Result};
use crate::utils::preview;
use crate::WordDefinition;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One definition request
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionRequest {
    /// Sentence window with the target occurrence wrapped in `[[ ]]`
    pub context_text: String,
    /// The word to define
    pub word: String,
}

/// External definition generation service
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    /// Provider identifier for logging
    fn name(&self) -> &str;

    /// Generate a definition for the marked word in its context
    async fn define(&self, request: DefinitionRequest) -> Result<WordDefinition>;
}

/// OpenAI-compatible chat-completions provider
#[derive(Debug)]
pub struct OpenAiProvider {
    config: ProviderConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
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

const SYSTEM_PROMPT: &str = "You are an expert at defining terms in context. \
    Explain what the marked word means where it is used, precisely and \
    concisely. Respond with JSON only.";

impl OpenAiProvider {
    /// Create a new provider from configuration.
    ///
    /// Fails when no API key is configured: the server cannot generate
    /// definitions without one.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.clone().filter(|key| !key.is_empty());
        let Some(api_key) = api_key else {
            return Err(AnnotateError::Config {
                message: "Provider API key is required (set ANNOTATOR_OPENAI_API_KEY)".to_string(),
            });
        };

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse()
                .map_err(|e| AnnotateError::Config {
                    message: format!("Invalid API key format: {}", e),
                })?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .user_agent("doc-annotator/0.1")
            .build()
            .map_err(|e| AnnotateError::Network {
                details: e.to_string(),
            })?;

        Ok(Self { config, client })
    }

    fn build_prompt(&self, request: &DefinitionRequest) -> String {
        format!(
            "### Instructions\n\
             Write the meaning of the marked word and one usage example. Use \
             the surrounding context to pick the right sense, describe it in \
             compressed factual lines, and write one easy sentence that uses \
             the word naturally.\n\
             ### Rules\n\
             1. The target word is wrapped in double brackets (\"[[word]]\") in the context.\n\
             2. If the word is ambiguous, give only the sense that fits this context.\n\
             3. Keep definition lines short; avoid filler words and opinions.\n\
             4. The example must be a single plain sentence using the word.\n\
             ### Output format (JSON)\n\
             {{\"word\": \"<word>\", \"definition\": [\"<sense 1>\", ...], \"example\": \"<example sentence>\"}}\n\
             ### Context\n{}\n\
             ### Word\n{}",
            request.context_text, request.word
        )
    }

    fn parse_payload(&self, content: &str) -> Result<WordDefinition> {
        let definition: WordDefinition =
            serde_json::from_str(content).map_err(|e| AnnotateError::Provider {
                details: format!("malformed definition payload: {}", e),
            })?;

        if definition.word.is_empty() {
            return Err(AnnotateError::provider("definition payload has no word"));
        }
        if definition.definition_lines.is_empty()
            || definition.definition_lines.iter().all(|l| l.trim().is_empty())
        {
            return Err(AnnotateError::provider(
                "definition payload has no definition lines",
            ));
        }

        Ok(definition)
    }
}

#[async_trait]
impl DefinitionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn define(&self, request: DefinitionRequest) -> Result<WordDefinition> {
        tracing::debug!(
            word = %request.word,
            context = %preview(&request.context_text, 80),
            "requesting definition"
        );

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.build_prompt(&request),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AnnotateError::Provider {
                details: format!("request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AnnotateError::Provider {
                details: format!("HTTP {}: {}", status, preview(&detail, 200)),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AnnotateError::Provider {
            details: format!("unreadable completion payload: {}", e),
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AnnotateError::provider("completion has no content"))?;

        self.parse_payload(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(ProviderConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn request() -> DefinitionRequest {
        DefinitionRequest {
            context_text: "Cats are [[mammals]]. Dogs are mammals too.".to_string(),
            word: "mammals".to_string(),
        }
    }

    fn completion_with(content: serde_json::Value) -> serde_json::Value {
        json!({
            "choices": [{
                "message": { "role": "assistant", "content": content.to_string() }
            }]
        })
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let error = OpenAiProvider::new(ProviderConfig {
            api_key: None,
            ..crate::Config::default().provider
        })
        .unwrap_err();
        assert_eq!(error.category(), "configuration");
    }

    #[tokio::test]
    async fn test_define_parses_structured_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(json!({
                "word": "mammals",
                "definition": ["warm-blooded vertebrates", "animals that nurse their young"],
                "example": "Whales are mammals that live in the ocean."
            }))))
            .mount(&server)
            .await;

        let definition = provider_for(&server).define(request()).await.unwrap();
        assert_eq!(definition.word, "mammals");
        assert_eq!(definition.definition_lines.len(), 2);
        assert!(!definition.example.is_empty());
    }

    #[tokio::test]
    async fn test_scalar_definition_is_promoted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(json!({
                "word": "x",
                "definition": "single string",
                "example": "e"
            }))))
            .mount(&server)
            .await;

        let definition = provider_for(&server).define(request()).await.unwrap();
        assert_eq!(definition.definition_lines, vec!["single string".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_with(json!({ "word": "x" }))),
            )
            .mount(&server)
            .await;

        let error = provider_for(&server).define(request()).await.unwrap_err();
        assert_eq!(error.category(), "provider");
        assert!(error.is_recoverable());
    }

    #[tokio::test]
    async fn test_http_failure_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let error = provider_for(&server).define(request()).await.unwrap_err();
        assert_eq!(error.category(), "provider");
    }

    #[tokio::test]
    async fn test_empty_definition_lines_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(json!({
                "word": "x",
                "definition": [],
                "example": "e"
            }))))
            .mount(&server)
            .await;

        let error = provider_for(&server).define(request()).await.unwrap_err();
        assert_eq!(error.category(), "provider");
    }
}
