//! Completion provider implementations
//!
//! A completion provider turns a fully composed prompt into the model's answer.
//! The retrieval core never calls one itself; binaries use it to finish a
//! grounded prompt when asked to.

use crate::client::ApiClient;
use crate::config::CompletionConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for language models that complete a prompt
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send `prompt` to the model and return its reply
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Name of the underlying model
    fn model_name(&self) -> &str;
}

/// Completion provider for OpenAI-compatible `/chat/completions` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiCompletionProvider {
    config: CompletionConfig,
    client: ApiClient,
}

impl OpenAiCompletionProvider {
    /// Builds a provider, resolving the API key and validating the configuration.
    pub fn new(config: CompletionConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.resolve_api_key()?;
        let client = ApiClient::new(
            &api_key,
            &config.base_url,
            config.timeout(),
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )?;
        tracing::info!(
            "Initialized OpenAI completion provider: model={}, endpoint={}",
            config.model,
            client.endpoint("chat/completions")
        );
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn messages<'a>(&'a self, prompt: &'a str) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.config.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        messages
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: self.messages(prompt),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let response: ChatResponse = self.client.post_json("chat/completions", &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EmbedError::unexpected_response("completion returned no content"))?;
        tracing::debug!("Completion returned {} characters", content.chars().count());
        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}
