//! Configuration for the provider adapters

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use std::time::Duration;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default chat completion model.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Configuration for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// API key; falls back to `OPENAI_API_KEY` when `None`
    #[builder(default)]
    pub api_key: Option<String>,
    /// API root, e.g. `https://api.openai.com/v1`
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    /// Name of the embedding model to use
    #[builder(default = "DEFAULT_EMBEDDING_MODEL.to_string()")]
    pub model: String,
    /// Requested output dimension, for models that support shortening
    #[builder(default)]
    pub dimensions: Option<usize>,
    /// Per-request timeout in seconds
    #[builder(default = "30")]
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    #[builder(default = "3")]
    pub max_retries: usize,
    /// Base delay of the exponential backoff, in milliseconds
    #[builder(default = "500")]
    pub retry_backoff_ms: u64,
    /// Maximum number of inputs sent in one request
    #[builder(default = "64")]
    pub batch_size: usize,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a configuration for the given model with every other field defaulted
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the API key (builder style)
    pub fn with_api_key<S: Into<String>>(self, api_key: S) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    /// Set the API root (builder style)
    pub fn with_base_url<S: Into<String>>(self, base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Set the requested output dimension (builder style)
    pub fn with_dimensions(self, dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            ..self
        }
    }

    /// Set the batch size for embedding requests (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the retry policy (builder style)
    pub fn with_retries(self, max_retries: usize, retry_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            retry_backoff_ms,
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The key to send, from the configuration or the environment.
    ///
    /// A key set explicitly in the configuration is never overridden by the
    /// environment, even when it is blank.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key(self.api_key.as_deref())
    }

    /// Validate the settings that cannot be checked by the type system
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.base_url, &self.model, self.timeout_secs)?;
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be positive"));
        }
        if self.dimensions == Some(0) {
            return Err(EmbedError::invalid_config("dimensions must be positive"));
        }
        tracing::debug!("Embedding configuration valid for model: {}", self.model);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            batch_size: 64,
        }
    }
}

/// Configuration for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct CompletionConfig {
    /// API key; falls back to `OPENAI_API_KEY` when `None`
    #[builder(default)]
    pub api_key: Option<String>,
    /// API root, e.g. `https://api.openai.com/v1`
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    /// Name of the chat model to use
    #[builder(default = "DEFAULT_COMPLETION_MODEL.to_string()")]
    pub model: String,
    /// Sampling temperature
    #[builder(default = "0.2")]
    pub temperature: f32,
    /// Upper bound on generated tokens
    #[builder(default)]
    pub max_tokens: Option<u32>,
    /// Optional system message sent ahead of every prompt
    #[builder(default)]
    pub system_prompt: Option<String>,
    /// Per-request timeout in seconds
    #[builder(default = "60")]
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    #[builder(default = "3")]
    pub max_retries: usize,
    /// Base delay of the exponential backoff, in milliseconds
    #[builder(default = "500")]
    pub retry_backoff_ms: u64,
}

impl CompletionConfig {
    /// Create a new completion configuration using the builder
    pub fn builder() -> CompletionConfigBuilder {
        CompletionConfigBuilder::default()
    }

    /// Create a configuration for the given model with every other field defaulted
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the API key (builder style)
    pub fn with_api_key<S: Into<String>>(self, api_key: S) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    /// Set the API root (builder style)
    pub fn with_base_url<S: Into<String>>(self, base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Set the system message (builder style)
    pub fn with_system_prompt<S: Into<String>>(self, system_prompt: S) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            ..self
        }
    }

    /// Set the sampling temperature (builder style)
    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self
        }
    }

    /// Set the retry policy (builder style)
    pub fn with_retries(self, max_retries: usize, retry_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            retry_backoff_ms,
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The key to send, from the configuration or the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key(self.api_key.as_deref())
    }

    /// Validate the settings that cannot be checked by the type system
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.base_url, &self.model, self.timeout_secs)?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EmbedError::invalid_config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: None,
            system_prompt: None,
            timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

fn resolve_api_key(configured: Option<&str>) -> Result<String> {
    let key = match configured {
        Some(key) => key.trim().to_string(),
        None => std::env::var(API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .unwrap_or_default(),
    };
    if key.is_empty() {
        return Err(EmbedError::MissingApiKey {
            env_var: API_KEY_ENV,
        });
    }
    Ok(key)
}

fn validate_common(base_url: &str, model: &str, timeout_secs: u64) -> Result<()> {
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(EmbedError::invalid_config(format!(
            "base_url must be an http(s) URL, got {base_url:?}"
        )));
    }
    if model.trim().is_empty() {
        return Err(EmbedError::invalid_config("model name must not be empty"));
    }
    if timeout_secs == 0 {
        return Err(EmbedError::invalid_config("timeout_secs must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_defaults() {
        let config = EmbedConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.batch_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derive_builder_pattern() {
        let config = EmbedConfig::builder()
            .model("text-embedding-3-large")
            .dimensions(Some(256usize))
            .batch_size(8usize)
            .build()
            .unwrap();

        assert_eq!(config.model, "text-embedding-3-large");
        assert_eq!(config.dimensions, Some(256));
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retry_backoff_ms, 500);
    }

    #[test]
    fn test_builder_defaults_match_default_impl() {
        assert_eq!(EmbedConfig::builder().build().unwrap(), EmbedConfig::default());
        assert_eq!(
            CompletionConfig::builder().build().unwrap(),
            CompletionConfig::default()
        );
    }

    #[test]
    fn test_with_methods() {
        let config = EmbedConfig::new("custom")
            .with_api_key("sk-test")
            .with_base_url("http://localhost:8080/v1")
            .with_batch_size(2)
            .with_retries(1, 5);

        assert_eq!(config.model, "custom");
        assert_eq!(config.resolve_api_key().unwrap(), "sk-test");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.batch_size, 2);
        assert_eq!((config.max_retries, config.retry_backoff_ms), (1, 5));
    }

    #[test]
    fn test_blank_explicit_key_is_missing() {
        let config = EmbedConfig::default().with_api_key("   ");
        assert!(matches!(
            config.resolve_api_key(),
            Err(EmbedError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn test_validation_failures() {
        assert!(EmbedConfig::default().with_batch_size(0).validate().is_err());
        assert!(EmbedConfig::default().with_dimensions(0).validate().is_err());
        assert!(
            EmbedConfig::default()
                .with_base_url("ftp://example.com")
                .validate()
                .is_err()
        );
        assert!(EmbedConfig::new("  ").validate().is_err());
        assert!(
            CompletionConfig::default()
                .with_temperature(3.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_completion_defaults() {
        let config = CompletionConfig::default().with_system_prompt("Be brief.");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        assert!(config.validate().is_ok());
    }
}
