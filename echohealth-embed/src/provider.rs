//! Embedding provider implementations

use crate::client::ApiClient;
use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of embedding generation
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of embeddings.
    ///
    /// The dimension is inferred from the first embedding vector.
    /// If the embeddings vector is empty, dimension defaults to 0.
    ///
    /// # Arguments
    /// * `embeddings` - Vector of embedding vectors, where each inner vector represents
    ///   the embedding for one input text
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Whether every vector has the same length as the first.
    pub fn is_uniform(&self) -> bool {
        self.embeddings.iter().all(|e| e.len() == self.dimension)
    }
}

/// Trait for embedding providers that turn text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::unexpected_response("provider returned no embedding"))
    }

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Dimension of the vectors this provider produces, when known before a call
    fn embedding_dimension(&self) -> Option<usize>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Name of the underlying model
    fn model_name(&self) -> &str;
}

/// Output dimension of well-known OpenAI embedding models at full length.
pub fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    config: EmbedConfig,
    client: ApiClient,
}

impl OpenAiEmbeddingProvider {
    /// Builds a provider, resolving the API key and validating the configuration.
    pub fn new(config: EmbedConfig) -> Result<Self> {
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
            "Initialized OpenAI embedding provider: model={}, endpoint={}",
            config.model,
            client.endpoint("embeddings")
        );
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: inputs,
            dimensions: self.config.dimensions,
        };
        let mut response: EmbeddingResponse = self.client.post_json("embeddings", &request).await?;
        response.data.sort_by_key(|entry| entry.index);
        if response.data.len() != inputs.len() {
            return Err(EmbedError::unexpected_response(format!(
                "provider returned {} embeddings for {} inputs",
                response.data.len(),
                inputs.len()
            )));
        }
        Ok(response
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            tracing::debug!("Embedding batch of {} texts", batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }

        let result = EmbeddingResult::new(embeddings);
        if !result.is_uniform() {
            return Err(EmbedError::unexpected_response(
                "provider returned embeddings of differing dimensions",
            ));
        }
        if let Some(expected) = self.embedding_dimension() {
            if !result.is_empty() && result.dimension != expected {
                return Err(EmbedError::unexpected_response(format!(
                    "expected {expected}-dimensional embeddings, provider returned {}",
                    result.dimension
                )));
            }
        }
        Ok(result)
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.config
            .dimensions
            .or_else(|| known_dimension(&self.config.model))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
