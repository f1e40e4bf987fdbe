//! Configuration for ingestion and query serving
//!
//! Every setting has a default, so an empty or missing TOML file is a valid
//! configuration. A typical file looks like:
//!
//! ```toml
//! corpus_dir = "docs"
//! index_dir = "rag"
//! top_k = 5
//! relevance_threshold = 0.28
//!
//! [embedding]
//! model = "text-embedding-3-small"
//!
//! [completion]
//! model = "gpt-4o-mini"
//! temperature = 0.2
//! ```

use crate::error::{Result, RetrieverError};
use echohealth_context::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, WindowChunker};
use echohealth_embed::config::{DEFAULT_BASE_URL, DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL};
use echohealth_embed::{CompletionConfig, EmbedConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of passages retrieved per query unless overridden.
pub const DEFAULT_TOP_K: usize = 5;

/// Minimum cosine similarity for a hit to count as usable context.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.28;

/// Sentence cap written into the grounded prompt.
pub const DEFAULT_MAX_SENTENCES: usize = 5;

/// Settings for ingestion, retrieval and prompt composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrieverConfig {
    /// Directory holding the source documents
    pub corpus_dir: PathBuf,
    /// Directory holding the persisted index snapshot
    pub index_dir: PathBuf,
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
    /// Passages retrieved per query
    pub top_k: usize,
    /// Hits scoring below this are discarded
    pub relevance_threshold: f32,
    /// Sentence cap for grounded answers
    pub max_sentences: usize,
    /// Embedding requests in flight during ingestion
    pub embed_concurrency: usize,
    /// How the corpus is named in prompts and refusals
    pub corpus_name: String,
    /// Role the answering model is asked to play
    pub assistant_role: String,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
}

/// `[embedding]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub batch_size: usize,
}

/// `[completion]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("docs"),
            index_dir: PathBuf::from("rag"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_OVERLAP,
            top_k: DEFAULT_TOP_K,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            max_sentences: DEFAULT_MAX_SENTENCES,
            embed_concurrency: 8,
            corpus_name: "MEDLINE".to_string(),
            assistant_role: "Health Information Assistant".to_string(),
            embedding: EmbeddingSettings::default(),
            completion: CompletionSettings::default(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        let defaults = EmbedConfig::default();
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            dimensions: None,
            timeout_secs: defaults.timeout_secs,
            max_retries: defaults.max_retries,
            batch_size: defaults.batch_size,
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        let defaults = CompletionConfig::default();
        Self {
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            temperature: defaults.temperature,
            max_tokens: None,
            timeout_secs: defaults.timeout_secs,
            max_retries: defaults.max_retries,
        }
    }
}

impl RetrieverConfig {
    /// Read and validate a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML configuration text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The file's configuration when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject settings no component could work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RetrieverError::config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RetrieverError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(-1.0..=1.0).contains(&self.relevance_threshold) {
            return Err(RetrieverError::config(format!(
                "relevance_threshold must be within [-1, 1], got {}",
                self.relevance_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(RetrieverError::config("top_k must be positive"));
        }
        if self.max_sentences == 0 {
            return Err(RetrieverError::config("max_sentences must be positive"));
        }
        if self.embed_concurrency == 0 {
            return Err(RetrieverError::config("embed_concurrency must be positive"));
        }
        if self.embedding.batch_size == 0 {
            return Err(RetrieverError::config("embedding.batch_size must be positive"));
        }
        Ok(())
    }

    /// Set the corpus directory (builder style)
    pub fn with_corpus_dir(self, corpus_dir: impl Into<PathBuf>) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            ..self
        }
    }

    /// Set the index directory (builder style)
    pub fn with_index_dir(self, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            ..self
        }
    }

    /// Set the chunk window (builder style)
    pub fn with_chunking(self, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..self
        }
    }

    /// Set the number of passages per query (builder style)
    pub fn with_top_k(self, top_k: usize) -> Self {
        Self { top_k, ..self }
    }

    /// Set the relevance threshold (builder style)
    pub fn with_relevance_threshold(self, relevance_threshold: f32) -> Self {
        Self {
            relevance_threshold,
            ..self
        }
    }

    /// Set the sentence cap (builder style)
    pub fn with_max_sentences(self, max_sentences: usize) -> Self {
        Self {
            max_sentences,
            ..self
        }
    }

    /// Set the ingestion embedding concurrency (builder style)
    pub fn with_embed_concurrency(self, embed_concurrency: usize) -> Self {
        Self {
            embed_concurrency,
            ..self
        }
    }

    /// The chunker described by `chunk_size` and `chunk_overlap`.
    pub fn chunker(&self) -> Result<WindowChunker> {
        Ok(WindowChunker::new(self.chunk_size, self.chunk_overlap)?)
    }

    /// Provider configuration for the `[embedding]` table.
    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig {
            api_key: self.embedding.api_key.clone(),
            base_url: self.embedding.base_url.clone(),
            model: self.embedding.model.clone(),
            dimensions: self.embedding.dimensions,
            timeout_secs: self.embedding.timeout_secs,
            max_retries: self.embedding.max_retries,
            batch_size: self.embedding.batch_size,
            ..EmbedConfig::default()
        }
    }

    /// Provider configuration for the `[completion]` table.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            api_key: self.completion.api_key.clone(),
            base_url: self.completion.base_url.clone(),
            model: self.completion.model.clone(),
            temperature: self.completion.temperature,
            max_tokens: self.completion.max_tokens,
            timeout_secs: self.completion.timeout_secs,
            max_retries: self.completion.max_retries,
            ..CompletionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RetrieverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 1200);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.relevance_threshold, 0.28);
        assert_eq!(config.index_dir, PathBuf::from("rag"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RetrieverConfig::from_toml(
            r#"
            index_dir = "/srv/index"
            top_k = 3

            [embedding]
            model = "text-embedding-3-large"
            dimensions = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.index_dir, PathBuf::from("/srv/index"));
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunk_size, 1200);
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.embedding.dimensions, Some(256));
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.completion.model, "gpt-4o-mini");

        let embed = config.embed_config();
        assert_eq!(embed.model, "text-embedding-3-large");
        assert_eq!(embed.dimensions, Some(256));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = RetrieverConfig::from_toml("top_kk = 3").unwrap_err();
        assert!(matches!(err, RetrieverError::Toml { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = RetrieverConfig::default();
        assert!(base.clone().with_chunking(0, 0).validate().is_err());
        assert!(base.clone().with_chunking(100, 100).validate().is_err());
        assert!(base.clone().with_relevance_threshold(1.5).validate().is_err());
        assert!(base.clone().with_relevance_threshold(-1.0).validate().is_ok());
        assert!(base.clone().with_top_k(0).validate().is_err());
        assert!(base.clone().with_embed_concurrency(0).validate().is_err());
        assert!(base.with_max_sentences(0).validate().is_err());

        let err = RetrieverConfig::from_toml("chunk_size = 10\nchunk_overlap = 20").unwrap_err();
        assert!(matches!(err, RetrieverError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "corpus_dir = \"medline\"\nrelevance_threshold = 0.5").unwrap();

        let config = RetrieverConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.corpus_dir, PathBuf::from("medline"));
        assert_eq!(config.relevance_threshold, 0.5);

        assert_eq!(RetrieverConfig::load(None).unwrap(), RetrieverConfig::default());
    }

    #[test]
    fn test_chunker_follows_settings() {
        let chunker = RetrieverConfig::default()
            .with_chunking(300, 50)
            .chunker()
            .unwrap();
        assert_eq!(chunker.chunk_size(), 300);
        assert_eq!(chunker.overlap(), 50);
    }
}
