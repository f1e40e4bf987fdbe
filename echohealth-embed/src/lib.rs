//! # echohealth-embed
//!
//! Provider adapters for the models the retrieval core depends on but does not
//! run itself: an embedding model that turns text into vectors, and a chat model
//! that turns a grounded prompt into an answer. Both are reached over
//! OpenAI-compatible HTTP endpoints and hidden behind small async traits, so the
//! core can be exercised against deterministic fakes.
//!
//! ## Features
//!
//! - **Async-First Design**: Full async/await support with tokio integration
//! - **Provider Traits**: [`EmbeddingProvider`] and [`CompletionProvider`] decouple callers from any vendor
//! - **Bounded Retries**: Exponential backoff on throttling, server errors and timeouts
//! - **Order Preserving**: Embedding responses are re-sorted by input index before they are returned
//! - **Configurable**: Builder-based configuration with sensible defaults
//!
//! ## Quick Start
//!
//! ```no_run
//! use echohealth_embed::{EmbedConfig, EmbeddingProvider, OpenAiEmbeddingProvider};
//!
//! # async fn example() -> echohealth_embed::Result<()> {
//! // Reads OPENAI_API_KEY from the environment
//! let provider = OpenAiEmbeddingProvider::new(EmbedConfig::default())?;
//!
//! let texts = vec!["What causes asthma?".to_string(), "Flu symptoms".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: Configuration types for the embedding and completion endpoints
//! - [`provider`]: Embedding provider trait and the OpenAI-compatible implementation
//! - [`completion`]: Completion provider trait and the OpenAI-compatible implementation
//! - [`error`]: Error types and result handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! [`EmbedError::is_retryable`] tells callers whether a failed call is worth
//! repeating; the adapters already retry transient failures a bounded number of
//! times before giving up.

mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use completion::{CompletionProvider, OpenAiCompletionProvider};
pub use config::{CompletionConfig, EmbedConfig};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, OpenAiEmbeddingProvider};
