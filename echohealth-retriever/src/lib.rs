//! echohealth-retriever: grounded retrieval over a health-information corpus
//!
//! This crate indexes a directory of health documents into a flat cosine-similarity
//! index and answers questions by retrieving the most relevant passages and
//! wrapping them in a prompt that obliges a chat model to answer only from them,
//! citing each one, or refuse.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Ingestion, search, source catalog and grounded prompt composition
//! - **[`storage`]**: Flat vector index, chunk metadata and the on-disk snapshot
//! - **[`config`]**: TOML configuration for the whole pipeline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use echohealth_embed::OpenAiEmbeddingProvider;
//! use echohealth_retriever::config::RetrieverConfig;
//! use echohealth_retriever::retrieval::{
//!     GroundingCompositor, IngestionEngine, PromptTemplate, RetrievalEngine, SearchOptions,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RetrieverConfig::load(None)?;
//! let embedder = Arc::new(OpenAiEmbeddingProvider::new(config.embed_config())?);
//!
//! // Rebuild the snapshot from the corpus
//! IngestionEngine::new(config.clone(), embedder.clone()).run().await?;
//!
//! // Answer a question
//! let engine = RetrievalEngine::open(&config.index_dir, embedder, SearchOptions::from(&config))?;
//! let compositor = GroundingCompositor::new(Arc::new(engine), PromptTemplate::from(&config));
//! let outcome = compositor.compose("what triggers asthma attacks", None, None).await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Corpus → Extract → Chunk → Embed → Snapshot (vectors.bin + metadata.json)
//!                                         ↓
//! Query  → Embed → FlatIndex search → threshold → Passages → Grounded prompt
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{Result, RetrieverError};
