//! Engines over small in-memory snapshots.

use async_trait::async_trait;
use echohealth_embed::{EmbedError, EmbeddingProvider, EmbeddingResult};
use echohealth_retriever::retrieval::{RetrievalEngine, SearchOptions};
use echohealth_retriever::storage::{DocumentChunk, FlatIndex, IndexSnapshot, MetadataStore};
use std::sync::Arc;

const KEYWORDS: &[&str] = &["asthma", "flu", "diabetes"];

/// One axis per keyword plus a constant axis.
pub(crate) struct KeywordEmbedder;

impl KeywordEmbedder {
    pub(crate) fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .chain(std::iter::once(0.1))
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> echohealth_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| Self::vector_for(t)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(KEYWORDS.len() + 1)
    }

    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Fails every call the way an unreachable endpoint does.
pub(crate) struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    async fn embed_texts(&self, _texts: &[String]) -> echohealth_embed::Result<EmbeddingResult> {
        Err(EmbedError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    fn embedding_dimension(&self) -> Option<usize> {
        None
    }

    fn provider_name(&self) -> &str {
        "unavailable"
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

pub(crate) fn sample_snapshot() -> IndexSnapshot {
    let chunks = vec![
        DocumentChunk::new("asthma.html", "S1", "Asthma attacks are triggered by pollen."),
        DocumentChunk::new("flu.html", "S2", "Flu season peaks in winter."),
        DocumentChunk::new("diabetes.html", "S10", "Diabetes changes blood sugar levels."),
    ];
    let vectors = chunks
        .iter()
        .map(|c| KeywordEmbedder::vector_for(&c.text))
        .collect();
    let index = FlatIndex::build(KEYWORDS.len() + 1, vectors).unwrap();
    IndexSnapshot::new(index, MetadataStore::new(chunks), "keyword-test").unwrap()
}

fn engine_with(embedder: Arc<dyn EmbeddingProvider>) -> RetrievalEngine {
    RetrievalEngine::new(
        Arc::new(sample_snapshot()),
        embedder,
        SearchOptions::default(),
    )
    .unwrap()
}

pub(crate) fn sample_engine() -> RetrievalEngine {
    engine_with(Arc::new(KeywordEmbedder))
}

pub(crate) fn broken_engine() -> RetrievalEngine {
    engine_with(Arc::new(UnavailableEmbedder))
}
