//! Deterministic embedding providers and fixtures for tests.

use crate::storage::{DocumentChunk, FlatIndex, IndexSnapshot, MetadataStore};
use async_trait::async_trait;
use echohealth_embed::{EmbedError, EmbeddingProvider, EmbeddingResult};

/// Returns the same vector for every input.
pub(crate) struct FixedEmbedder {
    vector: Vec<f32>,
    declare_dimension: bool,
}

impl FixedEmbedder {
    pub(crate) fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            declare_dimension: false,
        }
    }

    pub(crate) fn with_declared_dimension(self) -> Self {
        Self {
            declare_dimension: true,
            ..self
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> echohealth_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(vec![self.vector.clone(); texts.len()]))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.declare_dimension.then_some(self.vector.len())
    }

    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed-test"
    }
}

/// One axis per keyword; a text's vector counts keyword occurrences, plus a
/// constant "other" axis so texts without keywords are never zero vectors.
pub(crate) struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub(crate) fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }

    pub(crate) fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> echohealth_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| self.vector_for(t)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(self.keywords.len() + 1)
    }

    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Always fails with a retryable service error.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
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
        "failing"
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}

pub(crate) fn snapshot_of(
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<DocumentChunk>,
) -> IndexSnapshot {
    let index = FlatIndex::build(dimension, vectors).unwrap();
    IndexSnapshot::new(index, MetadataStore::new(chunks), "fixed-test").unwrap()
}

/// A one-page PDF showing `text` in Courier.
pub(crate) fn pdf_with_text(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
