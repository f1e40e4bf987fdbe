//! Storage layer for the retrieval core
//!
//! An index is two row-aligned halves: a [`FlatIndex`] of normalized embedding
//! vectors and a [`MetadataStore`] of the chunk records they were computed from.
//! Row `i` of one always describes row `i` of the other; position is the only
//! cross-reference between them. [`IndexSnapshot`] keeps the pair together on
//! disk and in memory.
//!
//! ## Key Components
//!
//! - **FlatIndex**: exact inner-product search over normalized vectors
//! - **MetadataStore**: ordered chunk records, looked up by row
//! - **IndexSnapshot**: the immutable (index, metadata) pair with atomic persistence
//!
//! ## Architecture
//!
//! ```text
//! FlatIndex ─────┐
//!                ├─ IndexSnapshot ── vectors.bin + metadata.json + manifest.json
//! MetadataStore ─┘
//! ```

use serde::{Deserialize, Serialize};

pub mod snapshot;
pub mod vector_index;

pub use snapshot::{IndexSnapshot, SnapshotManifest};
pub use vector_index::{FlatIndex, SearchHit};

/// A single indexed unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Basename of the originating file
    pub source_file: String,
    /// External label used in citations, e.g. `S3` or the basename itself
    pub citation_id: String,
    /// The chunk's text
    pub text: String,
}

impl DocumentChunk {
    pub fn new(
        source_file: impl Into<String>,
        citation_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            citation_id: citation_id.into(),
            text: text.into(),
        }
    }
}

/// Chunk records in index row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    chunks: Vec<DocumentChunk>,
}

impl MetadataStore {
    pub fn new(chunks: Vec<DocumentChunk>) -> Self {
        Self { chunks }
    }

    /// The record stored at `row`, if any.
    pub fn get(&self, row: usize) -> Option<&DocumentChunk> {
        self.chunks.get(row)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentChunk> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn as_slice(&self) -> &[DocumentChunk] {
        &self.chunks
    }
}

impl FromIterator<DocumentChunk> for MetadataStore {
    fn from_iter<I: IntoIterator<Item = DocumentChunk>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MetadataStore {
    type Item = &'a DocumentChunk;
    type IntoIter = std::slice::Iter<'a, DocumentChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
