//! Query-time retrieval over a loaded snapshot.
//!
//! A [`RetrievalEngine`] is built once from an immutable [`IndexSnapshot`] and
//! an [`EmbeddingProvider`], and can then be shared by any number of concurrent
//! queries. Construction is where preconditions are enforced: a missing
//! snapshot or a provider whose dimension disagrees with the index is rejected
//! before a single query is served.
//!
//! A search embeds the query, scans the index, and keeps hits scoring at or
//! above the relevance threshold. An empty result means nothing relevant was
//! found; provider failures are always returned as errors.

use super::catalog::{Catalog, citation_or_unknown};
use crate::config::{DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_K, RetrieverConfig};
use crate::error::{Result, RetrieverError};
use crate::storage::IndexSnapshot;
use echohealth_embed::EmbeddingProvider;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Separator between rendered passages.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Search tuning shared by every query an engine serves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Candidates requested when a caller does not pass `k`
    pub top_k: usize,
    /// Hits scoring below this are discarded
    pub relevance_threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }
}

impl SearchOptions {
    /// The requested `k`, or `top_k` when it is missing or zero.
    pub fn resolve_k(&self, k: Option<usize>) -> usize {
        k.filter(|k| *k > 0).unwrap_or(self.top_k)
    }
}

impl From<&RetrieverConfig> for SearchOptions {
    fn from(config: &RetrieverConfig) -> Self {
        Self {
            top_k: config.top_k,
            relevance_threshold: config.relevance_threshold,
        }
    }
}

/// A chunk that passed the relevance threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    /// Row of the chunk in the snapshot
    pub row: usize,
    pub citation_id: String,
    pub source_file: String,
    /// Cosine similarity to the query
    pub score: f32,
    pub text: String,
}

impl Passage {
    /// `[<citationId>] score=<score>\n<text>`, score rounded to two decimals.
    pub fn render(&self) -> String {
        format!("[{}] score={:.2}\n{}", self.citation_id, self.score, self.text)
    }
}

/// Renders passages in order, separated by [`BLOCK_SEPARATOR`]. Empty input
/// renders as an empty string.
pub fn render_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(Passage::render)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Embeds queries and searches one immutable snapshot.
pub struct RetrievalEngine {
    snapshot: Arc<IndexSnapshot>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: SearchOptions,
    catalog: OnceLock<Catalog>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("rows", &self.snapshot.len())
            .field("dimension", &self.snapshot.dimension())
            .field("embedder", &self.embedder.provider_name())
            .field("options", &self.options)
            .finish()
    }
}

impl RetrievalEngine {
    /// Creates an engine over an already loaded snapshot.
    ///
    /// Fails with [`RetrieverError::DimensionMismatch`] when the provider
    /// reports a dimension different from the snapshot's.
    pub fn new(
        snapshot: Arc<IndexSnapshot>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: SearchOptions,
    ) -> Result<Self> {
        if let Some(dimension) = embedder.embedding_dimension() {
            if dimension != snapshot.dimension() {
                return Err(RetrieverError::DimensionMismatch {
                    expected: snapshot.dimension(),
                    actual: dimension,
                });
            }
        }
        if embedder.model_name() != snapshot.embedding_model() {
            warn!(
                "Snapshot was built with model '{}' but queries use '{}'",
                snapshot.embedding_model(),
                embedder.model_name()
            );
        }
        if snapshot.is_empty() {
            warn!("Snapshot holds no vectors; every search will come back empty");
        }
        Ok(Self {
            snapshot,
            embedder,
            options,
            catalog: OnceLock::new(),
        })
    }

    /// Loads the snapshot in `index_dir` and creates an engine over it.
    ///
    /// A missing snapshot fails with [`RetrieverError::IndexNotLoaded`].
    pub fn open(
        index_dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        options: SearchOptions,
    ) -> Result<Self> {
        let snapshot = IndexSnapshot::load(index_dir)?;
        Self::new(Arc::new(snapshot), embedder, options)
    }

    pub fn snapshot(&self) -> &Arc<IndexSnapshot> {
        &self.snapshot
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    /// Up to `k` passages scoring at or above the threshold, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        info!(
            "Searching: k={}, threshold={}, rows={}",
            k,
            self.options.relevance_threshold,
            self.snapshot.len()
        );
        debug!("Query: {}", query);
        if self.snapshot.is_empty() {
            warn!("Search against an empty index returns no passages");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_text(query).await?;
        if query_vector.len() != self.snapshot.dimension() {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.snapshot.dimension(),
                actual: query_vector.len(),
            });
        }

        let hits = self.snapshot.index().search(&query_vector, k)?;
        let candidates = hits.len();
        let passages = hits
            .into_iter()
            .filter(|hit| hit.score >= self.options.relevance_threshold)
            .map(|hit| {
                let chunk = self.snapshot.metadata().get(hit.row).ok_or_else(|| {
                    RetrieverError::snapshot_mismatch(format!("no metadata for row {}", hit.row))
                })?;
                Ok(Passage {
                    row: hit.row,
                    citation_id: citation_or_unknown(&chunk.citation_id).to_string(),
                    source_file: chunk.source_file.clone(),
                    score: hit.score,
                    text: chunk.text.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Search kept {} of {} candidates", passages.len(), candidates);
        Ok(passages)
    }

    /// Search with the engine's default `top_k`.
    pub async fn search_default(&self, query: &str) -> Result<Vec<Passage>> {
        self.search(query, self.options.top_k).await
    }

    /// Search and render the surviving passages as citation blocks.
    pub async fn search_rendered(&self, query: &str, k: usize) -> Result<String> {
        Ok(render_passages(&self.search(query, k).await?))
    }

    /// The file to citation-id catalog, built on first use.
    pub fn catalog(&self) -> &Catalog {
        self.catalog.get_or_init(|| Catalog::build(self.snapshot.metadata()))
    }

    /// The rendered catalog listing.
    pub fn catalog_listing(&self) -> String {
        self.catalog().render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::{FailingEmbedder, FixedEmbedder, snapshot_of};
    use crate::storage::DocumentChunk;

    fn engine_with(vectors: Vec<Vec<f32>>, query: Vec<f32>, threshold: f32) -> RetrievalEngine {
        let chunks = (0..vectors.len())
            .map(|i| {
                DocumentChunk::new(
                    format!("doc{i}.html"),
                    format!("S{}", i + 1),
                    format!("text {i}"),
                )
            })
            .collect();
        let dimension = vectors.first().map_or(query.len(), Vec::len);
        RetrievalEngine::new(
            Arc::new(snapshot_of(dimension, vectors, chunks)),
            Arc::new(FixedEmbedder::new(query)),
            SearchOptions {
                top_k: 5,
                relevance_threshold: threshold,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_results_sorted_and_filtered() {
        let engine = engine_with(
            vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0], vec![-1.0, 0.0]],
            vec![1.0, 0.0],
            0.28,
        );
        let passages = engine.search("what is it", 10).await.unwrap();

        let rows: Vec<usize> = passages.iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![0, 1]);
        assert_eq!(passages[0].citation_id, "S1");
        assert!((passages[1].score - 0.6).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_inclusive() {
        let vectors = vec![vec![0.6, 0.8], vec![0.0, 1.0]];
        let probe = engine_with(vectors.clone(), vec![1.0, 0.0], -1.0);
        let score = probe.search("probe query", 1).await.unwrap()[0].score;

        let at = engine_with(vectors.clone(), vec![1.0, 0.0], score);
        let kept = at.search("probe query", 5).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].row, 0);

        let above = engine_with(vectors, vec![1.0, 0.0], f32::from_bits(score.to_bits() + 1));
        assert!(above.search("probe query", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_render_blocks() {
        let engine = engine_with(vec![vec![1.0, 0.0], vec![0.8, 0.6]], vec![1.0, 0.0], 0.28);
        let rendered = engine.search_rendered("two words", 5).await.unwrap();
        assert_eq!(rendered, "[S1] score=1.00\ntext 0\n\n---\n\n[S2] score=0.80\ntext 1");
    }

    #[tokio::test]
    async fn test_nothing_relevant_is_empty_not_error() {
        let engine = engine_with(vec![vec![0.0, 1.0]], vec![1.0, 0.0], 0.28);
        assert!(engine.search("unrelated thing", 5).await.unwrap().is_empty());
        assert_eq!(engine.search_rendered("unrelated thing", 5).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_passages() {
        let engine = engine_with(Vec::new(), vec![1.0, 0.0], 0.28);
        assert!(engine.search("anything here", 5).await.unwrap().is_empty());
        assert!(engine.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let engine = RetrievalEngine::new(
            Arc::new(snapshot_of(
                2,
                vec![vec![1.0, 0.0]],
                vec![DocumentChunk::new("a.html", "S1", "alpha")],
            )),
            Arc::new(FailingEmbedder),
            SearchOptions::default(),
        )
        .unwrap();
        let err = engine.search("is this ok", 5).await.unwrap_err();
        assert!(matches!(err, RetrieverError::Provider(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_query_dimension_is_checked() {
        let engine = engine_with(vec![vec![1.0, 0.0]], vec![1.0, 0.0, 0.0], 0.0);
        assert!(matches!(
            engine.search("three dims", 5).await,
            Err(RetrieverError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_provider_dimension_checked_at_construction() {
        let result = RetrievalEngine::new(
            Arc::new(snapshot_of(
                2,
                vec![vec![1.0, 0.0]],
                vec![DocumentChunk::new("a.html", "S1", "alpha")],
            )),
            Arc::new(FixedEmbedder::new(vec![1.0, 0.0, 0.0]).with_declared_dimension()),
            SearchOptions::default(),
        );
        assert!(matches!(
            result,
            Err(RetrieverError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_open_without_snapshot_fails() {
        let temp = tempfile::tempdir().unwrap();
        let result = RetrievalEngine::open(
            &temp.path().join("rag"),
            Arc::new(FixedEmbedder::new(vec![1.0])),
            SearchOptions::default(),
        );
        assert!(matches!(result, Err(RetrieverError::IndexNotLoaded { .. })));
    }

    #[test]
    fn test_catalog_listing() {
        let engine = engine_with(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![1.0, 0.0], 0.28);
        assert_eq!(engine.catalog_listing(), "S1: doc0.html\nS2: doc1.html");
    }

    #[test]
    fn test_zero_or_missing_k_uses_top_k() {
        let options = SearchOptions {
            top_k: 5,
            relevance_threshold: 0.28,
        };
        assert_eq!(options.resolve_k(None), 5);
        assert_eq!(options.resolve_k(Some(0)), 5);
        assert_eq!(options.resolve_k(Some(2)), 2);
    }
}
