//! Full-corpus ingestion.
//!
//! One run walks the corpus, extracts and chunks every supported file, embeds
//! the chunks and replaces the snapshot on disk. There is no incremental mode:
//! every run rebuilds from scratch.
//!
//! Row order is fixed before any embedding call is made. Non-HTML sources come
//! first in path order, then HTML sources in path order; HTML sources are
//! labelled `S1..Sn` in that order and every other source is labelled with its
//! basename. Embedding batches run concurrently but are reassembled in their
//! original order, since row position is the only link between a vector and
//! its chunk.

use super::extract::{DefaultExtractor, SourceKind, TextExtractor};
use crate::config::RetrieverConfig;
use crate::error::{Result, RetrieverError};
use crate::storage::{DocumentChunk, FlatIndex, IndexSnapshot, MetadataStore, SnapshotManifest};
use echohealth_embed::EmbeddingProvider;
use futures::{StreamExt, TryStreamExt, stream};
use ignore::WalkBuilder;
use itertools::Itertools;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A corpus file with its position-derived labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// Basename recorded on every chunk of this file
    pub source_file: String,
    pub citation_id: String,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Distinct source files that produced at least one chunk
    pub files_indexed: usize,
    pub chunks: usize,
    pub dimension: usize,
    /// Supported files that yielded no text
    pub skipped: Vec<PathBuf>,
    pub index_dir: PathBuf,
    pub manifest: Option<SnapshotManifest>,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        format!(
            "Indexed {} chunks from {} files into {}",
            self.chunks,
            self.files_indexed,
            self.index_dir.display()
        )
    }
}

/// Lists the supported files under `corpus_dir` in row order, with labels assigned.
pub fn discover_sources(corpus_dir: &Path) -> Result<Vec<SourceDocument>> {
    if !corpus_dir.is_dir() {
        return Err(RetrieverError::config(format!(
            "corpus directory {} does not exist",
            corpus_dir.display()
        )));
    }

    let mut files: Vec<(PathBuf, SourceKind)> = Vec::new();
    for entry in WalkBuilder::new(corpus_dir)
        .standard_filters(false)
        .hidden(true)
        .build()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable corpus entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        match SourceKind::from_path(entry.path()) {
            Some(kind) => files.push((entry.into_path(), kind)),
            None => debug!("Ignoring unsupported file {}", entry.path().display()),
        }
    }

    let (html, other): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|(_, kind)| *kind == SourceKind::Html);

    let other = other
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(path, kind)| {
            let source_file = basename(&path);
            SourceDocument {
                citation_id: source_file.clone(),
                source_file,
                path,
                kind,
            }
        });
    let html = html
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .enumerate()
        .map(|(i, (path, kind))| SourceDocument {
            source_file: basename(&path),
            citation_id: format!("S{}", i + 1),
            path,
            kind,
        });
    Ok(other.chain(html).collect())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Rebuilds the index snapshot from the corpus.
pub struct IngestionEngine {
    config: RetrieverConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
}

impl IngestionEngine {
    /// Create an ingestion engine using the default extractor.
    pub fn new(config: RetrieverConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            embedder,
            extractor: Arc::new(DefaultExtractor),
        }
    }

    /// Use a different text extractor, e.g. one that understands PDF (builder style)
    pub fn with_extractor(self, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor, ..self }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Builds a snapshot of the corpus without writing it.
    pub async fn build_snapshot(&self) -> Result<(IndexSnapshot, IngestReport)> {
        self.config.validate()?;
        let chunker = self.config.chunker()?;
        let corpus_dir = &self.config.corpus_dir;
        let sources = discover_sources(corpus_dir)?;
        info!(
            "Ingesting {} source files from {}",
            sources.len(),
            corpus_dir.display()
        );

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for source in &sources {
            let Some(text) = self.extractor.extract(&source.path, source.kind).await? else {
                skipped.push(source.path.clone());
                continue;
            };
            let windows = chunker.get_chunks(&source.source_file, &text);
            if windows.is_empty() {
                debug!("No text in {}", source.path.display());
                skipped.push(source.path.clone());
                continue;
            }
            debug!(
                "{} -> {} chunks as {}",
                source.path.display(),
                windows.len(),
                source.citation_id
            );
            records.extend(windows.into_iter().map(|window| {
                DocumentChunk::new(
                    source.source_file.clone(),
                    source.citation_id.clone(),
                    window.chunk_text,
                )
            }));
        }

        if records.is_empty() {
            return Err(RetrieverError::NoDocuments {
                path: corpus_dir.clone(),
            });
        }

        let vectors = self.embed_in_order(&records).await?;
        // The first vector fixes the dimension; build rejects any that disagree.
        let dimension = vectors.first().map_or(0, Vec::len);

        let files_indexed = records.iter().map(|r| r.source_file.as_str()).unique().count();
        let chunks = records.len();
        let index = FlatIndex::build(dimension, vectors)?;
        let snapshot = IndexSnapshot::new(
            index,
            MetadataStore::new(records),
            self.embedder.model_name(),
        )?;
        let report = IngestReport {
            files_indexed,
            chunks,
            dimension,
            skipped,
            index_dir: self.config.index_dir.clone(),
            manifest: None,
        };
        Ok((snapshot, report))
    }

    /// Builds the snapshot and atomically replaces the one in `index_dir`.
    pub async fn run(&self) -> Result<IngestReport> {
        let (snapshot, mut report) = self.build_snapshot().await?;
        report.manifest = Some(snapshot.save(&self.config.index_dir)?);
        info!("{}", report.summary());
        Ok(report)
    }

    /// Embeds every record's text, returning vectors in record order.
    async fn embed_in_order(&self, records: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embedding.batch_size;
        let batches: Vec<Vec<String>> = records
            .chunks(batch_size)
            .map(|batch| batch.iter().map(|r| r.text.clone()).collect())
            .collect();
        info!(
            "Embedding {} chunks in {} batches ({} concurrent)",
            records.len(),
            batches.len(),
            self.config.embed_concurrency
        );

        let embedded: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|batch| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    let result = embedder.embed_texts(&batch).await?;
                    if result.len() != batch.len() {
                        return Err(RetrieverError::snapshot_mismatch(format!(
                            "provider returned {} vectors for {} chunks",
                            result.len(),
                            batch.len()
                        )));
                    }
                    Ok::<_, RetrieverError>(result.embeddings)
                }
            })
            .buffered(self.config.embed_concurrency)
            .try_collect()
            .await?;
        Ok(embedded.into_iter().flatten().collect())
    }
}
