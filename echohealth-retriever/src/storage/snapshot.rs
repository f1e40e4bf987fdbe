//! Persisted, immutable (vector index, metadata) pairs.
//!
//! A snapshot directory holds three files:
//!
//! - `vectors.bin`: a fixed header followed by the row-major `f32` matrix
//! - `metadata.json`: the chunk records, in row order
//! - `manifest.json`: shape, provenance and blake3 digests of the other two
//!
//! Snapshots are written into a staging directory next to the target and
//! renamed into place, so readers only ever see a complete snapshot or the
//! previous one. Loading re-checks every digest and row count; any
//! disagreement is reported as [`RetrieverError::SnapshotMismatch`].

use super::{DocumentChunk, FlatIndex, MetadataStore};
use crate::error::{Result, RetrieverError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const FORMAT_VERSION: u32 = 1;
const MAGIC: &[u8; 4] = b"EHVX";
// magic + version + rows + dimension
const HEADER_LEN: usize = 4 + 4 + 8 + 8;

/// Description of a persisted snapshot, stored as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub rows: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
    pub byte_order: String,
    pub vectors_blake3: String,
    pub metadata_blake3: String,
}

impl SnapshotManifest {
    /// Reads the manifest of the snapshot in `dir`.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(RetrieverError::IndexNotLoaded {
                path: dir.to_path_buf(),
            });
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }
}

/// An immutable, row-aligned vector index and metadata store.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    index: FlatIndex,
    metadata: MetadataStore,
    embedding_model: String,
    built_at: DateTime<Utc>,
}

fn host_byte_order() -> &'static str {
    if cfg!(target_endian = "little") {
        "little"
    } else {
        "big"
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

impl IndexSnapshot {
    /// Pairs an index with its metadata, rejecting pairs of different lengths.
    pub fn new(
        index: FlatIndex,
        metadata: MetadataStore,
        embedding_model: impl Into<String>,
    ) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(RetrieverError::snapshot_mismatch(format!(
                "vector index has {} rows but metadata has {} records",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self {
            index,
            metadata,
            embedding_model: embedding_model.into(),
            built_at: Utc::now(),
        })
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    fn encode_vectors(&self) -> Vec<u8> {
        let matrix: &[u8] = bytemuck::cast_slice(self.index.as_slice());
        let mut bytes = Vec::with_capacity(HEADER_LEN + matrix.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.dimension() as u64).to_le_bytes());
        bytes.extend_from_slice(matrix);
        bytes
    }

    /// Writes the snapshot to `dir`, replacing any snapshot already there.
    ///
    /// Refuses to replace a non-empty directory that does not hold a snapshot.
    pub fn save(&self, dir: &Path) -> Result<SnapshotManifest> {
        let parent = match dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        if dir.exists() && !dir.join(MANIFEST_FILE).is_file() && fs::read_dir(dir)?.next().is_some()
        {
            return Err(RetrieverError::config(format!(
                "refusing to replace {}: not an index snapshot",
                dir.display()
            )));
        }

        let vectors = self.encode_vectors();
        let metadata = serde_json::to_vec(self.metadata.as_slice())?;
        let manifest = SnapshotManifest {
            format_version: FORMAT_VERSION,
            rows: self.len(),
            dimension: self.dimension(),
            embedding_model: self.embedding_model.clone(),
            built_at: self.built_at,
            byte_order: host_byte_order().to_string(),
            vectors_blake3: digest(&vectors),
            metadata_blake3: digest(&metadata),
        };

        let staging = tempfile::Builder::new()
            .prefix(".echohealth-snapshot-")
            .tempdir_in(&parent)?;
        write_synced(&staging.path().join(VECTORS_FILE), &vectors)?;
        write_synced(&staging.path().join(METADATA_FILE), &metadata)?;
        write_synced(
            &staging.path().join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;

        swap_into_place(staging.path(), dir)?;
        tracing::info!(
            "Saved snapshot with {} rows of dimension {} to {}",
            manifest.rows,
            manifest.dimension,
            dir.display()
        );
        Ok(manifest)
    }

    /// Loads and verifies the snapshot in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let missing = [VECTORS_FILE, METADATA_FILE, MANIFEST_FILE]
            .iter()
            .any(|name| !dir.join(name).is_file());
        if missing {
            return Err(RetrieverError::IndexNotLoaded {
                path: dir.to_path_buf(),
            });
        }

        let manifest = SnapshotManifest::read(dir)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RetrieverError::snapshot_mismatch(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if manifest.byte_order != host_byte_order() {
            return Err(RetrieverError::snapshot_mismatch(format!(
                "snapshot written on a {}-endian host",
                manifest.byte_order
            )));
        }

        let vectors = fs::read(dir.join(VECTORS_FILE))?;
        if digest(&vectors) != manifest.vectors_blake3 {
            return Err(RetrieverError::snapshot_mismatch(
                "vectors.bin does not match the manifest digest",
            ));
        }
        let metadata_bytes = fs::read(dir.join(METADATA_FILE))?;
        if digest(&metadata_bytes) != manifest.metadata_blake3 {
            return Err(RetrieverError::snapshot_mismatch(
                "metadata.json does not match the manifest digest",
            ));
        }

        let index = decode_vectors(&vectors, &manifest)?;
        let chunks: Vec<DocumentChunk> = serde_json::from_slice(&metadata_bytes)?;
        let snapshot = Self {
            index,
            metadata: MetadataStore::new(chunks),
            embedding_model: manifest.embedding_model,
            built_at: manifest.built_at,
        };
        if snapshot.metadata.len() != snapshot.index.len() {
            return Err(RetrieverError::snapshot_mismatch(format!(
                "vector index has {} rows but metadata has {} records",
                snapshot.index.len(),
                snapshot.metadata.len()
            )));
        }
        tracing::info!(
            "Loaded snapshot from {}: {} rows, dimension {}, model {}",
            dir.display(),
            snapshot.len(),
            snapshot.dimension(),
            snapshot.embedding_model
        );
        Ok(snapshot)
    }
}

fn decode_vectors(bytes: &[u8], manifest: &SnapshotManifest) -> Result<FlatIndex> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(RetrieverError::snapshot_mismatch(
            "vectors.bin has no valid header",
        ));
    }
    let read_u64 = |at: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[at..at + 8]);
        u64::from_le_bytes(buf) as usize
    };
    let rows = read_u64(8);
    let dimension = read_u64(16);
    if rows != manifest.rows || dimension != manifest.dimension {
        return Err(RetrieverError::snapshot_mismatch(format!(
            "vectors.bin holds {rows}x{dimension}, manifest says {}x{}",
            manifest.rows, manifest.dimension
        )));
    }
    let body = &bytes[HEADER_LEN..];
    let expected = rows
        .checked_mul(dimension)
        .and_then(|values| values.checked_mul(std::mem::size_of::<f32>()))
        .ok_or_else(|| {
            RetrieverError::snapshot_mismatch(format!(
                "vectors.bin shape {rows}x{dimension} is too large"
            ))
        })?;
    if body.len() != expected {
        return Err(RetrieverError::snapshot_mismatch(format!(
            "vectors.bin body is {} bytes, expected {expected}",
            body.len()
        )));
    }
    let data: Vec<f32> = bytemuck::pod_collect_to_vec(body);
    FlatIndex::from_raw(dimension, data)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Replaces `target` with the fully written `staged` directory.
fn swap_into_place(staged: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        fs::rename(staged, target)?;
        return Ok(());
    }

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let retired = target.with_file_name(format!(".{name}.retired-{}", std::process::id()));
    if retired.exists() {
        fs::remove_dir_all(&retired)?;
    }
    fs::rename(target, &retired)?;
    if let Err(err) = fs::rename(staged, target) {
        // put the previous snapshot back
        fs::rename(&retired, target)?;
        return Err(err.into());
    }
    if let Err(err) = fs::remove_dir_all(&retired) {
        tracing::warn!(
            "Could not remove retired snapshot {}: {}",
            retired.display(),
            err
        );
    }
    Ok(())
}
