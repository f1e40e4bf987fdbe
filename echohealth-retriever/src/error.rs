//! Error types for the retrieval core

use echohealth_context::ChunkerError;
use echohealth_embed::EmbedError;
use std::path::PathBuf;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Errors raised while building, loading or querying an index snapshot.
///
/// Two families matter to callers. Snapshot problems (`IndexNotLoaded`,
/// `SnapshotMismatch`, `DimensionMismatch`) are fatal: nothing can be served
/// until the index is rebuilt or the configuration fixed. Provider failures are
/// transient and are surfaced as errors rather than as empty results, so an
/// empty search always means "nothing relevant", never "the embedding call failed".
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// The snapshot files are absent
    #[error("Index not loaded: no snapshot at {path}")]
    IndexNotLoaded { path: PathBuf },

    /// The snapshot holds zero vectors
    #[error("Index is empty")]
    EmptyIndex,

    /// A vector's length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding or completion provider failed
    #[error("Provider error: {0}")]
    Provider(#[from] EmbedError),

    /// The vector index and metadata store do not belong together
    #[error("Snapshot mismatch: {message}")]
    SnapshotMismatch { message: String },

    /// Ingestion produced no chunks
    #[error("No documents to index under {path}")]
    NoDocuments { path: PathBuf },

    /// Invalid chunk window
    #[error(transparent)]
    Chunker(#[from] ChunkerError),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO errors while reading the corpus or the snapshot
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Malformed metadata or manifest JSON
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Malformed configuration file
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

impl RetrieverError {
    /// Create a snapshot mismatch error with a custom message.
    pub fn snapshot_mismatch<S: Into<String>>(message: S) -> Self {
        Self::SnapshotMismatch {
            message: message.into(),
        }
    }

    /// Create a configuration error with a custom message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether repeating the failed operation may succeed.
    ///
    /// Only transient provider failures qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_provider_errors_are_retryable() {
        let throttled: RetrieverError = EmbedError::Status {
            status: 429,
            body: String::new(),
        }
        .into();
        assert!(throttled.is_retryable());

        let bad_key: RetrieverError = EmbedError::MissingApiKey {
            env_var: "OPENAI_API_KEY",
        }
        .into();
        assert!(!bad_key.is_retryable());

        assert!(!RetrieverError::EmptyIndex.is_retryable());
        assert!(
            !RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_messages_carry_context() {
        let err = RetrieverError::IndexNotLoaded {
            path: PathBuf::from("rag"),
        };
        assert_eq!(err.to_string(), "Index not loaded: no snapshot at rag");
        let err = RetrieverError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 1536, got 768");
    }
}
