pub mod text;

// Re-export the chunker for external use
pub use text::{ChunkerError, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, TextChunk, WindowChunker};
