//! Sliding-window text chunking for the retrieval index.
//!
//! Raw document text is cut into fixed-size windows that overlap by a fixed
//! number of characters, so that a passage sitting on a window boundary is still
//! seen whole by at least one window. Each window becomes one row of the vector
//! index downstream.
//!
//! The module defines two main structs:
//! - [`WindowChunker`]: holds the window size and overlap and produces chunks.
//! - [`TextChunk`]: a single window of text, along with where it came from.
//!
//! # Window arithmetic
//!
//! For a text of `L` characters, window size `S` and overlap `O` (`O < S`), windows
//! start at `0, S - O, 2(S - O), ...` and each covers up to `S` characters. Emission
//! stops at the first window that reaches the end of the text, so:
//!
//! *   `L = 0` produces no windows.
//! *   `0 < L <= S` produces exactly one window holding the whole text.
//! *   `L > O` produces `ceil((L - O) / (S - O))` windows.
//!
//! Lengths are counted in characters (Unicode scalar values), so a window never
//! cuts a multi-byte character in half.
//!
//! # Usage
//!
//! ```
//! use echohealth_context::text::WindowChunker;
//!
//! let chunker = WindowChunker::new(10, 4).unwrap();
//! let chunks = chunker.get_chunks("notes.txt", "abcdefghijklmnopqrstuvwxyz");
//!
//! assert_eq!(chunks.len(), 4);
//! assert_eq!(chunks[0].chunk_text, "abcdefghij");
//! assert_eq!(chunks[1].chunk_text, "ghijklmnop");
//! assert_eq!(chunks[3].chunk_text, "stuvwxyz");
//! assert_eq!(chunks[3].char_start, 18);
//! ```
use serde::Serialize;
use std::iter;

/// Window size used by the ingestion job when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 1200;

/// Overlap between consecutive windows used by the ingestion job by default.
pub const DEFAULT_OVERLAP: usize = 200;

/// Errors raised when a chunker is configured with an unusable window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkerError {
    /// The window cannot advance: size is zero or the overlap swallows it.
    #[error("invalid window: chunk size {chunk_size} with overlap {overlap} (overlap must be smaller than a non-zero chunk size)")]
    InvalidWindow { chunk_size: usize, overlap: usize },
}

/// Splits text into overlapping fixed-size character windows.
///
/// A `WindowChunker` is cheap to copy and holds no state between calls, so a
/// single instance can chunk any number of documents, from any number of threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowChunker {
    chunk_size: usize,
    overlap: usize,
}

/// A single window of text cut from a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Identifier of the originating file (usually its basename).
    pub source_file: String,
    /// Position of this window within the document (0-indexed).
    pub sequence: usize,
    /// Character offset of the first character of this window.
    pub char_start: usize,
    /// The window's text.
    pub chunk_text: String,
}

impl Default for WindowChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl WindowChunker {
    /// Creates a chunker with the given window size and overlap, both in characters.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkerError::InvalidWindow`] when `chunk_size` is zero or when
    /// `overlap >= chunk_size`, since such a window would never advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(ChunkerError::InvalidWindow {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in characters between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Number of windows [`get_chunks`](Self::get_chunks) yields for a text of
    /// `char_len` characters.
    pub fn window_count(&self, char_len: usize) -> usize {
        if char_len == 0 {
            return 0;
        }
        if char_len <= self.chunk_size {
            return 1;
        }
        (char_len - self.overlap).div_ceil(self.step())
    }

    /// Cuts `text` into overlapping windows tagged with `source_file`.
    ///
    /// Empty input yields an empty vector. Chunks are returned in document order.
    ///
    /// ```
    /// use echohealth_context::text::WindowChunker;
    ///
    /// let chunker = WindowChunker::new(1200, 200).unwrap();
    /// let text = "x".repeat(1500);
    /// let chunks = chunker.get_chunks("S1", &text);
    ///
    /// assert_eq!(chunks.len(), 2);
    /// assert_eq!(chunks[0].chunk_text.len(), 1200);
    /// assert_eq!(chunks[1].char_start, 1000);
    /// assert_eq!(chunks[1].chunk_text.len(), 500);
    /// ```
    pub fn get_chunks(&self, source_file: &str, text: &str) -> Vec<TextChunk> {
        // Byte offset of every character boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(self.window_count(char_len));
        let mut start = 0;
        while start < char_len {
            let end = (start + self.chunk_size).min(char_len);
            chunks.push(TextChunk {
                source_file: source_file.to_string(),
                sequence: chunks.len(),
                char_start: start,
                chunk_text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == char_len {
                break;
            }
            start += self.step();
        }
        chunks
    }
}
