//! Raw-text extraction for corpus files.
//!
//! Extraction sits in front of the chunker: each supported file is reduced to
//! plain text. HTML has markup and scripts removed, PDF text is pulled from
//! every page, Markdown and plain text are taken as they are. A PDF that cannot
//! be parsed is logged and skipped; supply a [`TextExtractor`] of your own to
//! handle such files differently.

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Node};
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Elements whose text never reaches the index.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"));

/// Kinds of files the ingestion job understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Html,
    Pdf,
    Markdown,
    Text,
}

impl SourceKind {
    /// Classifies a file by extension, case-insensitively.
    ///
    /// Only `.html`, `.pdf`, `.md` and `.txt` are recognised. `.htm` is left out
    /// on purpose: every HTML file takes the next `S#` id, so widening the set
    /// would renumber the citations of an existing corpus.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "html" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            "md" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Turns a corpus file into raw text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the file's text, or `None` when this extractor cannot read the kind.
    async fn extract(&self, path: &Path, kind: SourceKind) -> Result<Option<String>>;
}

/// Extractor for HTML, PDF, Markdown and plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

#[async_trait]
impl TextExtractor for DefaultExtractor {
    async fn extract(&self, path: &Path, kind: SourceKind) -> Result<Option<String>> {
        match kind {
            SourceKind::Pdf => {
                let bytes = tokio::fs::read(path).await?;
                Ok(pdf_to_text(path, bytes).await)
            }
            SourceKind::Html => {
                let bytes = tokio::fs::read(path).await?;
                Ok(Some(html_to_text(&String::from_utf8_lossy(&bytes))))
            }
            SourceKind::Markdown | SourceKind::Text => {
                let bytes = tokio::fs::read(path).await?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
        }
    }
}

/// Text of every page of a PDF, or `None` when the document cannot be parsed.
async fn pdf_to_text(path: &Path, bytes: Vec<u8>) -> Option<String> {
    // pdf-extract is synchronous and can panic on malformed input
    let parsed = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
    })
    .await;
    match parsed {
        Ok(Ok(text)) => Some(text),
        Ok(Err(err)) => {
            warn!("Could not extract text from {}: {}", path.display(), err);
            None
        }
        Err(err) => {
            warn!("PDF extraction of {} aborted: {}", path.display(), err);
            None
        }
    }
}

/// Visible text of an HTML document, one text node per line.
///
/// Text inside `script`, `style` and `noscript` is dropped, trailing whitespace
/// is trimmed from every line and runs of blank lines shrink to one.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let pieces: Vec<&str> = document
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, &**text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                matches!(ancestor.value(), Node::Element(element) if SKIPPED_ELEMENTS.contains(&element.name()))
            })
        })
        .map(|(_, text)| text)
        .collect();

    let joined = pieces.join("\n");
    let trimmed_lines: Vec<&str> = joined.lines().map(str::trim_end).collect();
    let rejoined = trimmed_lines.join("\n");
    let collapsed = BLANK_LINE_RUNS.replace_all(&rejoined, "\n\n");
    collapsed.trim().to_string()
}
