pub mod catalog;
pub mod engine;
pub mod extract;
pub mod grounding;
pub mod ingest;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{Catalog, CatalogEntry};
pub use engine::{Passage, RetrievalEngine, SearchOptions, render_passages};
pub use extract::{DefaultExtractor, SourceKind, TextExtractor, html_to_text};
pub use grounding::{
    GroundedPrompt, GroundingCompositor, GroundingOutcome, PromptTemplate, Refusal, RefusalReason,
    SYSTEM_INSTRUCTIONS, WELCOME_MESSAGE,
};
pub use ingest::{IngestReport, IngestionEngine, SourceDocument, discover_sources};
