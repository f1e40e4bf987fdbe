//! Grounded prompt composition.
//!
//! The compositor turns a user question into one of two outcomes: a refusal,
//! or a prompt that confines an answering model to retrieved passages. It never
//! calls an answering model itself.
//!
//! ```text
//! query ──▶ fewer than 2 words? ──yes──▶ Refusal(UnspecificQuery)
//!              │ no
//!              ▼
//!          search(k) ──no passages──▶ Refusal(NotFound)
//!              │ passages
//!              ▼
//!          Grounded(prompt with [S#] context)
//! ```

use super::engine::{Passage, RetrievalEngine};
use crate::config::{DEFAULT_MAX_SENTENCES, RetrieverConfig};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Marker that starts every refusal.
pub const REFUSAL_PREFIX: &str = "REFUSE:";

/// Separator between passages inside a grounded prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Greeting a conversational front end opens with.
pub const WELCOME_MESSAGE: &str = "Hi! I can share general health information based on the MEDLINE documents provided. What would you like to know?";

/// Standing instructions for an agent that answers from the corpus.
pub const SYSTEM_INSTRUCTIONS: &str = "\
You are a Health Information Assistant. Follow these rules strictly:

1) Source-bound answers:
- Only use facts found in the provided MEDLINE documents.
- If a fact is not in the documents, say you don’t have that information.

2) No medical advice:
- Provide general health information only.
- Do not diagnose, recommend treatments, or give personal medical advice.
- If asked for diagnosis or personal recommendations, say you cannot provide that information and recommend consulting a qualified healthcare professional.

3) Citations:
- Include short inline citations like [S1], [S2] that map to the documents used.
- When speaking, reference the source verbally, e.g., “According to [S1] …”.
- Every factual statement should be supported by at least one citation.

4) Plain language:
- Use clear, friendly language. Prefer short sentences. Avoid medical jargon where possible.

5) Uncertainty & deferral:
- If the information is not found in the documents or you are uncertain, clearly state that and offer to connect the user with a human healthcare specialist.

6) Safety:
- Do not provide personal or sensitive advice.
- Never make coverage commitments or medical decisions.

7) Model use:
- You may use internal reasoning to structure responses, but all factual content must come from the documents and be cited with [S#].";

/// Why a query was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    /// Empty, or fewer than two words
    UnspecificQuery,
    /// Nothing in the index passed the relevance threshold
    NotFound,
}

/// A refusal, carrying the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Refusal {
    pub reason: RefusalReason,
    pub message: String,
}

/// A prompt ready for an answering model, with the passages it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundedPrompt {
    pub query: String,
    pub prompt: String,
    pub passages: Vec<Passage>,
}

/// The two terminal outcomes of composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroundingOutcome {
    Refusal(Refusal),
    Grounded(GroundedPrompt),
}

impl GroundingOutcome {
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Refusal(_))
    }

    /// The refusal message or the grounded prompt.
    pub fn text(&self) -> &str {
        match self {
            Self::Refusal(refusal) => &refusal.message,
            Self::Grounded(grounded) => &grounded.prompt,
        }
    }
}

impl fmt::Display for GroundingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Wording of refusals and of the grounded prompt's rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Role the answering model is told it plays
    pub assistant_role: String,
    /// Name of the corpus, as in "the MEDLINE documents"
    pub corpus_name: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            assistant_role: "Health Information Assistant".to_string(),
            corpus_name: "MEDLINE".to_string(),
        }
    }
}

impl From<&RetrieverConfig> for PromptTemplate {
    fn from(config: &RetrieverConfig) -> Self {
        Self {
            assistant_role: config.assistant_role.clone(),
            corpus_name: config.corpus_name.clone(),
        }
    }
}

impl PromptTemplate {
    pub fn refusal(&self, reason: RefusalReason) -> Refusal {
        let message = match reason {
            RefusalReason::UnspecificQuery => format!(
                "{REFUSAL_PREFIX} Please ask a specific question about the {} documents.",
                self.corpus_name
            ),
            RefusalReason::NotFound => format!(
                "{REFUSAL_PREFIX} I don’t have that information in the provided {} documents. \
                 I can connect you with a healthcare professional for further help.",
                self.corpus_name
            ),
        };
        Refusal { reason, message }
    }

    fn rules(&self, max_sentences: usize) -> Vec<String> {
        vec![
            format!("Use ONLY the context below from {} documents.", self.corpus_name),
            "Provide general information; DO NOT diagnose or recommend treatments.".to_string(),
            "If asked for diagnosis/treatment/personal advice, respond: \"I can’t provide medical advice. \
             Please consult a qualified healthcare professional.\" and offer to connect them."
                .to_string(),
            "Use plain language and short sentences.".to_string(),
            "Include [S#] citations inline. When speaking, say “According to [S#] …”.".to_string(),
            "If unsure or not found, state that and offer to connect the user with a specialist."
                .to_string(),
            format!("Limit to {max_sentences} sentences."),
        ]
    }

    /// Renders the grounded prompt for `query` over `passages`.
    pub fn render(&self, query: &str, passages: &[Passage], max_sentences: usize) -> String {
        let rules: String = self
            .rules(max_sentences)
            .iter()
            .map(|rule| format!("- {rule}\n"))
            .collect();
        let context = passages
            .iter()
            .map(context_block)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        format!(
            "You are a {}.\nRules:\n{rules}\nContext:\n{context}\n\nQuestion: {query}\n\nWrite the final answer now.",
            self.assistant_role
        )
    }
}

/// `[<citationId>]` followed by the passage's non-blank lines.
fn context_block(passage: &Passage) -> String {
    std::iter::once(format!("[{}]", passage.citation_id))
        .chain(
            passage
                .text
                .trim()
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validates queries, retrieves context and composes grounded prompts.
#[derive(Debug)]
pub struct GroundingCompositor {
    engine: Arc<RetrievalEngine>,
    template: PromptTemplate,
    max_sentences: usize,
}

impl GroundingCompositor {
    pub fn new(engine: Arc<RetrievalEngine>, template: PromptTemplate) -> Self {
        Self {
            engine,
            template,
            max_sentences: DEFAULT_MAX_SENTENCES,
        }
    }

    /// Set the default sentence cap (builder style)
    pub fn with_max_sentences(self, max_sentences: usize) -> Self {
        Self {
            max_sentences,
            ..self
        }
    }

    pub fn engine(&self) -> &Arc<RetrievalEngine> {
        &self.engine
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Composes the outcome for `query`.
    ///
    /// `k` and `max_sentences` fall back to the engine's `top_k` and the
    /// compositor's sentence cap when absent or zero. Refusals are outcomes,
    /// not errors; an `Err` always means retrieval itself failed.
    pub async fn compose(
        &self,
        query: &str,
        k: Option<usize>,
        max_sentences: Option<usize>,
    ) -> Result<GroundingOutcome> {
        let query = query.trim();
        if query.split_whitespace().count() < 2 {
            info!("Refusing unspecific query");
            return Ok(GroundingOutcome::Refusal(
                self.template.refusal(RefusalReason::UnspecificQuery),
            ));
        }

        let k = self.engine.options().resolve_k(k);
        let passages = self.engine.search(query, k).await?;
        if passages.is_empty() {
            info!("No passages passed the threshold; refusing");
            return Ok(GroundingOutcome::Refusal(
                self.template.refusal(RefusalReason::NotFound),
            ));
        }

        let max_sentences = max_sentences.filter(|n| *n > 0).unwrap_or(self.max_sentences);
        let prompt = self.template.render(query, &passages, max_sentences);
        info!("Composed grounded prompt from {} passages", passages.len());
        Ok(GroundingOutcome::Grounded(GroundedPrompt {
            query: query.to_string(),
            prompt,
            passages,
        }))
    }
}
