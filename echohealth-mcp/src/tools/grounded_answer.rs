use echohealth_retriever::retrieval::GroundingCompositor;
use rmcp::schemars;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GroundedAnswerRequest {
    #[schemars(description = "The user's health question")]
    pub query: String,
    #[schemars(description = "Maximum number of passages to ground on (defaults to the configured top_k)")]
    pub k: Option<u32>,
    #[schemars(description = "Sentence limit for the answer (defaults to the configured max_sentences)")]
    pub max_sentences: Option<u32>,
}

/// The grounded prompt for the question, or the refusal text.
pub async fn grounded_answer(
    compositor: &GroundingCompositor,
    request: GroundedAnswerRequest,
) -> Result<String, String> {
    info!(
        "Processing grounded answer: k={:?}, max_sentences={:?}",
        request.k, request.max_sentences
    );

    compositor
        .compose(
            &request.query,
            request.k.map(|k| k as usize),
            request.max_sentences.map(|n| n as usize),
        )
        .await
        .map(|outcome| outcome.text().to_string())
        .map_err(|e| {
            warn!("Grounded answer failed: {}", e);
            format!("Grounding failed: {e}")
        })
}
