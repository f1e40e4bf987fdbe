use echohealth_retriever::retrieval::{RetrievalEngine, render_passages};
use rmcp::schemars;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DocSearchRequest {
    #[schemars(description = "Natural-language search query")]
    pub query: String,
    #[schemars(description = "Maximum number of passages to return (defaults to the configured top_k)")]
    pub k: Option<u32>,
}

/// Catalog listing, one `"<citationId>: <sourceFile>"` line per source.
pub fn doc_catalog(engine: &RetrievalEngine) -> String {
    info!("Processing catalog request");
    engine.catalog_listing()
}

/// Rendered passages for the query; an empty string when nothing is relevant.
pub async fn doc_search(
    engine: &RetrievalEngine,
    request: DocSearchRequest,
) -> Result<String, String> {
    let k = request
        .k
        .filter(|k| *k > 0)
        .map_or(engine.options().top_k, |k| k as usize);
    info!("Processing doc search: k={}", k);

    match engine.search(&request.query, k).await {
        Ok(passages) => Ok(render_passages(&passages)),
        Err(e) => {
            warn!("Doc search failed: {}", e);
            Err(format!("Search failed: {e}"))
        }
    }
}
