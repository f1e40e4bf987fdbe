use crate::ServerConfig;
use crate::tools::{
    doc_search::{self, DocSearchRequest},
    grounded_answer::{self, GroundedAnswerRequest},
};
use anyhow::Result;
use echohealth_embed::OpenAiEmbeddingProvider;
use echohealth_retriever::{
    config::RetrieverConfig,
    retrieval::{
        Catalog, GroundingCompositor, PromptTemplate, RetrievalEngine, SYSTEM_INSTRUCTIONS,
        SearchOptions,
    },
    storage::IndexSnapshot,
};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use std::sync::Arc;
use tracing::info;

/// MCP server answering from one snapshot, loaded once at startup.
#[derive(Clone)]
pub struct EchoHealthMcpServer {
    compositor: Arc<GroundingCompositor>,
    config: Arc<RetrieverConfig>,
    tool_router: ToolRouter<Self>,
}

impl EchoHealthMcpServer {
    /// Loads the configuration and snapshot and connects the embedding provider.
    ///
    /// A missing snapshot is fatal; the server never starts without an index.
    pub fn new(server_config: &ServerConfig) -> Result<Self> {
        let mut config = RetrieverConfig::load(server_config.config_path.as_deref())?;
        if let Some(index_dir) = &server_config.index_dir {
            config = config.with_index_dir(index_dir);
        }
        info!(
            "Initializing echohealth MCP server with index: {:?}",
            config.index_dir
        );

        let snapshot = Arc::new(IndexSnapshot::load(&config.index_dir)?);
        let embedder = Arc::new(OpenAiEmbeddingProvider::new(config.embed_config())?);
        let engine = RetrievalEngine::new(snapshot, embedder, SearchOptions::from(&config))?;
        Ok(Self::from_engine(Arc::new(engine), config))
    }

    /// Builds a server around an existing engine.
    pub fn from_engine(engine: Arc<RetrievalEngine>, config: RetrieverConfig) -> Self {
        let compositor = GroundingCompositor::new(engine, PromptTemplate::from(&config))
            .with_max_sentences(config.max_sentences);
        Self {
            compositor: Arc::new(compositor),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    fn engine(&self) -> &RetrievalEngine {
        self.compositor.engine()
    }

    /// Serve the MCP server using stdio transport
    pub async fn serve_stdio(self) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        let service = self.serve(stdio()).await?;
        let quit_reason = service.waiting().await?;
        info!("MCP server quit: {:?}", quit_reason);
        Ok(())
    }

    /// Snapshot and retrieval settings as text.
    pub fn status_report(&self) -> String {
        let snapshot = self.engine().snapshot();
        let sources = Catalog::build(snapshot.metadata()).len();
        let options = self.engine().options();
        format!(
            "echohealth MCP Server Status\n\
            ============================\n\
            Server Version: {}\n\
            Index Directory: {}\n\
            Rows: {}\n\
            Dimension: {}\n\
            Sources: {}\n\
            Embedding Model: {}\n\
            Built At: {}\n\
            Top K: {}\n\
            Relevance Threshold: {:.2}\n\
            Max Sentences: {}\n",
            env!("CARGO_PKG_VERSION"),
            self.config.index_dir.display(),
            snapshot.len(),
            snapshot.dimension(),
            sources,
            snapshot.embedding_model(),
            snapshot.built_at().to_rfc3339(),
            options.top_k,
            options.relevance_threshold,
            self.config.max_sentences,
        )
    }
}

#[tool_router]
impl EchoHealthMcpServer {
    /// Catalog tool - list every indexed source with its citation id
    #[tool(description = "List the indexed health documents as '<citationId>: <sourceFile>' lines")]
    async fn doc_catalog(&self) -> String {
        doc_search::doc_catalog(self.engine())
    }

    /// Search tool - passages most relevant to a query
    #[tool(
        description = "Search the health documents and return the most relevant passages as '[S#] score=...' blocks; empty when nothing is relevant"
    )]
    async fn doc_search(
        &self,
        Parameters(request): Parameters<DocSearchRequest>,
    ) -> Result<String, String> {
        doc_search::doc_search(self.engine(), request).await
    }

    /// Answer tool - grounded prompt or refusal for a question
    #[tool(
        description = "Build a prompt that answers the question only from cited passages, or a message starting with 'REFUSE:' when the documents cannot answer it"
    )]
    async fn grounded_answer(
        &self,
        Parameters(request): Parameters<GroundedAnswerRequest>,
    ) -> Result<String, String> {
        grounded_answer::grounded_answer(&self.compositor, request).await
    }

    /// Status tool - snapshot and configuration summary
    #[tool(description = "Show the loaded snapshot and retrieval settings")]
    async fn status(&self) -> String {
        info!("Processing status request");
        self.status_report()
    }
}

#[tool_handler]
impl ServerHandler for EchoHealthMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SYSTEM_INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
