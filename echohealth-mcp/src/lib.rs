//! # echohealth-mcp
//!
//! A Model Context Protocol (MCP) server that lets an agent answer health
//! questions from the indexed corpus. The agent lists the sources, searches
//! them, and asks for a grounded prompt (or a refusal) for the user's question;
//! the server never calls a chat model itself.
//!
//! ## MCP Tools
//!
//! ### `doc_catalog`
//! One `"<citationId>: <sourceFile>"` line per indexed source.
//!
//! ### `doc_search`
//! The passages most relevant to a query, as `[S#] score=...` blocks. Empty
//! when nothing passes the relevance threshold.
//!
//! ### `grounded_answer`
//! A prompt that restricts the model to the retrieved passages, or a
//! `REFUSE:` message when the question is unspecific or nothing relevant was found.
//!
//! ### `status`
//! Snapshot and retrieval settings.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build the snapshot first
//! echohealth-retriever ingest --corpus docs
//!
//! # Then serve it
//! echohealth-mcp --index-dir rag
//! ```
//!
//! ```no_run
//! use echohealth_mcp::{ServerConfig, run_server};
//!
//! # async fn example() -> anyhow::Result<()> {
//! run_server(ServerConfig::new("rag")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Integration with MCP clients
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "echohealth": {
//!       "command": "echohealth-mcp",
//!       "args": ["--index-dir", "/path/to/rag"],
//!       "env": { "OPENAI_API_KEY": "..." }
//!     }
//!   }
//! }
//! ```

mod server;
pub mod tools;

pub use server::EchoHealthMcpServer;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Where the server finds its snapshot and settings.
///
/// `index_dir` overrides the directory named in the configuration file; with
/// neither, the snapshot is read from `rag`.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Snapshot directory written by `echohealth-retriever ingest`
    pub index_dir: Option<PathBuf>,
    /// Optional TOML file with retrieval and provider settings
    pub config_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: Some(index_dir.into()),
            config_path: None,
        }
    }

    pub fn with_config_path(self, config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(config_path.into()),
            ..self
        }
    }
}

/// Run the MCP server over stdio until the client disconnects.
///
/// # Errors
/// - If no snapshot exists in the index directory
/// - If the configuration file is invalid or the embedding provider cannot be set up
/// - MCP protocol communication errors
pub async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Starting echohealth MCP server");
    let server = EchoHealthMcpServer::new(&config)?;
    info!("Snapshot loaded, starting stdio transport");
    server.serve_stdio().await
}
