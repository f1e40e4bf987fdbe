use anyhow::Result;
use clap::Parser;
use echohealth_mcp::{ServerConfig, run_server};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Model Context Protocol server for the echohealth corpus.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Snapshot directory written by `echohealth-retriever ingest`
    #[arg(short, long, value_name = "DIR")]
    index_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    run_server(ServerConfig {
        index_dir: args.index_dir,
        config_path: args.config,
    })
    .await
}
