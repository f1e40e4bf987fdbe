use clap::{Parser, Subcommand};
use echohealth_embed::{
    CompletionProvider, EmbeddingProvider, OpenAiCompletionProvider, OpenAiEmbeddingProvider,
};
use echohealth_retriever::{
    config::RetrieverConfig,
    retrieval::{
        Catalog, GroundingCompositor, GroundingOutcome, IngestionEngine, PromptTemplate,
        RetrievalEngine, SYSTEM_INSTRUCTIONS, SearchOptions, render_passages,
    },
    storage::{IndexSnapshot, SnapshotManifest},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// A CLI tool to build and query the echohealth retrieval index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the snapshot directory from the configuration
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the index snapshot from the corpus
    Ingest {
        /// Override the corpus directory from the configuration
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Retrieve the passages most relevant to a query
    Search {
        /// Natural-language query
        query: String,
        /// Maximum number of passages
        #[arg(short, long)]
        k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List the indexed sources with their citation ids
    Catalog,
    /// Compose a grounded prompt (or refusal) for a question
    Ask {
        /// The user's question
        query: String,
        /// Maximum number of passages
        #[arg(short, long)]
        k: Option<usize>,
        /// Sentence cap written into the answer rules
        #[arg(long)]
        max_sentences: Option<usize>,
        /// Send the grounded prompt to the completion model and print its answer
        #[arg(long)]
        complete: bool,
    },
    /// Show information about the current snapshot
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct StatusOutput {
    index_dir: PathBuf,
    manifest: SnapshotManifest,
    sources: usize,
    configured_model: String,
}

#[tokio::main]
async fn main() {
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

fn embedder(config: &RetrieverConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(OpenAiEmbeddingProvider::new(config.embed_config())?))
}

fn open_engine(config: &RetrieverConfig) -> anyhow::Result<RetrievalEngine> {
    Ok(RetrievalEngine::open(
        &config.index_dir,
        embedder(config)?,
        SearchOptions::from(config),
    )?)
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RetrieverConfig::load(args.config.as_deref())?;
    if let Some(index_dir) = args.index_dir {
        config = config.with_index_dir(index_dir);
    }

    match args.command {
        Commands::Ingest { corpus } => {
            if let Some(corpus) = corpus {
                config = config.with_corpus_dir(corpus);
            }
            let embedder = embedder(&config)?;
            let report = IngestionEngine::new(config, embedder).run().await?;
            println!("{}", report.summary());
            for path in &report.skipped {
                println!("  skipped: {}", path.display());
            }
            Ok(())
        }
        Commands::Search { query, k, format } => {
            let engine = open_engine(&config)?;
            let k = engine.options().resolve_k(k);
            let passages = engine.search(&query, k).await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&passages)?);
                }
                OutputFormat::Summary => {
                    if passages.is_empty() {
                        println!("No passages above the relevance threshold.");
                    } else {
                        println!("{}", render_passages(&passages));
                    }
                }
            }
            Ok(())
        }
        Commands::Catalog => {
            let snapshot = IndexSnapshot::load(&config.index_dir)?;
            println!("{}", Catalog::build(snapshot.metadata()).render());
            Ok(())
        }
        Commands::Ask {
            query,
            k,
            max_sentences,
            complete,
        } => {
            let engine = Arc::new(open_engine(&config)?);
            let compositor = GroundingCompositor::new(engine, PromptTemplate::from(&config))
                .with_max_sentences(config.max_sentences);
            let outcome = compositor.compose(&query, k, max_sentences).await?;

            match outcome {
                GroundingOutcome::Grounded(grounded) if complete => {
                    let completer = OpenAiCompletionProvider::new(
                        config
                            .completion_config()
                            .with_system_prompt(SYSTEM_INSTRUCTIONS),
                    )?;
                    println!("{}", completer.complete(&grounded.prompt).await?);
                }
                outcome => println!("{outcome}"),
            }
            Ok(())
        }
        Commands::Status { format } => {
            let manifest = SnapshotManifest::read(&config.index_dir)?;
            let snapshot = IndexSnapshot::load(&config.index_dir)?;
            let sources = Catalog::build(snapshot.metadata()).len();
            let output = StatusOutput {
                index_dir: config.index_dir.clone(),
                manifest,
                sources,
                configured_model: config.embedding.model.clone(),
            };

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Snapshot: {}", output.index_dir.display());
                    println!("  Rows: {}", output.manifest.rows);
                    println!("  Dimension: {}", output.manifest.dimension);
                    println!("  Sources: {}", output.sources);
                    println!("  Embedding model: {}", output.manifest.embedding_model);
                    println!("  Built at: {}", output.manifest.built_at.to_rfc3339());
                    if output.manifest.embedding_model != output.configured_model {
                        println!(
                            "  Warning: configured model is {}; rebuild before querying",
                            output.configured_model
                        );
                    }
                }
            }
            Ok(())
        }
    }
}
