//! `crag`: ingest the Indian Constitution into a vector index and ask it
//! questions.
//!
//! - `crag init-index` creates the index if it does not exist
//! - `crag ingest [path]` chunks, embeds and upserts a text file
//! - `crag ask "<question>"` answers one question
//! - `crag chat` starts an interactive session (default)

mod chat;
mod services;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crag_core::{Document, Metric, RagConfig};
use crag_telemetry::{LogFormat, TelemetryConfig, init_telemetry};
use tracing::info;

use crate::services::Services;

#[derive(Parser, Debug)]
#[command(
    name = "crag",
    version,
    about = "Retrieval-augmented Q&A over the Indian Constitution",
    after_help = "EXAMPLES:\n    \
                  crag init-index                 # Create the vector index\n    \
                  crag ingest data/data.txt       # Load the corpus\n    \
                  crag ask \"What are Fundamental Duties?\"\n    \
                  crag chat                       # Interactive session\n\n\
                  Credentials are read from OPENAI_API_KEY, PINECONE_API_KEY and\n\
                  PINECONE_ENVIRONMENT (optionally PINECONE_CLOUD), or a .env file."
)]
struct Cli {
    /// Name of the vector index
    #[arg(long, global = true, env = "CRAG_INDEX", default_value = "indian-constitution")]
    index: String,

    /// Distance metric used when creating the index
    #[arg(long, global = true, default_value = "cosine")]
    metric: Metric,

    /// Per-request timeout in seconds for remote calls
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log output format (pretty or json)
    #[arg(long, global = true, env = "CRAG_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the vector index if it does not already exist
    InitIndex,

    /// Chunk, embed and upsert a text corpus
    Ingest {
        /// UTF-8 text file to ingest
        #[arg(default_value = "data/data.txt")]
        path: PathBuf,

        /// Word budget per chunk
        #[arg(long, default_value_t = crag_core::chunking::DEFAULT_MAX_WORDS)]
        max_words: usize,

        /// Chunks per upsert request
        #[arg(long, default_value_t = 100)]
        batch_size: usize,

        /// Concurrent embedding calls
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
    },

    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,

        /// Number of contexts to retrieve
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },

    /// Interactive chat session
    Chat {
        /// Number of contexts to retrieve per question
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive =
        if cli.verbose { "crag_core=debug,crag_cli=debug,info" } else { "warn,crag_core=info" };
    init_telemetry(
        &TelemetryConfig::new("crag").with_default_directive(directive).with_format(cli.log_format),
    )?;

    let mut builder = RagConfig::builder().index_name(cli.index.as_str()).metric(cli.metric);
    if let Some(secs) = cli.timeout_secs {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }

    match cli.command.unwrap_or(Commands::Chat { top_k: 3 }) {
        Commands::InitIndex => {
            let services = Services::connect(builder.build()?)?;
            services.ensure_index().await?;
            println!("Index '{}' is ready.", services.config.index_name);
        }
        Commands::Ingest { path, max_words, batch_size, concurrency } => {
            let config = builder
                .max_words(max_words)
                .batch_size(batch_size)
                .embed_concurrency(concurrency)
                .build()?;
            let document = Document::load(&path)
                .await
                .with_context(|| format!("failed to read corpus {}", path.display()))?;

            let services = Services::connect(config)?;
            services.ensure_index().await?;
            let ingested = services.ingestor()?.ingest(&document.text).await?;
            info!(ingested, source = %path.display(), "ingestion finished");
            println!("Ingested {ingested} chunks into '{}'.", services.config.index_name);
        }
        Commands::Ask { question, top_k } => {
            let services = Services::connect(builder.top_k(top_k).build()?)?;
            let answer = services.query_engine().answer(&question).await?;
            println!("{answer}");
        }
        Commands::Chat { top_k } => {
            let services = Services::connect(builder.top_k(top_k).build()?)?;
            chat::run(&services.query_engine()).await?;
        }
    }

    Ok(())
}
