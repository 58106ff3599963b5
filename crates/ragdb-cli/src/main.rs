//! RAG store CLI: bulk ingestion, a one-off status/query console, and the
//! line-delimited JSON tool server other processes drive over stdio.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use ragdb_core::embeddings::{EmbeddingProvider, PlaceholderEmbedder};
use ragdb_core::query::QueryCoordinator;
use ragdb_core::vault::VectorStore;
use ragdb_core::Config;

mod bulk_ingest;
mod display;
mod serve;

use bulk_ingest::IngestCliArgs;
use display::{create_table, print_error, print_success};

#[derive(Parser)]
#[command(name = "ragdb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tool server: one JSON request per line on stdin, one JSON
    /// response per line on stdout.
    Serve,

    /// Walk a file or directory and ingest every matching document.
    Ingest(IngestCliArgs),

    /// Run a single hybrid search against the store and print the results.
    Query {
        /// The search query text.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        db_path: Option<std::path::PathBuf>,
    },

    /// Print store size, health, and FTS status.
    Status {
        #[arg(long)]
        db_path: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => serve::run(Config::from_env()).await,
        Commands::Ingest(args) => {
            let code = bulk_ingest::run(args).await?;
            std::process::exit(code);
        }
        Commands::Query { query, limit, db_path } => run_query(query, limit, db_path).await,
        Commands::Status { db_path } => run_status(db_path).await,
    }
}

async fn open_query_coordinator(
    db_path: Option<std::path::PathBuf>,
) -> anyhow::Result<QueryCoordinator<Arc<dyn EmbeddingProvider>>> {
    let mut config = Config::from_env();
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(PlaceholderEmbedder::with_model_name(384, config.model_name.clone()));
    let db_file = config.db_path.join("chunks.sqlite");
    let store = VectorStore::open(&db_file)?;
    store.initialize().await?;
    Ok(QueryCoordinator::new(store, embedder, config))
}

async fn run_query(query: String, limit: usize, db_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let coordinator = open_query_coordinator(db_path).await?;
    match coordinator.query_documents(&query, limit).await {
        Ok(results) => {
            if results.is_empty() {
                println!("no matches");
                return Ok(());
            }
            let mut table = create_table();
            table.set_header(vec!["file", "chunk", "distance", "text"]);
            for r in results {
                let snippet: String = r.text.chars().take(120).collect();
                table.add_row(vec![
                    r.file_path,
                    r.chunk_index.to_string(),
                    format!("{:.4}", r.distance),
                    snippet,
                ]);
            }
            println!("{table}");
        }
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run_status(db_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let coordinator = open_query_coordinator(db_path).await?;
    match coordinator.status().await {
        Ok(status) => {
            let mut table = create_table();
            table.set_header(vec!["metric", "value"]);
            table.add_row(vec!["documents".to_string(), status.document_count.to_string()]);
            table.add_row(vec!["chunks".to_string(), status.chunk_count.to_string()]);
            table.add_row(vec![
                "memory (MB)".to_string(),
                format!("{:.2}", status.memory_usage_mb),
            ]);
            table.add_row(vec!["uptime (s)".to_string(), status.uptime_seconds.to_string()]);
            println!("{table}");
            print_success("status ok");
        }
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(1);
        }
    }
    Ok(())
}
