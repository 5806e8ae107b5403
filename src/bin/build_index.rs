//! Index-build CLI: drives C3 end-to-end from a catalogue CSV.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_search_engine::embedding::{EmbeddingClient, EmbeddingClientConfig};
use catalog_search_engine::index::build_index;

#[derive(Parser, Debug)]
#[command(about = "Build the vector index and lookup artifacts from a product catalogue CSV")]
struct CliArgs {
    /// Path to the product catalogue CSV (columns: product_name, brand_name, category_name).
    #[clap(long)]
    csv: PathBuf,

    /// Limit ingestion to the first N rows, for quick builds.
    #[clap(long)]
    max_rows: Option<usize>,

    /// Concurrent embedding workers.
    #[clap(long, default_value_t = 4)]
    workers: usize,

    /// Directory to write the index, lookup, and meta artifacts into.
    #[clap(long, default_value = "./artifacts")]
    artifact_dir: PathBuf,

    /// Also write the de-duplicated phonetic vocabulary artifact.
    #[clap(long)]
    write_vocab: bool,

    /// Base URL of the embedding service.
    #[clap(long, default_value = "http://localhost:11434")]
    embedding_base_url: String,

    /// Embedding model name.
    #[clap(long, default_value = "nomic-embed-text")]
    embedding_model: String,

    /// Timeout in seconds for embedding HTTP calls.
    #[clap(long, default_value_t = 30.0)]
    embedding_timeout_seconds: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("RUST_LOG")
                .from_env_lossy(),
        )
        .try_init()
        .ok();

    let args = CliArgs::parse();

    let embedding_client = EmbeddingClient::new(EmbeddingClientConfig {
        base_url: args.embedding_base_url,
        model: args.embedding_model,
        timeout: std::time::Duration::from_secs_f64(args.embedding_timeout_seconds),
    })?;

    info!(csv = ?args.csv, workers = args.workers, "starting index build");

    let stats = build_index(
        &args.csv,
        args.max_rows,
        args.workers.max(1),
        &embedding_client,
        &args.artifact_dir,
        args.write_vocab,
    )
    .await?;

    println!(
        "Built index with {} items, embedding_dim={}",
        stats.num_items, stats.embedding_dim
    );

    Ok(())
}
