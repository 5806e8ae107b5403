use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_search_engine::config::{self, AppConfig, CliConfig};
use catalog_search_engine::embedding::{EmbeddingClient, EmbeddingClientConfig};
use catalog_search_engine::facets::{FacetProvider, PostgresFacetProvider};
use catalog_search_engine::index::{self, ArtifactPaths, IndexMeta, ProductRecord};
use catalog_search_engine::search::HybridSearchEngine;
use catalog_search_engine::server::{run_server, ServerState};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML configuration file. File values override CLI flags.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Address to bind the main HTTP server to.
    #[clap(long, default_value = "0.0.0.0:8080")]
    pub bind_address: String,

    /// Port for the Prometheus metrics server.
    #[clap(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Directory holding the built index artifacts (vector index, lookup, meta).
    #[clap(long, default_value = "./artifacts")]
    pub artifact_dir: PathBuf,

    /// DSN for the relational facet/SKU store. Facets are disabled if omitted.
    #[clap(long)]
    pub relational_dsn: Option<String>,

    /// Base URL of the embedding service.
    #[clap(long, default_value = "http://localhost:11434")]
    pub embedding_base_url: String,

    /// Embedding model name.
    #[clap(long, default_value = "nomic-embed-text")]
    pub embedding_model: String,

    /// Timeout in seconds for embedding HTTP calls.
    #[clap(long, default_value_t = 30.0)]
    pub embedding_timeout_seconds: f64,

    /// Worker pool size (only consulted by the index-build binary; kept here
    /// so a single config file/CLI surface resolves for every binary).
    #[clap(long, default_value_t = 4)]
    pub worker_count: usize,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            bind_address: args.bind_address.clone(),
            metrics_port: args.metrics_port,
            artifact_dir: args.artifact_dir.clone(),
            relational_dsn: args.relational_dsn.clone(),
            embedding_base_url: args.embedding_base_url.clone(),
            embedding_model: args.embedding_model.clone(),
            embedding_timeout_seconds: args.embedding_timeout_seconds,
            worker_count: args.worker_count,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

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

    info!(
        version = env!("APP_VERSION"),
        git_hash = env!("GIT_HASH"),
        "starting catalog-search-server"
    );

    let file_config = match &cli_args.config {
        Some(path) => {
            info!(?path, "loading configuration file");
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config: CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    let paths = app_config.artifact_paths();
    let (index, lookup, meta) = load_artifacts(&paths)?;
    info!(
        num_items = meta.num_items,
        embedding_dim = meta.embedding_dim,
        model = %meta.model,
        "loaded index artifacts"
    );

    let engine = Arc::new(HybridSearchEngine::new(index, lookup)?);

    let embedding_client = Arc::new(EmbeddingClient::new(EmbeddingClientConfig {
        base_url: app_config.embedding.base_url.clone(),
        model: app_config.embedding.model.clone(),
        timeout: std::time::Duration::from_secs_f64(app_config.embedding.timeout_seconds),
    })?);

    let facet_provider: Option<Arc<dyn FacetProvider>> = match &app_config.relational_dsn {
        Some(dsn) => {
            info!("connecting to relational facet/SKU store");
            let provider = PostgresFacetProvider::connect(dsn).await?;
            Some(Arc::new(provider))
        }
        None => {
            info!("no relational_dsn configured; facets are disabled");
            None
        }
    };

    let bind_address = app_config.bind_address.clone();
    let metrics_port = app_config.metrics_port;

    let state = ServerState {
        config: Arc::new(app_config),
        engine,
        embedding_client,
        facet_provider,
        start_time: Instant::now(),
    };

    run_server(state, &bind_address, metrics_port).await
}

fn load_artifacts(paths: &ArtifactPaths) -> Result<(index::FlatL2Index, Vec<ProductRecord>, IndexMeta)> {
    let meta: IndexMeta = index::artifacts::read_json(&paths.meta_path)
        .context("failed to load index meta")?;
    let lookup: Vec<ProductRecord> = index::artifacts::read_json(&paths.lookup_path)
        .context("failed to load product lookup")?;
    let vector_index = index::FlatL2Index::load(&paths.index_path)
        .context("failed to load vector index")?;
    Ok((vector_index, lookup, meta))
}
