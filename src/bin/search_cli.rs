//! Interactive search REPL driving the hybrid query engine (and, if a
//! relational DSN is supplied, the facet composer) against already-built
//! artifacts, for manual query inspection without standing up the HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use catalog_search_engine::embedding::{EmbeddingClient, EmbeddingClientConfig};
use catalog_search_engine::facets::{self, FacetProvider, PostgresFacetProvider};
use catalog_search_engine::index::{artifacts::read_json, ArtifactPaths, FlatL2Index, IndexMeta, ProductRecord};
use catalog_search_engine::phonetic::PhoneticEncoder;
use catalog_search_engine::search::{HybridQuery, HybridSearchEngine};

#[derive(Parser, Debug)]
#[command(about = "Interactively query an already-built catalogue index")]
struct CliArgs {
    /// Directory holding the built index, lookup, and meta artifacts.
    #[clap(long, default_value = "./artifacts")]
    artifact_dir: PathBuf,

    /// Optional relational DSN; when supplied, results are enriched with
    /// SKU/facet data via the facet composer.
    #[clap(long)]
    relational_dsn: Option<String>,

    /// Base URL of the embedding service.
    #[clap(long, default_value = "http://localhost:11434")]
    embedding_base_url: String,

    /// Embedding model name.
    #[clap(long, default_value = "nomic-embed-text")]
    embedding_model: String,

    /// Number of results to return per query.
    #[clap(long, default_value_t = 5)]
    k: usize,

    /// Candidate pool size for re-ranking.
    #[clap(long, default_value_t = 150)]
    pool: usize,

    /// Phonetic boost subtracted from the L2 distance on an exact brand match.
    #[clap(long, default_value_t = 0.2)]
    boost: f64,

    /// Print the embed/ANN/rerank timing breakdown for each query.
    #[clap(long)]
    profile: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let paths = ArtifactPaths::in_dir(&args.artifact_dir);
    let meta: IndexMeta = read_json(&paths.meta_path).context("failed to load index meta")?;
    let lookup: Vec<ProductRecord> = read_json(&paths.lookup_path).context("failed to load product lookup")?;
    let index = FlatL2Index::load(&paths.index_path).context("failed to load vector index")?;
    let engine = HybridSearchEngine::new(index, lookup)?;

    let embedding_client = EmbeddingClient::new(EmbeddingClientConfig {
        base_url: args.embedding_base_url,
        model: args.embedding_model,
        timeout: std::time::Duration::from_secs(30),
    })?;

    let facet_provider: Option<Box<dyn FacetProvider>> = match &args.relational_dsn {
        Some(dsn) => Some(Box::new(PostgresFacetProvider::connect(dsn).await?)),
        None => None,
    };

    println!(
        "Loaded {} items (embedding_dim={}, model={}).",
        meta.num_items, meta.embedding_dim, meta.model
    );

    let encoder = PhoneticEncoder::new();
    let stdin = io::stdin();

    loop {
        print!("\nquery> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let query_text = line.trim();
        if query_text.is_empty() {
            continue;
        }
        if query_text == ":quit" || query_text == ":q" {
            break;
        }

        let codes = encoder.query_codes(query_text);
        println!(
            "phonetic codes={:?}",
            codes.into_iter().collect::<std::collections::BTreeSet<_>>()
        );

        let query = HybridQuery {
            query_text: query_text.to_string(),
            k: args.k,
            phonetic_boost: args.boost,
            candidate_pool: args.pool,
        };

        let (hits, timing) = match engine.search(&embedding_client, &query, args.profile).await {
            Ok(result) => result,
            Err(e) => {
                eprintln!("search failed: {e}");
                continue;
            }
        };

        let composed = if let Some(provider) = &facet_provider {
            facets::compose(hits, &HashMap::new(), false, provider.as_ref()).await
        } else {
            facets::ComposedResult { hits, facets: Vec::new() }
        };

        if composed.hits.is_empty() {
            println!("No matches found for {query_text:?}.");
        } else {
            println!("{:>3}  {:>10}  {:<20}  {:<30}  {:<15}", "#", "score", "brand", "product", "category");
            for (i, hit) in composed.hits.iter().enumerate() {
                println!(
                    "{:>3}  {:>10.4}  {:<20}  {:<30}  {:<15}",
                    i + 1,
                    hit.score,
                    hit.brand_label,
                    hit.label,
                    hit.category
                );
            }
        }

        for group in &composed.facets {
            let values: Vec<String> = group.values.iter().map(|v| format!("{}({})", v.facet_value, v.count)).collect();
            println!("facet[{}]: {}", group.standard_key, values.join(", "));
        }

        if let Some(timing) = timing {
            println!(
                "timing: total={:.2}ms embed={:.2}ms ann={:.2}ms rerank={:.2}ms",
                timing.total_ms, timing.embed_ms, timing.ann_ms, timing.rerank_ms
            );
        }
    }

    Ok(())
}
