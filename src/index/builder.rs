//! Index builder (C3): CSV ingest through to persisted artifacts.

use crate::embedding::EmbeddingClient;
use crate::error::EngineError;
use crate::index::artifacts::{phonetic_vocabulary, ArtifactPaths, IndexMeta, ProductRecord};
use crate::index::vector_store::FlatL2Index;
use crate::phonetic::PhoneticEncoder;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CatalogueRow {
    product_name: String,
    brand_name: String,
    category_name: String,
}

#[derive(Debug, Clone)]
pub struct BuildStats {
    pub num_items: usize,
    pub embedding_dim: usize,
}

/// Read and normalize the CSV, failing fast if required columns are absent.
fn read_catalogue(csv_path: &Path, max_rows: Option<usize>) -> Result<Vec<CatalogueRow>, EngineError> {
    let mut reader = csv::Reader::from_path(csv_path).map_err(|e| EngineError::SchemaMismatch {
        detail: format!("failed to open CSV at {csv_path:?}: {e}"),
    })?;

    {
        let headers = reader.headers().map_err(|e| EngineError::SchemaMismatch {
            detail: format!("failed to read CSV headers: {e}"),
        })?;
        for required in ["product_name", "brand_name", "category_name"] {
            if !headers.iter().any(|h| h == required) {
                return Err(EngineError::SchemaMismatch {
                    detail: format!("CSV missing required column: {required}"),
                });
            }
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: CatalogueRow = result.map_err(|e| EngineError::SchemaMismatch {
            detail: format!("failed to parse CSV row: {e}"),
        })?;
        rows.push(row);
        if let Some(limit) = max_rows {
            if rows.len() >= limit {
                break;
            }
        }
    }
    Ok(rows)
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

struct NormalizedRow {
    product_name: String,
    brand_name: String,
    category_name: String,
    search_text: String,
}

fn normalize_rows(rows: Vec<CatalogueRow>) -> Vec<NormalizedRow> {
    rows.into_iter()
        .map(|row| {
            let product_name = normalize(&row.product_name);
            let brand_name = normalize(&row.brand_name);
            let category_name = normalize(&row.category_name);
            let search_text = format!("{brand_name} {product_name} {category_name}")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            NormalizedRow {
                product_name,
                brand_name,
                category_name,
                search_text,
            }
        })
        .collect()
}

/// Drive the whole C3 pipeline: ingest, normalize, phonetic-encode, embed
/// (parallel, ordered), build the flat L2 index, and persist all artifacts.
/// On success all four files (three mandatory, one optional) have been
/// rewritten atomically; on any error, nothing on disk has changed.
pub async fn build_index(
    csv_path: &Path,
    max_rows: Option<usize>,
    workers: usize,
    embedding_client: &EmbeddingClient,
    artifact_dir: &Path,
    write_vocab: bool,
) -> Result<BuildStats, EngineError> {
    std::fs::create_dir_all(artifact_dir).map_err(|e| EngineError::SchemaMismatch {
        detail: format!("failed to create artifact directory {artifact_dir:?}: {e}"),
    })?;

    let rows = read_catalogue(csv_path, max_rows)?;
    let normalized = normalize_rows(rows);

    let encoder = PhoneticEncoder::new();
    let texts: Vec<String> = normalized.iter().map(|r| r.search_text.clone()).collect();

    let progress = ProgressBar::new(texts.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embeddings ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let embeddings = embedding_client
        .embed_many(&texts, workers, || progress.inc(1))
        .await?;
    progress.finish_with_message("embeddings complete");

    if embeddings.len() != texts.len() {
        return Err(EngineError::DimensionMismatch {
            expected: texts.len(),
            actual: embeddings.len(),
        });
    }

    let embedding_dim = embeddings.first().map(|v| v.len()).unwrap_or(0);
    let mut index = FlatL2Index::new(embedding_dim);
    for vector in embeddings {
        index.add(vector)?;
    }

    let records: Vec<ProductRecord> = normalized
        .iter()
        .map(|row| {
            let brand_codes = encoder.encode_field(&row.brand_name);
            let product_codes = encoder.encode_field(&row.product_name);
            ProductRecord {
                label: row.product_name.clone(),
                brand_label: row.brand_name.clone(),
                category: row.category_name.clone(),
                brand_phonetic: brand_codes.primary,
                brand_phonetic_alt: brand_codes.alternate,
                product_phonetic: product_codes.primary,
                product_phonetic_alt: product_codes.alternate,
                brand_sku_id: None,
            }
        })
        .collect();

    let num_items = records.len();
    let meta = IndexMeta::new(num_items, embedding_dim, embedding_client.model());

    let paths = ArtifactPaths::in_dir(artifact_dir);
    let persist_err = |path: &Path| {
        move |e: anyhow::Error| EngineError::IndexCorrupt {
            path: path.display().to_string(),
            source: e,
        }
    };
    index
        .save(&paths.index_path)
        .context("failed to persist vector index")
        .map_err(persist_err(&paths.index_path))?;
    crate::index::artifacts::write_json_atomic(&paths.lookup_path, &records)
        .context("failed to persist product lookup")
        .map_err(persist_err(&paths.lookup_path))?;
    crate::index::artifacts::write_json_atomic(&paths.meta_path, &meta)
        .context("failed to persist index meta")
        .map_err(persist_err(&paths.meta_path))?;

    if write_vocab {
        let vocab = phonetic_vocabulary(&records);
        crate::index::artifacts::write_json_atomic(&paths.vocab_path, &vocab)
            .context("failed to persist phonetic vocabulary")
            .map_err(persist_err(&paths.vocab_path))?;
    }

    Ok(BuildStats {
        num_items,
        embedding_dim,
    })
}
