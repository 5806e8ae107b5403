mod file_config;

pub use file_config::{EmbeddingConfig, FileConfig, IndexBuildConfig, SearchConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// Mirrors the flags that can be overridden by the TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub bind_address: String,
    pub metrics_port: u16,
    pub artifact_dir: PathBuf,
    pub relational_dsn: Option<String>,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_timeout_seconds: f64,
    pub worker_count: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            metrics_port: 9090,
            artifact_dir: PathBuf::from("./artifacts"),
            relational_dsn: None,
            embedding_base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_timeout_seconds: 30.0,
            worker_count: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub default_k: usize,
    pub candidate_pool: usize,
    pub phonetic_boost: f64,
    pub product_phonetic_boost: f64,
    pub phonetic_approx_boost: f64,
    pub fuzzy_jaro_weight: f64,
    pub phonetic_code_max_edits: usize,
    pub only_active_facets: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_k: crate::search::engine::DEFAULT_K,
            candidate_pool: crate::search::engine::DEFAULT_CANDIDATE_POOL,
            phonetic_boost: crate::search::engine::DEFAULT_PHONETIC_BOOST,
            product_phonetic_boost: crate::search::engine::PRODUCT_PHONETIC_BOOST,
            phonetic_approx_boost: crate::search::engine::PHONETIC_APPROX_BOOST,
            fuzzy_jaro_weight: crate::search::engine::FUZZY_JARO_WEIGHT,
            phonetic_code_max_edits: crate::phonetic::PHONETIC_CODE_MAX_EDITS,
            only_active_facets: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub metrics_port: u16,
    pub artifact_dir: PathBuf,
    pub relational_dsn: Option<String>,
    pub worker_count: usize,

    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and an optional TOML file.
    /// File values override CLI values where present (CLI > env is handled
    /// by clap itself via `env` attributes on the arg definitions; this
    /// layer only arbitrates file vs. CLI).
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let bind_address = file.bind_address.clone().unwrap_or_else(|| cli.bind_address.clone());
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let artifact_dir = file
            .artifact_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.artifact_dir.clone());
        let relational_dsn = file.relational_dsn.clone().or_else(|| cli.relational_dsn.clone());
        let worker_count = file
            .index_build
            .as_ref()
            .and_then(|c| c.worker_count)
            .unwrap_or(cli.worker_count);

        if worker_count == 0 {
            bail!("worker_count must be greater than zero");
        }

        let embedding_file = file.embedding.clone().unwrap_or_default();
        let embedding = EmbeddingSettings {
            base_url: embedding_file.base_url.unwrap_or_else(|| cli.embedding_base_url.clone()),
            model: embedding_file.model.unwrap_or_else(|| cli.embedding_model.clone()),
            timeout_seconds: embedding_file
                .timeout_seconds
                .unwrap_or(cli.embedding_timeout_seconds),
        };

        let defaults = SearchSettings::default();
        let search_file = file.search.clone().unwrap_or_default();
        let search = SearchSettings {
            default_k: search_file.default_k.unwrap_or(defaults.default_k),
            candidate_pool: search_file.candidate_pool.unwrap_or(defaults.candidate_pool),
            phonetic_boost: search_file.phonetic_boost.unwrap_or(defaults.phonetic_boost),
            product_phonetic_boost: search_file
                .product_phonetic_boost
                .unwrap_or(defaults.product_phonetic_boost),
            phonetic_approx_boost: search_file
                .phonetic_approx_boost
                .unwrap_or(defaults.phonetic_approx_boost),
            fuzzy_jaro_weight: search_file.fuzzy_jaro_weight.unwrap_or(defaults.fuzzy_jaro_weight),
            phonetic_code_max_edits: search_file
                .phonetic_code_max_edits
                .unwrap_or(defaults.phonetic_code_max_edits),
            only_active_facets: search_file.only_active_facets.unwrap_or(defaults.only_active_facets),
        };

        Ok(Self {
            bind_address,
            metrics_port,
            artifact_dir,
            relational_dsn,
            worker_count,
            embedding,
            search,
        })
    }

    pub fn artifact_paths(&self) -> crate::index::ArtifactPaths {
        crate::index::ArtifactPaths::in_dir(&self.artifact_dir)
    }
}
