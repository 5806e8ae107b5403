use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub bind_address: Option<String>,
    pub metrics_port: Option<u16>,
    pub artifact_dir: Option<String>,
    pub relational_dsn: Option<String>,
    pub embedding: Option<EmbeddingConfig>,
    pub search: Option<SearchConfig>,
    pub index_build: Option<IndexBuildConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_k: Option<usize>,
    pub candidate_pool: Option<usize>,
    pub phonetic_boost: Option<f64>,
    pub product_phonetic_boost: Option<f64>,
    pub phonetic_approx_boost: Option<f64>,
    pub fuzzy_jaro_weight: Option<f64>,
    pub phonetic_code_max_edits: Option<usize>,
    pub only_active_facets: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IndexBuildConfig {
    pub worker_count: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
