//! On-disk artifact types and atomic persistence for the index builder (C3).

use crate::error::EngineError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One indexed catalogue item; position in the lookup array is the
/// corresponding row of the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub label: String,
    #[serde(rename = "brandLabel")]
    pub brand_label: String,
    pub category: String,
    pub brand_phonetic: String,
    pub brand_phonetic_alt: String,
    pub product_phonetic: String,
    pub product_phonetic_alt: String,
    /// Present only when the lookup was built directly from SKU rows
    /// (ID-carrying mode, see the facet composer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_sku_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub num_items: usize,
    pub embedding_dim: usize,
    pub model: String,
    pub index_type: String,
}

impl IndexMeta {
    pub fn new(num_items: usize, embedding_dim: usize, model: impl Into<String>) -> Self {
        Self {
            num_items,
            embedding_dim,
            model: model.into(),
            index_type: "flat-L2".to_string(),
        }
    }
}

/// Paths for the three (plus one optional) artifact files that form a
/// consistent set and must be rewritten atomically together.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub index_path: PathBuf,
    pub lookup_path: PathBuf,
    pub meta_path: PathBuf,
    pub vocab_path: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index_path: dir.join("vector_index.json"),
            lookup_path: dir.join("product_lookup.json"),
            meta_path: dir.join("meta.json"),
            vocab_path: dir.join("phonetic_vocab.json"),
        }
    }
}

/// Write `value` as JSON to `path`, via a sibling temp file plus rename, so a
/// crash never leaves a half-written file in place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let dir = path.parent().context("artifact path has no parent directory")?;
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {dir:?}"))?;
    serde_json::to_writer(&tmp, value)
        .with_context(|| format!("failed to serialize artifact to {path:?}"))?;
    tmp.persist(path)
        .with_context(|| format!("failed to rename temp file into {path:?}"))?;
    Ok(())
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::IndexCorrupt {
        path: path.display().to_string(),
        source: e.into(),
    })?;
    serde_json::from_str(&content).map_err(|e| EngineError::IndexCorrupt {
        path: path.display().to_string(),
        source: e.into(),
    })
}

/// De-duplicated, sorted union of all four phonetic fields across `records`,
/// with empty strings removed.
pub fn phonetic_vocabulary(records: &[ProductRecord]) -> Vec<String> {
    let mut set = BTreeSet::new();
    for record in records {
        for code in [
            &record.brand_phonetic,
            &record.brand_phonetic_alt,
            &record.product_phonetic,
            &record.product_phonetic_alt,
        ] {
            if !code.is_empty() {
                set.insert(code.clone());
            }
        }
    }
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> ProductRecord {
        ProductRecord {
            label: "colgate total".to_string(),
            brand_label: "colgate".to_string(),
            category: "toothpaste".to_string(),
            brand_phonetic: "KLKT".to_string(),
            brand_phonetic_alt: "".to_string(),
            product_phonetic: "KLKT".to_string(),
            product_phonetic_alt: "TLT".to_string(),
            brand_sku_id: None,
        }
    }

    #[test]
    fn write_then_read_json_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lookup.json");
        let records = vec![sample_record()];
        write_json_atomic(&path, &records).unwrap();
        let loaded: Vec<ProductRecord> = read_json(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn vocabulary_dedupes_and_drops_empty() {
        let records = vec![sample_record(), sample_record()];
        let vocab = phonetic_vocabulary(&records);
        assert_eq!(vocab, vec!["KLKT".to_string(), "TLT".to_string()]);
    }

    #[test]
    fn read_missing_file_is_index_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = read_json::<IndexMeta>(&path).unwrap_err();
        assert!(matches!(err, EngineError::IndexCorrupt { .. }));
    }
}
