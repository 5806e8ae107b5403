//! Hybrid query engine (C4): embed, retrieve, multi-signal rerank, top-k.

use crate::embedding::EmbeddingClient;
use crate::error::EngineError;
use crate::index::{FlatL2Index, ProductRecord};
use crate::phonetic::{exact_match, tolerant_match, PhoneticEncoder, PHONETIC_CODE_MAX_EDITS};
use serde::Serialize;
use std::time::Instant;

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_CANDIDATE_POOL: usize = 150;
pub const DEFAULT_PHONETIC_BOOST: f64 = 0.2;
pub const PRODUCT_PHONETIC_BOOST: f64 = 0.25;
pub const PHONETIC_APPROX_BOOST: f64 = 0.12;
pub const FUZZY_JARO_WEIGHT: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub query_text: String,
    pub k: usize,
    pub phonetic_boost: f64,
    pub candidate_pool: usize,
}

impl Default for HybridQuery {
    fn default() -> Self {
        Self {
            query_text: String::new(),
            k: DEFAULT_K,
            phonetic_boost: DEFAULT_PHONETIC_BOOST,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Hit {
    pub label: String,
    #[serde(rename = "brandLabel")]
    pub brand_label: String,
    pub category: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_sku_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_sku_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchTiming {
    pub embed_ms: f64,
    pub ann_ms: f64,
    pub rerank_ms: f64,
    pub total_ms: f64,
}

pub struct HybridSearchEngine {
    index: FlatL2Index,
    lookup: Vec<ProductRecord>,
    encoder: PhoneticEncoder,
}

impl HybridSearchEngine {
    pub fn new(index: FlatL2Index, lookup: Vec<ProductRecord>) -> Result<Self, EngineError> {
        if index.len() != lookup.len() {
            return Err(EngineError::IndexCorrupt {
                path: "<in-memory>".to_string(),
                source: anyhow::anyhow!(
                    "index has {} rows but lookup has {} entries",
                    index.len(),
                    lookup.len()
                ),
            });
        }
        Ok(Self {
            index,
            lookup,
            encoder: PhoneticEncoder::new(),
        })
    }

    pub fn lookup(&self) -> &[ProductRecord] {
        &self.lookup
    }

    /// Runs the full pipeline for `query` against `embedding_client`, returning
    /// ranked hits (length <= query.k) and, if `with_timing`, a breakdown.
    pub async fn search(
        &self,
        embedding_client: &EmbeddingClient,
        query: &HybridQuery,
        with_timing: bool,
    ) -> Result<(Vec<Hit>, Option<SearchTiming>), EngineError> {
        let start = Instant::now();

        if query.query_text.trim().is_empty() {
            return Ok((Vec::new(), None));
        }

        let query_codes = self.encoder.query_codes(&query.query_text);

        let embed_start = Instant::now();
        let query_vector = embedding_client.embed(&query.query_text).await?;
        let embed_ms = embed_start.elapsed().as_secs_f64() * 1000.0;

        let ann_start = Instant::now();
        let nprobe = query.candidate_pool.max(query.k);
        let candidates = self.index.search(&query_vector, nprobe)?;
        let ann_ms = ann_start.elapsed().as_secs_f64() * 1000.0;

        let rerank_start = Instant::now();
        let mut ranked: Vec<(f64, usize, &ProductRecord)> = Vec::with_capacity(candidates.len());
        for (order, (distance, row_index)) in candidates.into_iter().enumerate() {
            if row_index < 0 {
                continue;
            }
            let record = &self.lookup[row_index as usize];
            let score = self.score(distance as f64, record, &query.query_text, &query_codes, query.phonetic_boost);
            ranked.push((score, order, record));
        }

        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.truncate(query.k);

        let hits = ranked
            .into_iter()
            .map(|(score, _, record)| Hit {
                label: record.label.clone(),
                brand_label: record.brand_label.clone(),
                category: record.category.clone(),
                score,
                brand_sku_id: record.brand_sku_id.clone(),
                brand_sku_label: None,
                brand_name: None,
                brand_id: None,
            })
            .collect();
        let rerank_ms = rerank_start.elapsed().as_secs_f64() * 1000.0;

        let timing = with_timing.then(|| SearchTiming {
            embed_ms,
            ann_ms,
            rerank_ms,
            total_ms: start.elapsed().as_secs_f64() * 1000.0,
        });

        Ok((hits, timing))
    }

    fn score(
        &self,
        distance: f64,
        record: &ProductRecord,
        query_text: &str,
        query_codes: &std::collections::HashSet<String>,
        phonetic_boost: f64,
    ) -> f64 {
        let mut score = distance;

        if exact_match(&record.brand_phonetic, query_codes)
            || exact_match(&record.brand_phonetic_alt, query_codes)
        {
            score -= phonetic_boost;
        } else if tolerant_match(&record.brand_phonetic, query_codes, PHONETIC_CODE_MAX_EDITS)
            || tolerant_match(&record.brand_phonetic_alt, query_codes, PHONETIC_CODE_MAX_EDITS)
        {
            score -= PHONETIC_APPROX_BOOST;
        }

        if exact_match(&record.product_phonetic, query_codes)
            || exact_match(&record.product_phonetic_alt, query_codes)
        {
            score -= PRODUCT_PHONETIC_BOOST;
        } else if tolerant_match(&record.product_phonetic, query_codes, PHONETIC_CODE_MAX_EDITS)
            || tolerant_match(&record.product_phonetic_alt, query_codes, PHONETIC_CODE_MAX_EDITS)
        {
            score -= PHONETIC_APPROX_BOOST;
        }

        let jw = strsim::jaro_winkler(query_text, &record.label);
        score -= FUZZY_JARO_WEIGHT * jw;

        score
    }
}
