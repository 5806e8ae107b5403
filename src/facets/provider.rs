//! Facet/SKU provider client (C5): a thin adapter over the relational store.

use crate::error::EngineError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

/// Fixed price-range buckets, in ascending `min_price` order.
pub const PRICE_BUCKETS: &[(&str, f64, f64)] = &[
    ("Under \u{20b9}100", 0.0, 100.0),
    ("\u{20b9}100 - \u{20b9}250", 100.0, 250.0),
    ("\u{20b9}250 - \u{20b9}500", 250.0, 500.0),
    ("\u{20b9}500 - \u{20b9}1,000", 500.0, 1000.0),
    ("\u{20b9}1,000 - \u{20b9}2,500", 1000.0, 2500.0),
    ("\u{20b9}2,500 - \u{20b9}5,000", 2500.0, 5000.0),
    ("Above \u{20b9}5,000", 5000.0, f64::INFINITY),
];

const PRICE_BUCKET_CEILING: f64 = 100_000.0;

/// Facet/filter values that must be treated as absent, case-insensitive and
/// trimmed: they never appear in output and never satisfy a filter.
fn is_placeholder(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "" | "n/a" | "na" | "null" | "none" | "-"
    )
}

/// Returns the bucket label covering `price`, if any (`0 < price < 100000`).
pub fn price_bucket(price: f64) -> Option<&'static str> {
    if !(price > 0.0 && price < PRICE_BUCKET_CEILING) {
        return None;
    }
    PRICE_BUCKETS
        .iter()
        .find(|(_, min, max)| price >= *min && price < *max)
        .map(|(label, _, _)| *label)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkuFact {
    pub brand_sku_id: String,
    pub brand_sku_label: String,
    pub brand_id: String,
    pub brand_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Facet {
    pub standard_key: String,
    pub facet_value: String,
    pub count: i64,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

/// A map of `standard_key` to facet filter values, selected by the caller.
pub type FacetFilters = HashMap<String, Vec<String>>;

#[async_trait]
pub trait FacetProvider: Send + Sync {
    async fn resolve_skus_by_label(
        &self,
        labels: &[String],
    ) -> Result<HashMap<String, Vec<SkuFact>>, EngineError>;

    async fn resolve_skus_by_id(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, SkuFact>, EngineError>;

    async fn matching_skus(
        &self,
        facet_filters: &FacetFilters,
        candidate_sku_ids: &[String],
    ) -> Result<HashSet<String>, EngineError>;

    async fn facets_for_skus(
        &self,
        sku_ids: &[String],
        only_active_keys: bool,
    ) -> Result<Vec<Facet>, EngineError>;
}

/// Postgres-backed implementation querying the `brandSKU`/`brandSKUFacet`/
/// `standardFacetKeys` relations.
pub struct PostgresFacetProvider {
    pool: PgPool,
}

impl PostgresFacetProvider {
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(dsn).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FacetProvider for PostgresFacetProvider {
    async fn resolve_skus_by_label(
        &self,
        labels: &[String],
    ) -> Result<HashMap<String, Vec<SkuFact>>, EngineError> {
        if labels.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT bs.id AS brand_sku_id,
                   bs.label AS brand_sku_label,
                   bs."brandId" AS brand_id,
                   bs."brandLabel" AS brand_name
            FROM brands."brandSKU" bs
            WHERE LOWER(bs.label) = ANY(SELECT LOWER(x) FROM UNNEST($1::text[]) AS x)
            "#,
        )
        .bind(labels)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::FacetUnavailable(e.into()))?;

        let mut mapping: HashMap<String, Vec<SkuFact>> = HashMap::new();
        for (brand_sku_id, brand_sku_label, brand_id, brand_name) in rows {
            if let Some(original) = labels
                .iter()
                .find(|l| l.to_lowercase() == brand_sku_label.to_lowercase())
            {
                mapping.entry(original.clone()).or_default().push(SkuFact {
                    brand_sku_id,
                    brand_sku_label,
                    brand_id,
                    brand_name,
                });
            }
        }
        Ok(mapping)
    }

    async fn resolve_skus_by_id(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, SkuFact>, EngineError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT bs.id AS brand_sku_id,
                   bs.label AS brand_sku_label,
                   bs."brandId" AS brand_id,
                   bs."brandLabel" AS brand_name
            FROM brands."brandSKU" bs
            WHERE bs.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::FacetUnavailable(e.into()))?;

        Ok(rows
            .into_iter()
            .map(|(brand_sku_id, brand_sku_label, brand_id, brand_name)| {
                (
                    brand_sku_id.clone(),
                    SkuFact {
                        brand_sku_id,
                        brand_sku_label,
                        brand_id,
                        brand_name,
                    },
                )
            })
            .collect())
    }

    async fn matching_skus(
        &self,
        facet_filters: &FacetFilters,
        candidate_sku_ids: &[String],
    ) -> Result<HashSet<String>, EngineError> {
        if facet_filters.is_empty() || candidate_sku_ids.is_empty() {
            return Ok(candidate_sku_ids.iter().cloned().collect());
        }

        let mut keep: HashSet<String> = candidate_sku_ids.iter().cloned().collect();

        for (key, values) in facet_filters {
            if values.is_empty() {
                continue;
            }

            let matched: HashSet<String> = if key == "price_range" {
                self.skus_matching_price_buckets(candidate_sku_ids, values)
                    .await?
            } else {
                self.skus_matching_categorical(candidate_sku_ids, key, values)
                    .await?
            };

            keep = keep.intersection(&matched).cloned().collect();
        }

        Ok(keep)
    }

    async fn facets_for_skus(
        &self,
        sku_ids: &[String],
        only_active_keys: bool,
    ) -> Result<Vec<Facet>, EngineError> {
        if sku_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT bsf."standardKey" AS standard_key,
                   COALESCE(bsf."standardValue", bsf.value) AS facet_value,
                   COUNT(*) AS count
            FROM brands."brandSKUFacet" bsf
            WHERE bsf."brandSKUId" = ANY($1)
              AND bsf."standardKey" IS NOT NULL
              AND bsf."isActive" = true
              AND ($2 = false OR EXISTS (
                  SELECT 1 FROM brands."standardFacetKeys" sfk
                  WHERE sfk."standardKey" = bsf."standardKey" AND sfk."isActive" = true
              ))
            GROUP BY bsf."standardKey", COALESCE(bsf."standardValue", bsf.value)
            "#,
        )
        .bind(sku_ids)
        .bind(only_active_keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::FacetUnavailable(e.into()))?;

        let mut facets: Vec<Facet> = rows
            .into_iter()
            .filter(|(_, facet_value, _)| !is_placeholder(facet_value))
            .map(|(standard_key, facet_value, count)| Facet {
                standard_key,
                display_name: facet_value.clone(),
                facet_value,
                count,
                min_price: None,
                max_price: None,
            })
            .collect();

        facets.extend(self.price_range_facets(sku_ids).await?);
        Ok(facets)
    }
}

impl PostgresFacetProvider {
    async fn skus_matching_categorical(
        &self,
        candidate_sku_ids: &[String],
        key: &str,
        values: &[String],
    ) -> Result<HashSet<String>, EngineError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT bsf."brandSKUId" AS brand_sku_id
            FROM brands."brandSKUFacet" bsf
            WHERE bsf."brandSKUId" = ANY($1)
              AND bsf."standardKey" = $2
              AND bsf."isActive" = true
              AND COALESCE(bsf."standardValue", bsf.value) IS NOT NULL
              AND TRIM(COALESCE(bsf."standardValue", bsf.value)) != ''
              AND LOWER(TRIM(COALESCE(bsf."standardValue", bsf.value))) NOT IN ('n/a', 'na', 'null', 'none', '-')
              AND COALESCE(bsf."standardValue", bsf.value) = ANY($3)
            "#,
        )
        .bind(candidate_sku_ids)
        .bind(key)
        .bind(values)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::FacetUnavailable(e.into()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn skus_matching_price_buckets(
        &self,
        candidate_sku_ids: &[String],
        selected_labels: &[String],
    ) -> Result<HashSet<String>, EngineError> {
        let ranges: Vec<(f64, f64)> = PRICE_BUCKETS
            .iter()
            .filter(|(label, _, _)| selected_labels.iter().any(|s| s == label))
            .map(|(_, min, max)| (*min, *max))
            .collect();

        if ranges.is_empty() {
            return Ok(HashSet::new());
        }

        let mut keep = HashSet::new();
        for (min, max) in ranges {
            let rows: Vec<(String,)> = if max.is_finite() {
                sqlx::query_as(
                    r#"
                    SELECT id FROM brands."brandSKU"
                    WHERE id = ANY($1) AND "consumerSellingPrice" >= $2 AND "consumerSellingPrice" < $3
                    "#,
                )
                .bind(candidate_sku_ids)
                .bind(min)
                .bind(max)
                .fetch_all(&self.pool)
                .await
            } else {
                sqlx::query_as(
                    r#"
                    SELECT id FROM brands."brandSKU"
                    WHERE id = ANY($1) AND "consumerSellingPrice" >= $2
                    "#,
                )
                .bind(candidate_sku_ids)
                .bind(min)
                .fetch_all(&self.pool)
                .await
            }
            .map_err(|e| EngineError::FacetUnavailable(e.into()))?;

            keep.extend(rows.into_iter().map(|(id,)| id));
        }
        Ok(keep)
    }

    async fn price_range_facets(&self, sku_ids: &[String]) -> Result<Vec<Facet>, EngineError> {
        let rows: Vec<(f64,)> = sqlx::query_as(
            r#"
            SELECT "consumerSellingPrice" AS price
            FROM brands."brandSKU"
            WHERE id = ANY($1) AND "consumerSellingPrice" > 0 AND "consumerSellingPrice" < $2
            "#,
        )
        .bind(sku_ids)
        .bind(PRICE_BUCKET_CEILING)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::FacetUnavailable(e.into()))?;

        let mut counts: HashMap<&'static str, i64> = HashMap::new();
        for (price,) in rows {
            if let Some(bucket) = price_bucket(price) {
                *counts.entry(bucket).or_insert(0) += 1;
            }
        }

        Ok(PRICE_BUCKETS
            .iter()
            .filter_map(|(label, min, max)| {
                counts.get(label).map(|count| Facet {
                    standard_key: "price_range".to_string(),
                    facet_value: label.to_string(),
                    display_name: label.to_string(),
                    count: *count,
                    min_price: Some(*min),
                    max_price: Some(if max.is_finite() { *max } else { 999_999.0 }),
                })
            })
            .collect())
    }
}
