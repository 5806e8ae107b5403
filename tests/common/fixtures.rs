//! Deterministic catalogue and facet fixtures shared by the e2e tests.

use async_trait::async_trait;
use catalog_search_engine::facets::{Facet, FacetFilters, FacetProvider, SkuFact};
use catalog_search_engine::index::{FlatL2Index, ProductRecord};
use catalog_search_engine::phonetic::PhoneticEncoder;
use catalog_search_engine::EngineError;
use std::collections::{HashMap, HashSet};

fn product(label: &str, brand: &str, category: &str, brand_sku_id: Option<&str>) -> ProductRecord {
    let encoder = PhoneticEncoder::new();
    let brand_codes = encoder.encode_field(brand);
    let product_codes = encoder.encode_field(label);
    ProductRecord {
        label: label.to_string(),
        brand_label: brand.to_string(),
        category: category.to_string(),
        brand_phonetic: brand_codes.primary,
        brand_phonetic_alt: brand_codes.alternate,
        product_phonetic: product_codes.primary,
        product_phonetic_alt: product_codes.alternate,
        brand_sku_id: brand_sku_id.map(str::to_string),
    }
}

/// Four products at fixed, well-separated 2D corners so a flat L2 search
/// against [`FakeEmbeddingServer`]'s matching vectors is deterministic.
pub fn sample_catalog() -> (FlatL2Index, Vec<ProductRecord>) {
    let rows = [
        product("Total Advanced", "Colgate", "Toothpaste", Some("sku-1")),
        product("Complete Care", "Pepsodent", "Toothpaste", Some("sku-2")),
        product("Ultra Clean", "Colgate", "Mouthwash", Some("sku-3")),
        product("Fresh Mint", "Closeup", "Toothpaste", Some("sku-4")),
    ];

    let vectors = [
        vec![1.0_f32, 0.0],
        vec![0.0_f32, 1.0],
        vec![0.9_f32, 0.1],
        vec![-1.0_f32, 0.0],
    ];

    let mut index = FlatL2Index::new(2);
    for vector in vectors {
        index.add(vector).unwrap();
    }

    (index, rows.to_vec())
}

/// In-memory stand-in for [`PostgresFacetProvider`], analogous to the
/// teacher's `NoOpSearchVault` for exercising the facet-composition path
/// without a live database.
#[derive(Default)]
pub struct FakeFacetProvider {
    skus: HashMap<String, SkuFact>,
    facets_by_sku: HashMap<String, Vec<Facet>>,
}

impl FakeFacetProvider {
    pub fn new() -> Self {
        let mut skus = HashMap::new();
        let mut facets_by_sku: HashMap<String, Vec<Facet>> = HashMap::new();

        for (id, label, brand_id, brand_name, material, price_label, min, max) in [
            ("sku-1", "Total Advanced", "brand-colgate", "Colgate", "Gel", "Under \u{20b9}100", 0.0, 100.0),
            ("sku-2", "Complete Care", "brand-pepsodent", "Pepsodent", "Gel", "\u{20b9}100 - \u{20b9}250", 100.0, 250.0),
            ("sku-3", "Ultra Clean", "brand-colgate", "Colgate", "Liquid", "Under \u{20b9}100", 0.0, 100.0),
            ("sku-4", "Fresh Mint", "brand-closeup", "Closeup", "Gel", "Under \u{20b9}100", 0.0, 100.0),
        ] {
            skus.insert(
                id.to_string(),
                SkuFact {
                    brand_sku_id: id.to_string(),
                    brand_sku_label: label.to_string(),
                    brand_id: brand_id.to_string(),
                    brand_name: brand_name.to_string(),
                },
            );
            let mut facets = vec![
                Facet {
                    standard_key: "material".to_string(),
                    facet_value: material.to_string(),
                    display_name: material.to_string(),
                    count: 1,
                    min_price: None,
                    max_price: None,
                },
                Facet {
                    standard_key: "price_range".to_string(),
                    facet_value: price_label.to_string(),
                    display_name: price_label.to_string(),
                    count: 1,
                    min_price: Some(min),
                    max_price: Some(max),
                },
            ];
            // Stands in for a facet key not present in `standardFacetKeys` /
            // not marked active, so `active_facets=true` filters it out.
            if id == "sku-1" {
                facets.push(Facet {
                    standard_key: "internal_note".to_string(),
                    facet_value: "batch-7".to_string(),
                    display_name: "batch-7".to_string(),
                    count: 1,
                    min_price: None,
                    max_price: None,
                });
            }
            facets_by_sku.insert(id.to_string(), facets);
        }

        Self { skus, facets_by_sku }
    }
}

#[async_trait]
impl FacetProvider for FakeFacetProvider {
    async fn resolve_skus_by_label(
        &self,
        labels: &[String],
    ) -> Result<HashMap<String, Vec<SkuFact>>, EngineError> {
        let mut out = HashMap::new();
        for label in labels {
            let matches: Vec<SkuFact> = self
                .skus
                .values()
                .filter(|f| f.brand_sku_label.eq_ignore_ascii_case(label))
                .cloned()
                .collect();
            if !matches.is_empty() {
                out.insert(label.clone(), matches);
            }
        }
        Ok(out)
    }

    async fn resolve_skus_by_id(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, SkuFact>, EngineError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.skus.get(id).map(|fact| (id.clone(), fact.clone())))
            .collect())
    }

    async fn matching_skus(
        &self,
        facet_filters: &FacetFilters,
        candidate_sku_ids: &[String],
    ) -> Result<HashSet<String>, EngineError> {
        if facet_filters.is_empty() {
            return Ok(candidate_sku_ids.iter().cloned().collect());
        }

        let keep = candidate_sku_ids
            .iter()
            .filter(|id| {
                let Some(facets) = self.facets_by_sku.get(*id) else {
                    return false;
                };
                facet_filters.iter().all(|(key, values)| {
                    facets
                        .iter()
                        .any(|f| &f.standard_key == key && values.contains(&f.facet_value))
                })
            })
            .cloned()
            .collect();
        Ok(keep)
    }

    async fn facets_for_skus(
        &self,
        sku_ids: &[String],
        only_active_keys: bool,
    ) -> Result<Vec<Facet>, EngineError> {
        let mut counts: HashMap<(String, String), Facet> = HashMap::new();
        for id in sku_ids {
            let Some(facets) = self.facets_by_sku.get(id) else {
                continue;
            };
            for facet in facets {
                if only_active_keys && facet.standard_key == "internal_note" {
                    continue;
                }
                counts
                    .entry((facet.standard_key.clone(), facet.facet_value.clone()))
                    .and_modify(|existing| existing.count += 1)
                    .or_insert_with(|| facet.clone());
            }
        }
        Ok(counts.into_values().collect())
    }
}
