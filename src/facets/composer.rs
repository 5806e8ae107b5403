//! Facet composer (C6): merges ranked hits with SKU/facet data, applies
//! filters without collapsing the facet display, and orders/counts facets.

use crate::facets::provider::{Facet, FacetFilters, FacetProvider, SkuFact};
use crate::search::Hit;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, serde::Serialize)]
pub struct FacetValue {
    pub facet_value: String,
    pub display_name: String,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FacetGroup {
    pub standard_key: String,
    pub values: Vec<FacetValue>,
}

#[derive(Debug, Clone, serde::Serialize, Default)]
pub struct ComposedResult {
    pub hits: Vec<Hit>,
    pub facets: Vec<FacetGroup>,
}

/// Runs C6 end to end. Any C5/C6 failure is logged and degraded to
/// results-only with empty facets, per the error propagation policy.
pub async fn compose(
    hits: Vec<Hit>,
    facet_filters: &FacetFilters,
    only_active_facets: bool,
    provider: &dyn FacetProvider,
) -> ComposedResult {
    match compose_inner(&hits, facet_filters, only_active_facets, provider).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "facet composition degraded to results-only");
            ComposedResult {
                hits,
                facets: Vec::new(),
            }
        }
    }
}

async fn compose_inner(
    hits: &[Hit],
    facet_filters: &FacetFilters,
    only_active_facets: bool,
    provider: &dyn FacetProvider,
) -> Result<ComposedResult, crate::error::EngineError> {
    let id_carrying = !hits.is_empty() && hits.iter().all(|h| h.brand_sku_id.is_some());

    if id_carrying {
        compose_id_carrying(hits, facet_filters, only_active_facets, provider).await
    } else {
        compose_label_mode(hits, facet_filters, only_active_facets, provider).await
    }
}

async fn compose_id_carrying(
    hits: &[Hit],
    facet_filters: &FacetFilters,
    only_active_facets: bool,
    provider: &dyn FacetProvider,
) -> Result<ComposedResult, crate::error::EngineError> {
    let candidate_ids: Vec<String> = hits.iter().filter_map(|h| h.brand_sku_id.clone()).collect();
    let sku_by_id = provider.resolve_skus_by_id(&candidate_ids).await?;

    let keep_ids = resolve_keep_ids(facet_filters, &candidate_ids, provider).await?;
    let facets = provider
        .facets_for_skus(&candidate_ids, only_active_facets)
        .await?;

    let enhanced_hits = hits
        .iter()
        .filter(|h| {
            facet_filters.is_empty()
                || h.brand_sku_id
                    .as_ref()
                    .map(|id| keep_ids.contains(id))
                    .unwrap_or(false)
        })
        .map(|h| enhance_hit(h, h.brand_sku_id.as_ref().and_then(|id| sku_by_id.get(id))))
        .collect();

    Ok(ComposedResult {
        hits: enhanced_hits,
        facets: order_facets(facets),
    })
}

async fn compose_label_mode(
    hits: &[Hit],
    facet_filters: &FacetFilters,
    only_active_facets: bool,
    provider: &dyn FacetProvider,
) -> Result<ComposedResult, crate::error::EngineError> {
    let labels: Vec<String> = hits.iter().map(|h| h.label.clone()).collect();
    let sku_by_label = provider.resolve_skus_by_label(&labels).await?;

    let candidate_ids: Vec<String> = sku_by_label
        .values()
        .flatten()
        .map(|f| f.brand_sku_id.clone())
        .collect();

    let keep_ids = resolve_keep_ids(facet_filters, &candidate_ids, provider).await?;
    let facets = provider
        .facets_for_skus(&candidate_ids, only_active_facets)
        .await?;

    let enhanced_hits = hits
        .iter()
        .filter(|h| {
            if facet_filters.is_empty() {
                return true;
            }
            sku_by_label
                .get(&h.label)
                .map(|facts| facts.iter().any(|f| keep_ids.contains(&f.brand_sku_id)))
                .unwrap_or(false)
        })
        .map(|h| {
            let fact = sku_by_label.get(&h.label).and_then(|facts| {
                if facet_filters.is_empty() {
                    facts.first()
                } else {
                    facts
                        .iter()
                        .find(|f| keep_ids.contains(&f.brand_sku_id))
                        .or_else(|| facts.first())
                }
            });
            enhance_hit(h, fact)
        })
        .collect();

    Ok(ComposedResult {
        hits: enhanced_hits,
        facets: order_facets(facets),
    })
}

async fn resolve_keep_ids(
    facet_filters: &FacetFilters,
    candidate_ids: &[String],
    provider: &dyn FacetProvider,
) -> Result<HashSet<String>, crate::error::EngineError> {
    if facet_filters.is_empty() {
        return Ok(candidate_ids.iter().cloned().collect());
    }
    provider.matching_skus(facet_filters, candidate_ids).await
}

fn enhance_hit(hit: &Hit, fact: Option<&SkuFact>) -> Hit {
    let mut enhanced = hit.clone();
    if let Some(fact) = fact {
        enhanced.brand_sku_id = Some(fact.brand_sku_id.clone());
        enhanced.brand_sku_label = Some(fact.brand_sku_label.clone());
        enhanced.brand_name = Some(fact.brand_name.clone());
        enhanced.brand_id = Some(fact.brand_id.clone());
    }
    enhanced
}

/// Orders facet groups: `price_range` first if present, then other keys by
/// descending summed count. Within a group, values sort by descending count,
/// except `price_range`, which sorts by ascending `min_price`.
///
/// Exposed at crate visibility so the standalone `/facets` endpoint can order
/// a raw facet list without going through the full hit-composition pipeline.
pub(crate) fn order_facets(facets: Vec<Facet>) -> Vec<FacetGroup> {
    let mut grouped: HashMap<String, Vec<Facet>> = HashMap::new();
    let mut key_order: Vec<String> = Vec::new();
    for facet in facets {
        if !grouped.contains_key(&facet.standard_key) {
            key_order.push(facet.standard_key.clone());
        }
        grouped.entry(facet.standard_key.clone()).or_default().push(facet);
    }

    let mut keys: Vec<String> = key_order;
    keys.sort_by(|a, b| {
        if a == "price_range" {
            return std::cmp::Ordering::Less;
        }
        if b == "price_range" {
            return std::cmp::Ordering::Greater;
        }
        let count_a: i64 = grouped[a].iter().map(|f| f.count).sum();
        let count_b: i64 = grouped[b].iter().map(|f| f.count).sum();
        count_b.cmp(&count_a).then_with(|| a.cmp(b))
    });

    keys.into_iter()
        .map(|key| {
            let mut values = grouped.remove(&key).unwrap_or_default();
            if key == "price_range" {
                values.sort_by(|a, b| {
                    a.min_price
                        .unwrap_or(0.0)
                        .total_cmp(&b.min_price.unwrap_or(0.0))
                });
            } else {
                values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.facet_value.cmp(&b.facet_value)));
            }
            FacetGroup {
                standard_key: key,
                values: values
                    .into_iter()
                    .map(|f| FacetValue {
                        facet_value: f.facet_value,
                        display_name: f.display_name,
                        count: f.count,
                        min_price: f.min_price,
                        max_price: f.max_price,
                    })
                    .collect(),
            }
        })
        .collect()
}
