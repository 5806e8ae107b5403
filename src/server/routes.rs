//! HTTP handlers for `/search`, `/facets`, and `/health`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

use super::metrics::{EMBEDDING_FAILURES_TOTAL, FACETS_REQUESTS_TOTAL, FACET_DEGRADATIONS_TOTAL, SEARCH_DURATION_SECONDS, SEARCH_REQUESTS_TOTAL};
use super::state::ServerState;
use crate::error::EngineError;
use crate::facets::{self, FacetFilters, FacetGroup};
use crate::search::{Hit, HybridQuery, SearchTiming};

pub fn make_search_routes(state: ServerState) -> Router {
    Router::new()
        .route("/search", get(search_handler))
        .route("/facets", get(facets_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SearchResponseBody {
    results: Vec<Hit>,
    facets: Vec<FacetGroup>,
    total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    timing: Option<SearchTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SearchResponseBody {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            facets: Vec::new(),
            total_results: 0,
            timing: None,
            error: Some(message.into()),
        }
    }
}

fn parse_search_params(
    pairs: &[(String, String)],
    default_only_active_facets: bool,
) -> (String, Option<String>, bool, bool, FacetFilters) {
    let mut query_text = String::new();
    let mut k_raw = None;
    let mut with_timing = false;
    let mut only_active_facets = default_only_active_facets;
    let mut facet_filters: FacetFilters = HashMap::new();

    for (key, value) in pairs {
        match key.as_str() {
            "q" => query_text = value.clone(),
            "k" => k_raw = Some(value.clone()),
            "timing" => with_timing = value == "true" || value == "1",
            "active_facets" => only_active_facets = value == "true" || value == "1",
            _ if key.starts_with("facet_") => {
                let facet_key = key["facet_".len()..].to_string();
                facet_filters.entry(facet_key).or_default().push(value.clone());
            }
            _ => {}
        }
    }

    (query_text, k_raw, with_timing, only_active_facets, facet_filters)
}

async fn search_handler(
    State(state): State<ServerState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let start = Instant::now();
    let (query_text, k_raw, with_timing, only_active_facets, facet_filters) =
        parse_search_params(&pairs, state.config.search.only_active_facets);

    if query_text.trim().is_empty() {
        SEARCH_REQUESTS_TOTAL.with_label_values(&["invalid"]).inc();
        return (
            StatusCode::OK,
            Json(SearchResponseBody::invalid("No search query provided")),
        );
    }

    let k = match k_raw {
        Some(raw) => match raw.parse::<usize>() {
            Ok(k) => k,
            Err(_) => {
                SEARCH_REQUESTS_TOTAL.with_label_values(&["invalid"]).inc();
                return (
                    StatusCode::OK,
                    Json(SearchResponseBody::invalid(format!("k must be numeric, got {raw:?}"))),
                );
            }
        },
        None => state.config.search.default_k,
    };

    let query = HybridQuery {
        query_text,
        k,
        phonetic_boost: state.config.search.phonetic_boost,
        candidate_pool: state.config.search.candidate_pool,
    };

    let (hits, timing) = match state.engine.search(&state.embedding_client, &query, with_timing).await {
        Ok(result) => result,
        Err(e) => {
            EMBEDDING_FAILURES_TOTAL.inc();
            SEARCH_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            tracing::warn!(error = %e, "search request failed");
            let status = match e {
                EngineError::InvalidRequest(_) => StatusCode::OK,
                _ => StatusCode::BAD_GATEWAY,
            };
            return (status, Json(SearchResponseBody::invalid(e.to_string())));
        }
    };

    let composed = if let Some(provider) = &state.facet_provider {
        facets::compose(hits, &facet_filters, only_active_facets, provider.as_ref()).await
    } else {
        facets::ComposedResult { hits, facets: Vec::new() }
    };

    if state.facet_provider.is_some() && composed.facets.is_empty() && !facet_filters.is_empty() {
        FACET_DEGRADATIONS_TOTAL.inc();
    }

    SEARCH_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
    SEARCH_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());

    (
        StatusCode::OK,
        Json(SearchResponseBody {
            total_results: composed.hits.len(),
            results: composed.hits,
            facets: composed.facets,
            timing,
            error: None,
        }),
    )
}

#[derive(Debug, Serialize)]
struct FacetsResponseBody {
    facets: Vec<FacetGroup>,
    facets_complete: bool,
}

async fn facets_handler(
    State(state): State<ServerState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let mut sku_ids: Vec<String> = Vec::new();
    let mut only_active_facets = state.config.search.only_active_facets;
    let mut facet_filters: FacetFilters = HashMap::new();

    for (key, value) in &pairs {
        match key.as_str() {
            "brand_sku_ids" => sku_ids.extend(value.split(',').filter(|s| !s.is_empty()).map(str::to_string)),
            "active_facets" => only_active_facets = value == "true" || value == "1",
            _ if key.starts_with("facet_") => {
                let facet_key = key["facet_".len()..].to_string();
                facet_filters.entry(facet_key).or_default().push(value.clone());
            }
            _ => {}
        }
    }

    let Some(provider) = &state.facet_provider else {
        FACETS_REQUESTS_TOTAL.with_label_values(&["unavailable"]).inc();
        return (
            StatusCode::OK,
            Json(FacetsResponseBody { facets: Vec::new(), facets_complete: false }),
        );
    };

    let narrowed = if facet_filters.is_empty() {
        Ok(sku_ids.clone())
    } else {
        provider
            .matching_skus(&facet_filters, &sku_ids)
            .await
            .map(|keep| sku_ids.iter().filter(|id| keep.contains(*id)).cloned().collect())
    };

    let narrowed = match narrowed {
        Ok(ids) => ids,
        Err(e) => {
            FACET_DEGRADATIONS_TOTAL.inc();
            FACETS_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            tracing::warn!(error = %e, "facets request degraded while applying filters");
            return (
                StatusCode::OK,
                Json(FacetsResponseBody { facets: Vec::new(), facets_complete: false }),
            );
        }
    };

    match provider.facets_for_skus(&narrowed, only_active_facets).await {
        Ok(raw_facets) => {
            FACETS_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
            (
                StatusCode::OK,
                Json(FacetsResponseBody {
                    facets: facets::order_facets(raw_facets),
                    facets_complete: true,
                }),
            )
        }
        Err(e) => {
            FACET_DEGRADATIONS_TOTAL.inc();
            FACETS_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            tracing::warn!(error = %e, "facets request degraded");
            (
                StatusCode::OK,
                Json(FacetsResponseBody { facets: Vec::new(), facets_complete: false }),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponseBody {
    status: &'static str,
    uptime_seconds: u64,
    num_items: usize,
    embedding_dim: usize,
    model: String,
    facets_enabled: bool,
}

async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HealthResponseBody {
        status: "ok",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        num_items: state.engine.lookup().len(),
        embedding_dim: state.embedding_client.dimension().unwrap_or(0),
        model: state.embedding_client.model().to_string(),
        facets_enabled: state.facet_provider.is_some(),
    })
}
