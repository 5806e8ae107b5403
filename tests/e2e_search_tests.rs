//! End-to-end tests for the `/search` endpoint.

mod common;

use common::{FakeFacetProvider, TestServer};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;

#[tokio::test]
async fn search_returns_nearest_result_first() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate total"), ("k", "2")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["label"], "Total Advanced");
}

#[tokio::test]
async fn search_empty_query_returns_empty_results_with_error_message() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["results"].as_array().unwrap().is_empty());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn search_non_numeric_k_is_rejected_as_invalid_request() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate"), ("k", "not-a-number")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("numeric"));
}

#[tokio::test]
async fn phonetic_typo_still_ranks_colgate_first() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "kolgate"), ("k", "1")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["brandLabel"], "Colgate");
}

#[tokio::test]
async fn timing_breakdown_is_included_only_when_requested() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let without_timing = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate")])
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(without_timing["timing"].is_null());

    let with_timing = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate"), ("timing", "true")])
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(with_timing["timing"]["total_ms"].is_number());
}

#[tokio::test]
async fn active_facets_query_param_overrides_the_server_default_per_request() {
    let provider: Arc<dyn catalog_search_engine::facets::FacetProvider> =
        Arc::new(FakeFacetProvider::new());
    let server = TestServer::spawn_with_facets(Some(provider)).await;
    let client = reqwest::Client::new();

    let without_override = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate total"), ("k", "4")])
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    let facets = without_override["facets"].as_array().unwrap();
    assert!(
        facets.iter().any(|g| g["standard_key"] == "internal_note"),
        "server default (only_active_facets=false) should include the inactive key"
    );

    let with_override = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate total"), ("k", "4"), ("active_facets", "true")])
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    let facets = with_override["facets"].as_array().unwrap();
    assert!(
        !facets.iter().any(|g| g["standard_key"] == "internal_note"),
        "active_facets=true should filter the inactive key out on a per-request basis"
    );
}

#[tokio::test]
async fn search_without_facet_provider_returns_no_facet_groups() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/search", server.base_url))
        .query(&[("q", "colgate")])
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert!(body["facets"].as_array().unwrap().is_empty());
}
