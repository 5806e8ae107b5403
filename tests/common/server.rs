//! Test server lifecycle management.
//!
//! Spawns the real search router against an in-memory catalogue and a fake
//! embedding HTTP server, so tests exercise the full HTTP surface without any
//! live network or database dependency.

use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use catalog_search_engine::config::{AppConfig, CliConfig, EmbeddingSettings, SearchSettings};
use catalog_search_engine::embedding::{EmbeddingClient, EmbeddingClientConfig};
use catalog_search_engine::facets::FacetProvider;
use catalog_search_engine::search::HybridSearchEngine;
use catalog_search_engine::server::{routes::make_search_routes, ServerState};

use super::fixtures::sample_catalog;

#[derive(Deserialize)]
struct EmbedRequest {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Serialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Maps known query texts to the exact vectors planted by [`sample_catalog`],
/// with a stable fallback for anything else, so search ordering is deterministic.
fn fake_embed(text: &str) -> Vec<f32> {
    match text.to_lowercase().as_str() {
        "colgate" | "colgate total" | "total advanced" => vec![1.0, 0.0],
        "pepsodent" | "complete care" => vec![0.0, 1.0],
        "ultra clean" => vec![0.9, 0.1],
        "closeup" | "fresh mint" => vec![-1.0, 0.0],
        "kolgate" => vec![0.95, 0.05],
        other => {
            let sum: u32 = other.bytes().map(u32::from).sum();
            vec![(sum % 7) as f32 - 3.0, ((sum / 7) % 5) as f32 - 2.0]
        }
    }
}

async fn embed_handler(Json(body): Json<EmbedRequest>) -> Json<EmbedResponse> {
    let text = body.input.or(body.prompt).unwrap_or_default();
    Json(EmbedResponse { embedding: fake_embed(&text) })
}

/// A minimal embedding service double, listening on a random local port.
pub struct FakeEmbeddingServer {
    pub base_url: String,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeEmbeddingServer {
    pub async fn spawn() -> Self {
        let app = Router::new().route("/api/embeddings", post(embed_handler));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake embedding server");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("fake embedding server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            _shutdown_tx: Some(shutdown_tx),
        }
    }
}

impl Drop for FakeEmbeddingServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Test server instance wired to an in-memory catalogue.
///
/// When dropped, both the app server and the fake embedding server shut down.
pub struct TestServer {
    pub base_url: String,
    _embedding_server: FakeEmbeddingServer,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with the facet provider disabled.
    pub async fn spawn() -> Self {
        Self::spawn_with_facets(None).await
    }

    /// Spawns a server, optionally wired to a facet provider.
    pub async fn spawn_with_facets(facet_provider: Option<Arc<dyn FacetProvider>>) -> Self {
        let embedding_server = FakeEmbeddingServer::spawn().await;

        let (index, lookup) = sample_catalog();
        let engine = Arc::new(HybridSearchEngine::new(index, lookup).expect("build engine"));

        let embedding_client = Arc::new(
            EmbeddingClient::new(EmbeddingClientConfig {
                base_url: embedding_server.base_url.clone(),
                model: "fake-embed".to_string(),
                timeout: Duration::from_secs(5),
            })
            .expect("build embedding client"),
        );

        let cli = CliConfig::default();
        let config = Arc::new(AppConfig {
            bind_address: cli.bind_address.clone(),
            metrics_port: cli.metrics_port,
            artifact_dir: cli.artifact_dir.clone(),
            relational_dsn: None,
            worker_count: cli.worker_count,
            embedding: EmbeddingSettings {
                base_url: embedding_server.base_url.clone(),
                model: "fake-embed".to_string(),
                timeout_seconds: 5.0,
            },
            search: SearchSettings::default(),
        });

        let state = ServerState {
            config,
            engine,
            embedding_client,
            facet_provider,
            start_time: Instant::now(),
        };

        let app = make_search_routes(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("test server failed");
        });

        let server = Self {
            base_url,
            _embedding_server: embedding_server,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .expect("build reqwest client");

        let start = Instant::now();
        loop {
            if start.elapsed() > Duration::from_secs(5) {
                panic!("test server did not become ready in time");
            }
            if client.get(format!("{}/health", self.base_url)).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
