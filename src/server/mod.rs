//! HTTP surface: `/search`, `/facets`, `/health`, and `/metrics`.

pub mod metrics;
pub mod routes;
pub mod state;

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::ServerState;

/// Binds and serves the main application router and a metrics-only router
/// concurrently until either fails.
pub async fn run_server(state: ServerState, bind_address: &str, metrics_port: u16) -> Result<()> {
    metrics::init_metrics();

    let app = routes::make_search_routes(state).layer(TraceLayer::new_for_http());
    let metrics_app = Router::new().route("/metrics", get(metrics::metrics_handler));

    let main_listener = tokio::net::TcpListener::bind(bind_address).await?;
    let metrics_addr: SocketAddr = format!("0.0.0.0:{metrics_port}").parse()?;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;

    info!(%bind_address, %metrics_port, "starting HTTP server");

    tokio::select! {
        result = axum::serve(main_listener, app.into_make_service()) => {
            result?;
        }
        result = axum::serve(metrics_listener, metrics_app) => {
            result?;
        }
    }

    Ok(())
}
