//! HTTP/WebSocket surface (§6 "HTTP API surface"): health, metrics, feed and
//! job read models, and the price-push WebSocket. Built with axum +
//! tower-http CORS.

pub mod http;
pub mod ws;

use crate::feed_registry::FeedRegistry;
use crate::metrics::Metrics;
use oracle_store::JobPersistence;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub feeds: FeedRegistry,
    pub metrics: Arc<Metrics>,
    pub persistence: JobPersistence,
    pub ws: ws::WsHub,
    pub api_keys: Arc<Vec<String>>,
}

pub fn build_router(state: AppState) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::OPTIONS])
        .allow_headers(Any);

    axum::Router::new()
        .route("/health", axum::routing::get(http::health))
        .route("/metrics", axum::routing::get(http::metrics_json))
        .route("/metrics/prometheus", axum::routing::get(http::metrics_prometheus))
        .route("/api/feeds", axum::routing::get(http::feeds))
        .route("/api/jobs", axum::routing::get(http::jobs))
        .route("/api/proposals", axum::routing::get(http::proposals))
        .route("/api/stats", axum::routing::get(http::metrics_json))
        .route("/ws/v1/prices", axum::routing::get(ws::ws_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(router: axum::Router, port: u16) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "HTTP/WS server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
