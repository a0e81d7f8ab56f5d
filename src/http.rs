//! Health and debug HTTP surface, served alongside the OTLP gRPC listener.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::metrics::Metrics;

pub async fn run_http_server(metrics: Arc<Metrics>, bind: &str) -> anyhow::Result<()> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/debug/metrics", get(metrics_handler))
        .layer(cors)
        .with_state(metrics);

    info!("HTTP server listening on {}", bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    use axum::http::{header, StatusCode};
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], metrics.snapshot_json().to_string())
}
