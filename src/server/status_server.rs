// src/server/status_server.rs

use crate::core::handler::Handler;
use crate::core::metrics::gather_metrics;
use crate::core::status::{StatusFormat, render_status};
use anyhow::{Context, Result};
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use std::sync::Arc;
use tracing::{error, info};

async fn status_text(State(handler): State<Arc<Handler>>) -> impl IntoResponse {
    let body = render_status(&handler, StatusFormat::Text);
    (StatusCode::OK, [("content-type", "text/plain")], body)
}

async fn status_html(State(handler): State<Arc<Handler>>) -> impl IntoResponse {
    let body = render_status(&handler, StatusFormat::Html);
    (StatusCode::OK, [("content-type", "text/html")], body)
}

async fn metrics_handler() -> impl IntoResponse {
    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Serves `/status`, `/status.html`, and `/metrics` on `bind_addr` until the
/// process receives ctrl-c. Returns once the listener shuts down.
pub async fn run(bind_addr: &str, handler: Arc<Handler>) -> Result<()> {
    let app = Router::new()
        .route("/status", get(status_text))
        .route("/status.html", get(status_html))
        .route("/metrics", get(metrics_handler))
        .with_state(handler);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid status bind address '{bind_addr}'"))?;

    info!("status/metrics server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server on {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to install ctrl-c handler: {e}");
            }
            info!("status/metrics server shutting down");
        })
        .await
        .context("status/metrics server error")?;

    Ok(())
}
