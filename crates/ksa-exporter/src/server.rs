//! HTTP endpoint serving the session gauge

use std::io;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::metrics::SessionGauge;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Router exposing `GET /metrics`
pub fn router(gauge: Arc<SessionGauge>) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .with_state(gauge)
}

/// Serve the metrics endpoint on `listener` until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    gauge: Arc<SessionGauge>,
    cancel: CancellationToken,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Serving metrics on http://{}/metrics", addr);
    }

    axum::serve(listener, router(gauge))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn handle_metrics(State(gauge): State<Arc<SessionGauge>>) -> Response {
    match gauge.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Metrics encoding failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
