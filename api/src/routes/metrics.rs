//! `GET /metrics` — Prometheus text exposition of every registered gauge,
//! counter, and histogram.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn metrics() -> Response {
    match codeintel_telemetry::render() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new().route("/", axum::routing::get(metrics))
}
