//! `POST /v1/outcomes` — fire-and-forget intake for a retrieval outcome
//! signal, feeding the learning cache.

use axum::{extract::State, Json};
use codeintel_learning::{LearningBridge, OutcomeSignal};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AckResponse {
    pub accepted: bool,
    pub pending: usize,
}

#[cfg_attr(
    feature = "openapi",
    utoipa::path(
        post,
        path = "/v1/outcomes",
        tag = "Outcomes",
        request_body = OutcomeSignal,
        responses((status = 200, description = "Signal accepted", body = AckResponse)),
    )
)]
pub async fn record_outcome(
    State(learning): State<Arc<LearningBridge>>,
    Json(signal): Json<OutcomeSignal>,
) -> ApiResult<Json<AckResponse>> {
    learning.record_outcome(signal).await;
    let pending = learning.pending_len().await;
    Ok(Json(AckResponse {
        accepted: true,
        pending,
    }))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new().route("/", axum::routing::post(record_outcome))
}
