//! `POST /v1/assemble` — full pipeline: search, fuse, expand the
//! reference graph, and pack a token-budgeted bundle.

use axum::{extract::State, Json};
use codeintel_core::model::{Bundle, Intent};
use codeintel_retrieval::AssembleOptions;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssembleRequest {
    pub query: String,
    pub repo: Option<String>,
    pub language: Option<String>,
    pub force_intent: Option<Intent>,
    pub budget_tokens: Option<i64>,
    pub limit: Option<usize>,
}

#[cfg_attr(
    feature = "openapi",
    utoipa::path(
        post,
        path = "/v1/assemble",
        tag = "Assemble",
        request_body = AssembleRequest,
        responses(
            (status = 200, description = "Assembled context bundle", body = Bundle),
            (status = 400, description = "Invalid request", body = ApiError),
        ),
    )
)]
pub async fn assemble(
    State(retrieval): State<Arc<codeintel_retrieval::HybridRetrieval>>,
    Json(req): Json<AssembleRequest>,
) -> ApiResult<Json<Bundle>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::missing_field("query"));
    }

    let options = AssembleOptions {
        repo: req.repo,
        language: req.language,
        force_intent: req.force_intent,
        budget_tokens: req.budget_tokens,
        limit: req.limit,
    };

    let bundle = retrieval.assemble(&req.query, options).await?;
    Ok(Json(bundle))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new().route("/", axum::routing::post(assemble))
}
