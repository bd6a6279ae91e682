//! `POST /v1/search` — fused, hydrated ranked results without bundle
//! assembly.

use axum::{extract::State, Json};
use codeintel_core::model::Intent;
use codeintel_retrieval::{RankedResult, SearchOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchRequest {
    pub query: String,
    pub repo: Option<String>,
    pub language: Option<String>,
    pub force_intent: Option<Intent>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
}

#[cfg_attr(
    feature = "openapi",
    utoipa::path(
        post,
        path = "/v1/search",
        tag = "Search",
        request_body = SearchRequest,
        responses(
            (status = 200, description = "Fused, ranked search results", body = SearchResponse),
            (status = 400, description = "Invalid request", body = ApiError),
        ),
    )
)]
pub async fn search(
    State(retrieval): State<Arc<codeintel_retrieval::HybridRetrieval>>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::missing_field("query"));
    }

    let options = SearchOptions {
        repo: req.repo,
        language: req.language,
        force_intent: req.force_intent,
        limit: req.limit,
    };

    let results = retrieval.search(&req.query, options).await?;
    Ok(Json(SearchResponse { results }))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new().route("/", axum::routing::post(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_rejected_before_retrieval_runs() {
        let req = SearchRequest {
            query: "   ".to_string(),
            repo: None,
            language: None,
            force_intent: None,
            limit: None,
        };
        assert!(req.query.trim().is_empty());
    }
}
