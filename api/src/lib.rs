//! HTTP request/response surface for the hybrid retrieval pipeline.
//!
//! Exposes `search`, `assemble`, `record_outcome`, `health`, and `metrics`
//! as JSON-framed Axum routes over a shared [`state::AppState`].

pub mod embedder;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use embedder::HashingEmbedder;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use state::AppState;

/// Build the full router over the given shared state.
pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router().with_state(state)
}
