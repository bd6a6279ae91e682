//! Route composition: mounts each endpoint's router under its path prefix.

pub mod assemble;
pub mod health;
pub mod metrics;
pub mod record_outcome;
pub mod search;

use crate::state::AppState;

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new()
        .nest("/v1/search", search::create_router())
        .nest("/v1/assemble", assemble::create_router())
        .nest("/v1/outcomes", record_outcome::create_router())
        .nest("/health", health::create_router())
        .nest("/metrics", metrics::create_router())
}
