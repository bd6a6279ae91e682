//! OpenAPI document generation, gated behind the `openapi` feature.

#[cfg(feature = "openapi")]
mod doc {
    use crate::error::{ApiError, ErrorCode};
    use crate::routes::assemble::AssembleRequest;
    use crate::routes::health::HealthResponse;
    use crate::routes::record_outcome::AckResponse;
    use crate::routes::search::{SearchRequest, SearchResponse};
    use utoipa::OpenApi;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::routes::search::search,
            crate::routes::assemble::assemble,
            crate::routes::record_outcome::record_outcome,
            crate::routes::health::health,
        ),
        components(schemas(
            SearchRequest,
            SearchResponse,
            AssembleRequest,
            codeintel_core::model::Bundle,
            codeintel_learning::OutcomeSignal,
            AckResponse,
            HealthResponse,
            ApiError,
            ErrorCode,
        )),
        tags(
            (name = "Search", description = "Fused ranked search"),
            (name = "Assemble", description = "Token-budgeted bundle assembly"),
            (name = "Outcomes", description = "Outcome signal intake"),
            (name = "Health", description = "Component health rollup"),
        )
    )]
    pub struct ApiDoc;
}

#[cfg(feature = "openapi")]
pub use doc::ApiDoc;
