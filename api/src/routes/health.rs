//! `GET /health` — cache, circuit breaker, and storage liveness, rolled up
//! into one overall status.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use codeintel_core::health::{HealthCheck, HealthStatus};
use codeintel_reliability::CircuitState;
use codeintel_retrieval::HybridRetrieval;
use codeintel_storage::{CacheFabric, CacheNamespace, StorageFacade};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub cache: Vec<HealthCheck>,
    pub circuits: Vec<HealthCheck>,
    pub storage: HealthCheck,
    pub uptime_secs: u64,
}

fn worst(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
    statuses
        .into_iter()
        .max_by_key(|s| match s {
            HealthStatus::Healthy => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::Degraded => 2,
            HealthStatus::Unhealthy => 3,
        })
        .unwrap_or(HealthStatus::Unknown)
}

async fn cache_check(cache: &dyn CacheFabric, namespace: CacheNamespace) -> HealthCheck {
    let component = format!("cache.{}", namespace.as_str());
    match cache.stats(namespace).await {
        Ok(stats) => {
            let sampled = stats.hits + stats.misses >= 20;
            if sampled && stats.hit_rate() < 0.3 {
                HealthCheck::degraded(component, "hit rate below 0.3")
                    .with_metadata("hit_rate", stats.hit_rate().into())
            } else if stats.eviction_rate() > 0.1 {
                HealthCheck::degraded(component, "eviction rate above 0.1")
                    .with_metadata("eviction_rate", stats.eviction_rate().into())
            } else {
                HealthCheck::healthy(component).with_metadata("entry_count", stats.entry_count.into())
            }
        }
        Err(err) => HealthCheck::unhealthy(component, err.to_string()),
    }
}

fn circuit_check(component: &str, state: CircuitState) -> HealthCheck {
    match state {
        CircuitState::Closed => HealthCheck::healthy(component),
        CircuitState::HalfOpen => HealthCheck::degraded(component, "circuit half-open, probing recovery"),
        CircuitState::Open => HealthCheck::unhealthy(component, "circuit open"),
    }
}

async fn storage_check(storage: &dyn StorageFacade) -> HealthCheck {
    let started = Instant::now();
    let result = storage.get_file("__health__", "__health__").await;
    let elapsed_ms = started.elapsed().as_millis() as i64;
    match result {
        Ok(_) => HealthCheck::healthy("storage").with_response_time(elapsed_ms),
        Err(err) => HealthCheck::unhealthy("storage", err.to_string()).with_response_time(elapsed_ms),
    }
}

#[cfg_attr(
    feature = "openapi",
    utoipa::path(
        get,
        path = "/health",
        tag = "Health",
        responses((status = 200, description = "Component health rollup", body = HealthResponse)),
    )
)]
pub async fn health(
    State(retrieval): State<Arc<HybridRetrieval>>,
    State(cache): State<Arc<dyn CacheFabric>>,
    State(storage): State<Arc<dyn StorageFacade>>,
    State(start_time): State<Instant>,
) -> Json<HealthResponse> {
    let mut cache_checks = Vec::with_capacity(CacheNamespace::ALL.len());
    for namespace in CacheNamespace::ALL {
        cache_checks.push(cache_check(cache.as_ref(), namespace).await);
    }

    let reliability = retrieval.reliability();
    let circuits = vec![
        circuit_check("circuit.search", reliability.search.breaker().state()),
        circuit_check("circuit.graph", reliability.graph.breaker().state()),
        circuit_check("circuit.cache", reliability.cache.breaker().state()),
        circuit_check("circuit.storage", reliability.storage.breaker().state()),
    ];

    let storage_health = storage_check(storage.as_ref()).await;

    let status = worst(
        cache_checks
            .iter()
            .chain(circuits.iter())
            .chain(std::iter::once(&storage_health))
            .map(|check| check.status.clone()),
    );

    Json(HealthResponse {
        status,
        cache: cache_checks,
        circuits,
        storage: storage_health,
        uptime_secs: start_time.elapsed().as_secs(),
    })
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new().route("/", axum::routing::get(health))
}
