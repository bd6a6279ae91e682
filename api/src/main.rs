//! Server entry point: bootstraps configuration, an in-memory storage and
//! cache backend, and the outcome-learning bridge, then starts the Axum
//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use codeintel_api::state::AppState;
use codeintel_api::{ApiError, ApiResult, HashingEmbedder};
use codeintel_core::config::CodeIntelConfig;
use codeintel_learning::LearningBridge;
use codeintel_retrieval::HybridRetrieval;
use codeintel_storage::{CacheFabric, InMemoryCacheFabric, InMemoryStorage, StorageFacade};

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt::init();

    let config = CodeIntelConfig::from_env();
    config
        .validate()
        .map_err(|e| ApiError::internal_error(format!("invalid configuration: {e}")))?;

    let storage: Arc<dyn StorageFacade> = Arc::new(InMemoryStorage::new());
    let cache: Arc<dyn CacheFabric> = Arc::new(InMemoryCacheFabric::new(&config.cache));
    let embedder = Arc::new(HashingEmbedder::default());

    let retrieval = Arc::new(HybridRetrieval::new(
        storage.clone(),
        cache.clone(),
        embedder,
        config.clone(),
    ));
    let learning = Arc::new(LearningBridge::new(cache.clone(), config.learning.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let drain_task = tokio::spawn(learning.clone().run(shutdown_rx));

    let state = AppState {
        retrieval,
        learning,
        storage,
        cache,
        config: Arc::new(config),
        start_time: Instant::now(),
    };

    let app: Router = codeintel_api::create_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "starting codeintel API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(());
    let _ = drain_task.await;

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("CODEINTEL_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("CODEINTEL_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("invalid port value: {port_str}")))?;

    let addr = format!("{host}:{port}");
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("invalid bind address {addr}: {e}")))
}
