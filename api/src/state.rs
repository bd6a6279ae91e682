//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use codeintel_core::config::CodeIntelConfig;
use codeintel_learning::LearningBridge;
use codeintel_retrieval::HybridRetrieval;
use codeintel_storage::{CacheFabric, StorageFacade};

/// Application-wide state shared across all routes.
///
/// `storage` and `cache` are held here in addition to inside `retrieval` so
/// the health endpoint can probe them directly without routing a liveness
/// check through the full search/assemble pipeline. Circuit breaker state
/// is read through `retrieval.reliability()` instead of a second copy, so
/// there is exactly one envelope driven by real traffic.
#[derive(Clone)]
pub struct AppState {
    pub retrieval: Arc<HybridRetrieval>,
    pub learning: Arc<LearningBridge>,
    pub storage: Arc<dyn StorageFacade>,
    pub cache: Arc<dyn CacheFabric>,
    pub config: Arc<CodeIntelConfig>,
    pub start_time: Instant,
}

impl FromRef<AppState> for Arc<HybridRetrieval> {
    fn from_ref(state: &AppState) -> Self {
        state.retrieval.clone()
    }
}

impl FromRef<AppState> for Arc<LearningBridge> {
    fn from_ref(state: &AppState) -> Self {
        state.learning.clone()
    }
}

impl FromRef<AppState> for Arc<dyn CacheFabric> {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for Arc<dyn StorageFacade> {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}

impl FromRef<AppState> for Arc<CodeIntelConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Instant {
    fn from_ref(state: &AppState) -> Self {
        state.start_time
    }
}
