//! The outcome/learning bridge: a fire-and-forget intake for per-session
//! retrieval outcomes, and the query-fingerprint learning cache those
//! outcomes feed.
//!
//! Recording a signal never blocks a caller: it only appends to a bounded,
//! drop-oldest queue. A background task drains the queue and, for
//! confidently satisfied outcomes, writes a `query_fingerprint ->
//! bundle_signature` hint into the cache fabric's `metadata` namespace.
//! Retrieval can consult that hint before running the full pipeline.

use codeintel_core::config::LearningConfig;
use codeintel_core::identity::{BundleSignature, CacheKey, QueryFingerprint};
use codeintel_core::model::Intent;
use codeintel_storage::{CacheFabric, CacheNamespace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::warn;

/// A caller-reported outcome for one retrieved bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OutcomeSignal {
    pub session_id: String,
    pub query: String,
    pub intent: Intent,
    pub bundle_signature: BundleSignature,
    pub satisfied: bool,
    /// The reporter's confidence in `satisfied`, in `[0, 1]`.
    pub confidence: f32,
    pub time_to_fix_ms: Option<u64>,
    pub top_click_id: Option<String>,
    pub token_usage: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LearningHint {
    bundle_signature: BundleSignature,
    satisfied: bool,
}

fn fingerprint_for(query: &str, intent: Intent) -> QueryFingerprint {
    QueryFingerprint::from_fields(&[("query", query.into()), ("intent", intent.as_db_str().into())])
}

fn cache_key_for(fingerprint: QueryFingerprint) -> CacheKey {
    CacheKey::from_fields(&[("learning_fingerprint", fingerprint.to_string().into())])
}

/// Intake queue plus learning-cache bridge. Cheap to clone: the queue and
/// cache handle are both shared.
pub struct LearningBridge {
    queue: Mutex<VecDeque<OutcomeSignal>>,
    notify: Notify,
    capacity: usize,
    cache: Arc<dyn CacheFabric>,
    config: LearningConfig,
}

impl LearningBridge {
    pub fn new(cache: Arc<dyn CacheFabric>, config: LearningConfig) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
            notify: Notify::new(),
            capacity: config.queue_capacity,
            cache,
            config,
        }
    }

    /// Enqueue an outcome signal. Never blocks on I/O; if the queue is at
    /// capacity, the oldest pending signal is dropped to make room.
    pub async fn record_outcome(&self, outcome: OutcomeSignal) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            if queue.pop_front().is_some() {
                warn!("learning signal queue at capacity, dropped oldest pending signal");
            }
        }
        queue.push_back(outcome);
        drop(queue);
        self.notify.notify_one();
    }

    /// Drain and process every currently queued signal. Intended to be
    /// driven by a background task calling this in a loop after waiting on
    /// `notified`, but safe to call directly (e.g. in tests or a manual
    /// flush before shutdown).
    pub async fn drain_once(&self) {
        let drained: Vec<OutcomeSignal> = {
            let mut queue = self.queue.lock().await;
            queue.drain(..).collect()
        };
        for outcome in drained {
            self.process_one(outcome).await;
        }
    }

    /// Run the background drain loop until `shutdown` resolves. Intended
    /// to be spawned once alongside the bridge's construction.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = self.notify.notified() => self.drain_once().await,
                _ = &mut shutdown => {
                    self.drain_once().await;
                    return;
                }
            }
        }
    }

    async fn process_one(&self, outcome: OutcomeSignal) {
        if !outcome.satisfied || outcome.confidence < self.config.satisfaction_confidence_floor {
            return;
        }

        let fingerprint = fingerprint_for(&outcome.query, outcome.intent);
        let key = cache_key_for(fingerprint);
        let hint = LearningHint {
            bundle_signature: outcome.bundle_signature,
            satisfied: outcome.satisfied,
        };

        let Ok(value) = serde_json::to_value(&hint) else {
            warn!(session_id = %outcome.session_id, "failed to serialize learning hint");
            return;
        };

        if let Err(err) = self
            .cache
            .set(
                CacheNamespace::Metadata,
                key,
                value,
                Some(self.config.learning_cache_ttl_secs),
            )
            .await
        {
            warn!(session_id = %outcome.session_id, error = %err, "failed to write learning cache hint");
        }
    }

    /// Best-effort pre-retrieval consult: does this query/intent pair have
    /// a previously satisfied bundle? Returns `None` on any cache miss,
    /// parse failure, or backend error — callers should fall through to a
    /// full retrieval rather than treat this as authoritative.
    pub async fn consult(&self, query: &str, intent: Intent) -> Option<BundleSignature> {
        let fingerprint = fingerprint_for(query, intent);
        let key = cache_key_for(fingerprint);
        match self.cache.get_raw(CacheNamespace::Metadata, key).await {
            Ok(Some(value)) => serde_json::from_value::<LearningHint>(value)
                .ok()
                .filter(|hint| hint.satisfied)
                .map(|hint| hint.bundle_signature),
            _ => None,
        }
    }

    /// Number of signals currently queued, awaiting a drain.
    pub async fn pending_len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_storage::InMemoryCacheFabric;

    fn bridge() -> LearningBridge {
        let cache: Arc<dyn CacheFabric> = Arc::new(InMemoryCacheFabric::new(&Default::default()));
        LearningBridge::new(cache, LearningConfig::default())
    }

    fn outcome(query: &str, satisfied: bool, confidence: f32) -> OutcomeSignal {
        OutcomeSignal {
            session_id: "sess-1".to_string(),
            query: query.to_string(),
            intent: Intent::Symbol,
            bundle_signature: BundleSignature::from_fields(&[("query", query.into())]),
            satisfied,
            confidence,
            time_to_fix_ms: Some(1_200),
            top_click_id: None,
            token_usage: Some(500),
        }
    }

    #[tokio::test]
    async fn recording_does_not_populate_cache_until_drained() {
        let bridge = bridge();
        bridge.record_outcome(outcome("find handler", true, 0.9)).await;
        assert_eq!(bridge.pending_len().await, 1);
        assert!(bridge.consult("find handler", Intent::Symbol).await.is_none());
    }

    #[tokio::test]
    async fn draining_a_confident_satisfied_signal_populates_the_learning_cache() {
        let bridge = bridge();
        bridge.record_outcome(outcome("find handler", true, 0.9)).await;
        bridge.drain_once().await;
        assert_eq!(bridge.pending_len().await, 0);
        assert!(bridge.consult("find handler", Intent::Symbol).await.is_some());
    }

    #[tokio::test]
    async fn low_confidence_signals_are_not_cached() {
        let bridge = bridge();
        bridge.record_outcome(outcome("find handler", true, 0.05)).await;
        bridge.drain_once().await;
        assert!(bridge.consult("find handler", Intent::Symbol).await.is_none());
    }

    #[tokio::test]
    async fn unsatisfied_signals_are_not_cached() {
        let bridge = bridge();
        bridge.record_outcome(outcome("find handler", false, 0.99)).await;
        bridge.drain_once().await;
        assert!(bridge.consult("find handler", Intent::Symbol).await.is_none());
    }

    #[tokio::test]
    async fn overflowing_the_queue_drops_the_oldest_signal() {
        let mut config = LearningConfig::default();
        config.queue_capacity = 2;
        let cache: Arc<dyn CacheFabric> = Arc::new(InMemoryCacheFabric::new(&Default::default()));
        let bridge = LearningBridge::new(cache, config);

        bridge.record_outcome(outcome("a", true, 0.9)).await;
        bridge.record_outcome(outcome("b", true, 0.9)).await;
        bridge.record_outcome(outcome("c", true, 0.9)).await;
        assert_eq!(bridge.pending_len().await, 2);

        bridge.drain_once().await;
        assert!(bridge.consult("a", Intent::Symbol).await.is_none());
        assert!(bridge.consult("b", Intent::Symbol).await.is_some());
        assert!(bridge.consult("c", Intent::Symbol).await.is_some());
    }
}
