//! The reliability envelope: per-phase timeout, retry, and circuit
//! breaker wrapping around the search, graph, cache, and storage phases of
//! the retrieval pipeline.

pub mod circuit_breaker;
pub mod envelope;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use envelope::{is_absorbable, ReliabilityPolicy};

use codeintel_core::config::ReliabilityConfig;

/// Bundles one [`ReliabilityPolicy`] per named phase, built from a single
/// [`ReliabilityConfig`].
pub struct ReliabilityEnvelope {
    pub search: ReliabilityPolicy,
    pub graph: ReliabilityPolicy,
    pub cache: ReliabilityPolicy,
    pub storage: ReliabilityPolicy,
}

impl ReliabilityEnvelope {
    pub fn new(config: &ReliabilityConfig) -> Self {
        Self {
            search: ReliabilityPolicy::new("search", config.search),
            graph: ReliabilityPolicy::new("graph", config.graph),
            cache: ReliabilityPolicy::new("cache", config.cache),
            storage: ReliabilityPolicy::new("storage", config.storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_builds_one_policy_per_phase() {
        let envelope = ReliabilityEnvelope::new(&ReliabilityConfig::default());
        assert_eq!(envelope.search.phase(), "search");
        assert_eq!(envelope.graph.phase(), "graph");
        assert_eq!(envelope.cache.phase(), "cache");
        assert_eq!(envelope.storage.phase(), "storage");
    }
}
