//! Validated configuration types, constructed once and passed in at
//! construction of each component (per the design's "single, validated
//! configuration value" note) rather than read from the environment inside
//! the core. Environment-variable bridging is confined to [`CodeIntelConfig::from_env`],
//! which a CLI or server entry point calls once at startup.

use crate::error::{CodeIntelResult, ConfigError};
use crate::model::Intent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-namespace LRU + TTL parameters for the cache fabric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheNamespaceConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
    /// Fraction of operations in this namespace that emit timing metrics.
    pub metrics_sample_rate: f32,
}

/// Cache fabric configuration: one entry per namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheConfig {
    pub search: CacheNamespaceConfig,
    pub bundle: CacheNamespaceConfig,
    pub index: CacheNamespaceConfig,
    pub metadata: CacheNamespaceConfig,
    /// Period between lazy-expiry sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// Cache key version; bumping forces a global invalidation.
    pub version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search: CacheNamespaceConfig {
                ttl_secs: 5 * 60,
                max_entries: 1_000,
                metrics_sample_rate: 1.0,
            },
            bundle: CacheNamespaceConfig {
                ttl_secs: 30 * 60,
                max_entries: 500,
                metrics_sample_rate: 1.0,
            },
            index: CacheNamespaceConfig {
                ttl_secs: 10 * 60,
                max_entries: 200,
                metrics_sample_rate: 0.5,
            },
            metadata: CacheNamespaceConfig {
                ttl_secs: 60 * 60,
                max_entries: 100,
                metrics_sample_rate: 0.1,
            },
            sweep_interval_secs: 60,
            version: "v1".to_string(),
        }
    }
}

/// Timeout, retry, and circuit breaker parameters for one named phase
/// of the reliability envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReliabilityPhaseConfig {
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_backoff_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_success_threshold: u32,
    pub breaker_recovery_window_secs: u64,
}

/// Reliability envelope configuration: one phase config each for the four
/// named phases the design calls out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReliabilityConfig {
    pub search: ReliabilityPhaseConfig,
    pub graph: ReliabilityPhaseConfig,
    pub cache: ReliabilityPhaseConfig,
    pub storage: ReliabilityPhaseConfig,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            search: ReliabilityPhaseConfig {
                timeout_ms: 5_000,
                retry_attempts: 3,
                retry_base_backoff_ms: 1_000,
                breaker_failure_threshold: 5,
                breaker_success_threshold: 2,
                breaker_recovery_window_secs: 30,
            },
            graph: ReliabilityPhaseConfig {
                timeout_ms: 8_000,
                retry_attempts: 2,
                retry_base_backoff_ms: 2_000,
                breaker_failure_threshold: 3,
                breaker_success_threshold: 2,
                breaker_recovery_window_secs: 30,
            },
            cache: ReliabilityPhaseConfig {
                timeout_ms: 1_000,
                retry_attempts: 2,
                retry_base_backoff_ms: 200,
                breaker_failure_threshold: 10,
                breaker_success_threshold: 3,
                breaker_recovery_window_secs: 15,
            },
            storage: ReliabilityPhaseConfig {
                timeout_ms: 2_000,
                retry_attempts: 2,
                retry_base_backoff_ms: 500,
                breaker_failure_threshold: 5,
                breaker_success_threshold: 2,
                breaker_recovery_window_secs: 45,
            },
        }
    }
}

/// A caller-supplied policy override for a specific `(repo, intent)` pair.
/// Any field left `None` falls back to the base table's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicyOverride {
    pub max_depth: Option<u32>,
    pub include_symbols: Option<bool>,
    pub include_files: Option<bool>,
    pub include_content: Option<bool>,
    pub early_stop_threshold: Option<u32>,
}

/// Configuration for the policy gate and seed mix optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicyGateConfig {
    /// RRF fusion constant `k`, left open by the design as configurable.
    pub fusion_k: u32,
    /// Graph boost weight applied to the graph enhancement score during
    /// hybrid retrieval fusion.
    pub graph_boost_weight: f32,
    /// Token budget below which `include_content` is forced off and
    /// `early_stop_threshold` is reduced by a third.
    pub low_budget_threshold: i64,
    /// Per-`(repo, intent)` overrides, keyed as `"{repo}:{intent}"`.
    #[cfg_attr(feature = "openapi", schema(value_type = HashMap<String, Object>))]
    pub repo_overrides: HashMap<String, PolicyOverride>,
}

impl PolicyGateConfig {
    pub fn override_key(repo: &str, intent: Intent) -> String {
        format!("{repo}:{}", intent.as_db_str())
    }

    pub fn override_for(&self, repo: &str, intent: Intent) -> Option<&PolicyOverride> {
        self.repo_overrides.get(&Self::override_key(repo, intent))
    }
}

impl Default for PolicyGateConfig {
    fn default() -> Self {
        Self {
            fusion_k: 60,
            graph_boost_weight: 0.2,
            low_budget_threshold: 2_000,
            repo_overrides: HashMap::new(),
        }
    }
}

/// Per-content-type packing priority used by the degrade engine to decide
/// which items to degrade first under budget pressure. Higher values are
/// packed more eagerly (degraded later).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PackingProfile {
    pub code: i32,
    pub tests: i32,
    pub comments: i32,
    pub examples: i32,
    pub configuration: i32,
    pub documentation: i32,
}

impl Default for PackingProfile {
    fn default() -> Self {
        Self {
            code: 100,
            tests: 70,
            comments: 40,
            examples: 60,
            configuration: 80,
            documentation: 50,
        }
    }
}

/// Request-surface defaults applied when a caller omits an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RetrievalDefaults {
    pub search_limit: u32,
    pub assemble_budget: i64,
    pub graph_token_budget: i64,
    /// Threshold (ms) above which graph traversal and hybrid retrieval emit
    /// a performance warning.
    pub performance_warning_ms: u64,
    /// Confidence floor below which the intent classifier collapses to
    /// `search`.
    pub intent_confidence_floor: f32,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            search_limit: 20,
            assemble_budget: 8_000,
            graph_token_budget: 2_000,
            performance_warning_ms: 200,
            intent_confidence_floor: 0.2,
        }
    }
}

/// Bounded queue and learning-cache parameters for the outcome bridge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LearningConfig {
    pub queue_capacity: usize,
    pub learning_cache_ttl_secs: u64,
    /// Minimum confidence in a satisfied signal before it is cached.
    pub satisfaction_confidence_floor: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_000,
            learning_cache_ttl_secs: 7 * 24 * 60 * 60,
            satisfaction_confidence_floor: 0.6,
        }
    }
}

/// The single, validated configuration value threaded through every
/// component at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CodeIntelConfig {
    pub retrieval: RetrievalDefaults,
    pub policy_gate: PolicyGateConfig,
    pub packing_profile: PackingProfile,
    pub cache: CacheConfig,
    pub reliability: ReliabilityConfig,
    pub learning: LearningConfig,
}

impl Default for CodeIntelConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalDefaults::default(),
            policy_gate: PolicyGateConfig::default(),
            packing_profile: PackingProfile::default(),
            cache: CacheConfig::default(),
            reliability: ReliabilityConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl CodeIntelConfig {
    /// Validate cross-field invariants the design calls out explicitly.
    pub fn validate(&self) -> CodeIntelResult<()> {
        if self.retrieval.assemble_budget <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.assemble_budget".to_string(),
                value: self.retrieval.assemble_budget.to_string(),
                reason: "assemble_budget must be non-negative".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.intent_confidence_floor) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.intent_confidence_floor".to_string(),
                value: self.retrieval.intent_confidence_floor.to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }
        if self.policy_gate.graph_boost_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "policy_gate.graph_boost_weight".to_string(),
                value: self.policy_gate.graph_boost_weight.to_string(),
                reason: "must be non-negative".to_string(),
            }
            .into());
        }
        if self.learning.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "learning.queue_capacity".to_string(),
                value: "0".to_string(),
                reason: "queue_capacity must be positive to provide any backpressure headroom"
                    .to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Build a config from environment variables, falling back to defaults
    /// for anything unset. Lives at the CLI/server boundary; the core never
    /// calls this itself.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut config = defaults.clone();

        config.retrieval.search_limit = env_parse("CODEINTEL_SEARCH_LIMIT", defaults.retrieval.search_limit);
        config.retrieval.assemble_budget =
            env_parse("CODEINTEL_ASSEMBLE_BUDGET", defaults.retrieval.assemble_budget);
        config.retrieval.graph_token_budget = env_parse(
            "CODEINTEL_GRAPH_TOKEN_BUDGET",
            defaults.retrieval.graph_token_budget,
        );
        config.retrieval.performance_warning_ms = env_parse(
            "CODEINTEL_PERFORMANCE_WARNING_MS",
            defaults.retrieval.performance_warning_ms,
        );

        config.policy_gate.fusion_k = env_parse("CODEINTEL_FUSION_K", defaults.policy_gate.fusion_k);
        config.policy_gate.graph_boost_weight = env_parse(
            "CODEINTEL_GRAPH_BOOST_WEIGHT",
            defaults.policy_gate.graph_boost_weight,
        );

        config.learning.queue_capacity =
            env_parse("CODEINTEL_LEARNING_QUEUE_CAPACITY", defaults.learning.queue_capacity);

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CodeIntelConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_assemble_budget_is_invalid() {
        let mut config = CodeIntelConfig::default();
        config.retrieval.assemble_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn policy_override_key_is_repo_and_intent() {
        let key = PolicyGateConfig::override_key("critical-service", Intent::Symbol);
        assert_eq!(key, "critical-service:symbol");
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        std::env::remove_var("CODEINTEL_FUSION_K");
        let config = CodeIntelConfig::from_env();
        assert_eq!(config.policy_gate.fusion_k, 60);
    }
}
