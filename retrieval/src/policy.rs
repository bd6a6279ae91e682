//! The policy gate: a pure function from an intent (plus context) to a
//! concrete [`Policy`]. No I/O — every adjustment is a deterministic
//! transformation of the base table.

use codeintel_core::config::PolicyGateConfig;
use codeintel_core::model::{Intent, Policy};
use std::collections::HashMap;

fn weights(pairs: &[(&str, f32)]) -> HashMap<String, f32> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The base policy table, one row per intent, before any context
/// adjustment is applied.
fn base_policy(intent: Intent) -> Policy {
    match intent {
        Intent::Symbol => Policy {
            max_depth: 3,
            include_symbols: true,
            include_files: false,
            include_content: true,
            early_stop_threshold: 5,
            seed_weights: weights(&[("definition", 2.0), ("declaration", 1.5), ("symbol", 1.5)]),
        },
        Intent::Config => Policy {
            max_depth: 2,
            include_symbols: false,
            include_files: true,
            include_content: true,
            early_stop_threshold: 4,
            seed_weights: weights(&[("file", 2.0), ("memory", 1.0)]),
        },
        Intent::Api => Policy {
            max_depth: 3,
            include_symbols: true,
            include_files: false,
            include_content: true,
            early_stop_threshold: 5,
            seed_weights: weights(&[("memory", 1.5), ("symbol", 1.5), ("vector", 1.0)]),
        },
        Intent::Incident => Policy {
            max_depth: 4,
            include_symbols: true,
            include_files: true,
            include_content: true,
            early_stop_threshold: 8,
            seed_weights: weights(&[("memory", 2.0), ("vector", 1.5), ("lexical", 1.0)]),
        },
        Intent::Search => Policy {
            max_depth: 3,
            include_symbols: true,
            include_files: true,
            include_content: true,
            early_stop_threshold: 7,
            seed_weights: weights(&[
                ("vector", 1.0),
                ("lexical", 1.0),
                ("memory", 1.0),
                ("symbol", 1.0),
            ]),
        },
    }
}

/// Languages that get a definition-weight boost for symbol-intent queries.
/// A closed list rather than "any language" since the boost is meant for
/// the languages this engine actually expects to index.
const BOOSTED_LANGUAGES: &[&str] = &["rust", "typescript", "javascript", "python", "go"];

fn clamp_weight(w: f32) -> f32 {
    w.clamp(0.0, Policy::MAX_SEED_WEIGHT)
}

/// Derive the retrieval policy for one query, applying context adjustments
/// in order: language boost, low-budget constraint, repo override,
/// confidence scaling.
pub fn derive_policy(
    intent: Intent,
    confidence: f32,
    budget_tokens: Option<i64>,
    repo: Option<&str>,
    language: Option<&str>,
    config: &PolicyGateConfig,
) -> Policy {
    let mut policy = base_policy(intent);

    // 1. language-specific boost for symbol intent.
    if intent == Intent::Symbol {
        if let Some(lang) = language {
            if BOOSTED_LANGUAGES.contains(&lang.to_lowercase().as_str()) {
                if let Some(w) = policy.seed_weights.get_mut("definition") {
                    *w = clamp_weight(*w + 0.5);
                }
            }
        }
    }

    // 2. low token budget forces content off and shortens the early-stop
    // threshold by a third.
    if let Some(budget) = budget_tokens {
        if budget < config.low_budget_threshold {
            policy.include_content = false;
            policy.early_stop_threshold =
                (policy.early_stop_threshold - policy.early_stop_threshold / 3).max(1);
        }
    }

    // 3. per-(repo, intent) override takes precedence field by field.
    if let Some(repo) = repo {
        if let Some(over) = config.override_for(repo, intent) {
            if let Some(v) = over.max_depth {
                policy.max_depth = v;
            }
            if let Some(v) = over.include_symbols {
                policy.include_symbols = v;
            }
            if let Some(v) = over.include_files {
                policy.include_files = v;
            }
            if let Some(v) = over.include_content {
                policy.include_content = v;
            }
            if let Some(v) = over.early_stop_threshold {
                policy.early_stop_threshold = v;
            }
        }
    }

    // 4. scale weights by confidence, never below half strength.
    let scale = confidence.max(0.5);
    for w in policy.seed_weights.values_mut() {
        *w = clamp_weight(*w * scale);
    }

    policy.early_stop_threshold = policy.early_stop_threshold.max(1);
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_core::config::PolicyOverride;

    #[test]
    fn symbol_intent_excludes_files_by_default() {
        let policy = derive_policy(Intent::Symbol, 1.0, None, None, None, &PolicyGateConfig::default());
        assert!(!policy.include_files);
        assert!(policy.include_symbols);
    }

    #[test]
    fn low_budget_forces_content_off_and_shortens_early_stop() {
        let config = PolicyGateConfig::default();
        let policy = derive_policy(Intent::Search, 1.0, Some(500), None, None, &config);
        assert!(!policy.include_content);
        assert_eq!(policy.early_stop_threshold, 7 - 7 / 3);
    }

    #[test]
    fn high_budget_leaves_content_on() {
        let config = PolicyGateConfig::default();
        let policy = derive_policy(Intent::Search, 1.0, Some(50_000), None, None, &config);
        assert!(policy.include_content);
    }

    #[test]
    fn language_boost_raises_definition_weight_for_symbol_intent() {
        let config = PolicyGateConfig::default();
        let boosted = derive_policy(Intent::Symbol, 1.0, None, None, Some("rust"), &config);
        let unboosted = derive_policy(Intent::Symbol, 1.0, None, None, None, &config);
        assert!(boosted.seed_weights["definition"] > unboosted.seed_weights["definition"]);
    }

    #[test]
    fn repo_override_takes_precedence() {
        let mut config = PolicyGateConfig::default();
        config.repo_overrides.insert(
            PolicyGateConfig::override_key("critical-service", Intent::Symbol),
            PolicyOverride {
                max_depth: Some(4),
                early_stop_threshold: Some(8),
                ..Default::default()
            },
        );
        let policy = derive_policy(
            Intent::Symbol,
            1.0,
            None,
            Some("critical-service"),
            None,
            &config,
        );
        assert_eq!(policy.max_depth, 4);
        assert_eq!(policy.early_stop_threshold, 8);
    }

    #[test]
    fn low_confidence_scales_weights_down_but_not_below_half() {
        let config = PolicyGateConfig::default();
        let full = derive_policy(Intent::Search, 1.0, None, None, None, &config);
        let low = derive_policy(Intent::Search, 0.1, None, None, None, &config);
        assert_eq!(low.seed_weights["vector"], full.seed_weights["vector"] * 0.5);
    }

    #[test]
    fn derived_policy_is_well_formed() {
        let config = PolicyGateConfig::default();
        for intent in [
            Intent::Symbol,
            Intent::Config,
            Intent::Api,
            Intent::Incident,
            Intent::Search,
        ] {
            let policy = derive_policy(intent, 0.7, Some(1_000), None, None, &config);
            assert!(policy.is_well_formed());
        }
    }
}
