//! Model-aware token accounting: estimation and budget tracking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trait for counting tokens in text.
///
/// Implementations can provide exact counts (wrapping a real tokenizer) or
/// heuristic estimates based on character ratios; the retrieval pipeline
/// only ever depends on this trait, never on a concrete tokenizer.
pub trait Tokenizer: Send + Sync {
    /// Count tokens in the given text.
    fn count(&self, text: &str) -> i32;

    /// The model family this tokenizer estimates for (e.g. "gpt", "claude").
    fn model_family(&self) -> &str;
}

/// Heuristic tokenizer using character-to-token ratios. Fast and
/// approximate; used whenever an exact tokenizer for the target model is
/// unavailable.
#[derive(Debug, Clone)]
pub struct HeuristicTokenizer {
    /// Tokens per character ratio (model-specific).
    ratio: f32,
    model_family: String,
}

impl HeuristicTokenizer {
    /// Build a tokenizer tuned to a model ID, using empirically observed
    /// characters-per-token ratios per family.
    pub fn for_model(model: &str) -> Self {
        let (ratio, family) = if model.contains("gpt-4") || model.contains("gpt-3.5") {
            (0.25, "gpt")
        } else if model.contains("claude") {
            (0.28, "claude")
        } else if model.contains("text-embedding") {
            (0.25, "openai-embedding")
        } else if model.contains("llama") || model.contains("mistral") {
            (0.27, "open-source")
        } else {
            (0.30, "unknown")
        };
        Self {
            ratio,
            model_family: family.to_string(),
        }
    }

    pub fn with_ratio(ratio: f32, model_family: impl Into<String>) -> Self {
        Self {
            ratio,
            model_family: model_family.into(),
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::for_model("gpt-4")
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> i32 {
        (text.len() as f32 * self.ratio).ceil() as i32
    }

    fn model_family(&self) -> &str {
        &self.model_family
    }
}

/// Estimate tokens for `text` under `model_id` using the heuristic
/// tokenizer; the fast fallback the design calls for when an exact
/// tokenizer is unavailable (`ceil(len(text)/k)` for `k` near 3-4).
pub fn estimate_tokens(text: &str, model_id: &str) -> i32 {
    HeuristicTokenizer::for_model(model_id).count(text)
}

/// Pick the first candidate model whose heuristic estimate for
/// `target_text` does not exceed its own context ceiling, falling back to
/// the last candidate if none fit. A thin convenience helper; real model
/// limits are supplied by the caller since they are not this crate's
/// concern.
pub fn recommend_model(
    target_text: &str,
    candidates: &[(String, i32)],
) -> Option<String> {
    for (model_id, max_tokens) in candidates {
        if estimate_tokens(target_text, model_id) <= *max_tokens {
            return Some(model_id.clone());
        }
    }
    candidates.last().map(|(model_id, _)| model_id.clone())
}

/// A named line item recorded against a [`BudgetTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetItem {
    pub name: String,
    pub tokens: i64,
}

/// A snapshot report of a [`BudgetTracker`]'s state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub budget: i64,
    pub used: i64,
    pub remaining: i64,
    pub percentage: f32,
    pub items: Vec<BudgetItem>,
}

/// Tracks token consumption against a fixed budget as items are added
/// during assembly.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    budget: i64,
    used: i64,
    items: Vec<BudgetItem>,
}

impl BudgetTracker {
    pub fn new(budget: i64) -> Self {
        Self {
            budget: budget.max(0),
            used: 0,
            items: Vec::new(),
        }
    }

    /// Whether `tokens` additional tokens would still fit within budget.
    pub fn can_fit(&self, tokens: i64) -> bool {
        self.used.saturating_add(tokens) <= self.budget
    }

    /// Record `tokens` tokens against `item`, returning the new remaining
    /// balance. Callers must check [`Self::can_fit`] first; this method
    /// does not itself refuse an over-budget add, matching the assembler's
    /// need to record an explicit override when it chooses to.
    pub fn add(&mut self, item: impl Into<String>, tokens: i64) -> i64 {
        self.used = self.used.saturating_add(tokens);
        self.items.push(BudgetItem {
            name: item.into(),
            tokens,
        });
        self.remaining()
    }

    pub fn remaining(&self) -> i64 {
        (self.budget - self.used).max(0)
    }

    pub fn used(&self) -> i64 {
        self.used
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }

    pub fn report(&self) -> BudgetReport {
        let percentage = if self.budget > 0 {
            (self.used as f32 / self.budget as f32) * 100.0
        } else {
            0.0
        };
        BudgetReport {
            budget: self.budget,
            used: self.used,
            remaining: self.remaining(),
            percentage,
            items: self.items.clone(),
        }
    }
}

/// Per-model context ceilings, used by the optional `recommend_model`
/// helper and by callers that want a single place to look these up.
pub type ModelLimits = HashMap<String, i32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpt_family_ratio() {
        let tokenizer = HeuristicTokenizer::for_model("gpt-4");
        assert_eq!(tokenizer.model_family(), "gpt");
        assert_eq!(tokenizer.count(&"a".repeat(100)), 25);
    }

    #[test]
    fn claude_family_ratio() {
        let tokenizer = HeuristicTokenizer::for_model("claude-3-opus");
        assert_eq!(tokenizer.model_family(), "claude");
    }

    #[test]
    fn unknown_model_falls_back_to_conservative_ratio() {
        let tokenizer = HeuristicTokenizer::for_model("some-random-model");
        assert_eq!(tokenizer.model_family(), "unknown");
        assert_eq!(tokenizer.ratio(), 0.30);
    }

    #[test]
    fn estimate_is_monotonic_in_length() {
        let short = estimate_tokens("hi", "gpt-4");
        let long = estimate_tokens(&"hi ".repeat(50), "gpt-4");
        assert!(long > short);
    }

    #[test]
    fn budget_tracker_reports_remaining() {
        let mut tracker = BudgetTracker::new(100);
        assert!(tracker.can_fit(50));
        tracker.add("code:foo", 40);
        assert_eq!(tracker.remaining(), 60);
        assert!(!tracker.can_fit(61));
        let report = tracker.report();
        assert_eq!(report.used, 40);
        assert_eq!(report.items.len(), 1);
    }

    #[test]
    fn zero_budget_never_fits_a_positive_item() {
        let tracker = BudgetTracker::new(0);
        assert!(!tracker.can_fit(1));
        assert!(tracker.can_fit(0));
    }
}
