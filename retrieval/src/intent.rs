//! Intent classification: a deterministic, side-effect-free scorer over
//! normalized query text. No I/O, no randomness — the same query always
//! classifies the same way.

use codeintel_core::model::{Intent, IntentClassification, QueryEntity};
use once_cell::sync::Lazy;
use regex::Regex;

struct IntentRule {
    intent: Intent,
    tokens: &'static [&'static str],
}

/// Ordered so that a tie in raw score is broken in favor of the earlier
/// rule (symbol beats config beats api beats incident).
const RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Symbol,
        tokens: &[
            "function", "class", "method", "def ", "struct", "implementation", "impl ",
            "trait", "constructor", "interface",
        ],
    },
    IntentRule {
        intent: Intent::Config,
        tokens: &[
            ".env", "config", "settings", "configuration", "environment variable", "yaml",
            "toml", "flag",
        ],
    },
    IntentRule {
        intent: Intent::Api,
        tokens: &[
            "endpoint", "route", "http", "rest", " get ", " post ", " put ", " delete ",
            " patch ", "api", "request handler", "controller",
        ],
    },
    IntentRule {
        intent: Intent::Incident,
        tokens: &[
            "error", "crash", "bug", "debug", "exception", "failure", "incident", "panic",
            "stack trace", "outage",
        ],
    },
];

/// Minimum number of consecutive low-confidence stopping conditions is not
/// relevant here; this is the confidence-floor constant applied when the
/// caller doesn't supply one via [`ClassifierConfig`].
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.2;

static SYMBOL_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-z][a-zA-Z0-9]*[A-Z][a-zA-Z0-9]*\b|\b[a-zA-Z][a-zA-Z0-9]*_[a-zA-Z0-9_]+\b").unwrap()
});
static FILE_EXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[A-Za-z][A-Za-z0-9]{0,5}\b").unwrap());
static HTTP_VERB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(get|post|put|delete|patch|head|options)\b").unwrap());
static NUMERIC_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3,4}\b").unwrap());

/// Normalize a query: lowercase, collapse runs of whitespace to a single
/// space, pad with leading/trailing spaces so word-boundary token matches
/// (`" get "`) work at the edges of the string.
fn normalize(query: &str) -> String {
    let collapsed = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    format!(" {collapsed} ")
}

fn score_rules(normalized: &str) -> Vec<(Intent, u32)> {
    RULES
        .iter()
        .map(|rule| {
            let score = rule
                .tokens
                .iter()
                .filter(|token| normalized.contains(*token))
                .count() as u32;
            (rule.intent, score)
        })
        .collect()
}

/// Pick the intent with the highest score, the earliest rule winning ties
/// (symbol > config > api > incident).
fn pick_best(scores: &[(Intent, u32)]) -> (Intent, u32) {
    let mut best = scores[0];
    for &(intent, score) in &scores[1..] {
        if score > best.1 {
            best = (intent, score);
        }
    }
    best
}

/// Extract lightweight entities from the raw (non-normalized, so case and
/// punctuation survive) query text.
fn extract_entities(query: &str) -> Vec<QueryEntity> {
    let mut entities = Vec::new();

    for m in SYMBOL_NAME_RE.find_iter(query) {
        entities.push(QueryEntity {
            entity_type: "symbol_name".to_string(),
            value: m.as_str().to_string(),
        });
    }
    for m in FILE_EXT_RE.find_iter(query) {
        entities.push(QueryEntity {
            entity_type: "file_extension".to_string(),
            value: m.as_str().to_string(),
        });
    }
    for m in HTTP_VERB_RE.find_iter(query) {
        entities.push(QueryEntity {
            entity_type: "http_verb".to_string(),
            value: m.as_str().to_lowercase(),
        });
    }
    for m in NUMERIC_CODE_RE.find_iter(query) {
        entities.push(QueryEntity {
            entity_type: "numeric_code".to_string(),
            value: m.as_str().to_string(),
        });
    }

    entities.sort_by(|a, b| (a.entity_type.as_str(), a.value.as_str()).cmp(&(b.entity_type.as_str(), b.value.as_str())));
    entities.dedup();
    entities
}

/// Classify a query's intent. `force_intent`, when supplied, bypasses
/// scoring entirely and fixes `confidence` at `1.0`; entity extraction
/// still runs since it is independent of the chosen intent.
pub fn classify(query: &str, force_intent: Option<Intent>, confidence_floor: f32) -> IntentClassification {
    let entities = extract_entities(query);

    if let Some(intent) = force_intent {
        return IntentClassification {
            intent,
            confidence: 1.0,
            entities,
            suggested_policies: vec![intent.as_db_str().to_string()],
        };
    }

    let normalized = normalize(query);
    let scores = score_rules(&normalized);
    let matched_total: u32 = scores.iter().map(|(_, s)| s).sum();

    let (intent, confidence) = if matched_total == 0 {
        // No rule token matched anywhere: a plain, unambiguous fallback to
        // search rather than a low-confidence guess.
        (Intent::Search, 1.0)
    } else {
        // Dilute the matched score against the query's overall word count so
        // a single incidental token match in a long, mostly-unrelated query
        // doesn't read as confident classification.
        let word_count = normalized.split_whitespace().count() as u32;
        let total = matched_total.max(word_count);
        let (best_intent, best_score) = pick_best(&scores);
        let confidence = best_score as f32 / total as f32;
        if confidence < confidence_floor {
            (Intent::Search, confidence)
        } else {
            (best_intent, confidence)
        }
    };

    IntentClassification {
        intent,
        confidence,
        entities,
        suggested_policies: vec![intent.as_db_str().to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_deterministic() {
        let a = classify("show me the getUserById function implementation", None, DEFAULT_CONFIDENCE_FLOOR);
        let b = classify("show me the getUserById function implementation", None, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(a, b);
    }

    #[test]
    fn definitional_tokens_favor_symbol_intent() {
        let result = classify("getUserById function implementation", None, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(result.intent, Intent::Symbol);
        assert!(result.confidence >= 0.5);
    }

    #[test]
    fn config_tokens_favor_config_intent() {
        let result = classify("where is the .env configuration for database settings", None, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(result.intent, Intent::Config);
    }

    #[test]
    fn failure_tokens_favor_incident_intent() {
        let result = classify("why did the payment service crash with this error", None, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(result.intent, Intent::Incident);
    }

    #[test]
    fn ambiguous_query_collapses_to_search_below_confidence_floor() {
        let result = classify(
            "I was wondering if you could help me understand how the various \
             settings across this large distributed system actually get read \
             and applied at runtime across all of our services",
            None,
            DEFAULT_CONFIDENCE_FLOOR,
        );
        assert_eq!(result.intent, Intent::Search);
        assert!(result.confidence < DEFAULT_CONFIDENCE_FLOOR);
    }

    #[test]
    fn no_matching_tokens_defaults_to_search_with_full_confidence() {
        let result = classify("show me something about widgets", None, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(result.intent, Intent::Search);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn force_intent_overrides_classification() {
        let result = classify("totally unrelated text", Some(Intent::Incident), DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(result.intent, Intent::Incident);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn extracts_file_extension_and_http_verb_entities() {
        let result = classify("GET /users in routes.rs", None, DEFAULT_CONFIDENCE_FLOOR);
        assert!(result.entities.iter().any(|e| e.entity_type == "file_extension" && e.value == ".rs"));
        assert!(result.entities.iter().any(|e| e.entity_type == "http_verb" && e.value == "get"));
    }
}
