//! Plain builder functions for the data-model values a test most commonly
//! needs, without pulling in proptest.

use chrono::{TimeZone, Utc};
use codeintel_core::config::CodeIntelConfig;
use codeintel_core::identity::BundleSignature;
use codeintel_core::model::{
    Bundle, BundleExplanation, BundleSource, Chunk, Embedding, File, Intent, IntentClassification,
    Policy, QueryEntity, Span, SpanKind,
};
use codeintel_learning::OutcomeSignal;
use codeintel_retrieval::{AssembleOptions, SearchOptions};
use std::collections::HashMap;

/// A minimal, well-formed span in an otherwise empty file.
pub fn minimal_span(repo: &str, path: &str, name: &str) -> Span {
    let (byte_start, byte_end) = (0, 40);
    let name = Some(name.to_string());
    let id = Span::compute_id(
        repo, path, byte_start, byte_end, SpanKind::Function, &name, &None, &None, &[],
    );
    Span {
        id,
        repo: repo.to_string(),
        path: path.to_string(),
        byte_start,
        byte_end,
        kind: SpanKind::Function,
        name,
        signature: None,
        doc: None,
        parent_ids: vec![],
        references: vec![],
    }
}

/// A chunk spanning the whole of `span`'s body.
pub fn chunk_for_span(span: &Span, content: &str) -> Chunk {
    let id = Chunk::compute_id(span.id, span.byte_start, span.byte_end, content);
    Chunk {
        id,
        span_id: span.id,
        content: content.to_string(),
        repo: span.repo.clone(),
        path: span.path.clone(),
        byte_start: span.byte_start,
        byte_end: span.byte_end,
        span_kind: span.kind,
        span_name: span.name.clone(),
    }
}

pub fn minimal_file(repo: &str, path: &str) -> File {
    File {
        repo: repo.to_string(),
        path: path.to_string(),
        content_hash: "0".repeat(64),
        lang: "rust".to_string(),
    }
}

/// A zero vector embedding of the given dimension; useful when a test only
/// cares about dimension checks, not similarity scoring.
pub fn zero_embedding(chunk: &Chunk, dim: usize) -> Embedding {
    Embedding {
        chunk_id: chunk.id,
        model_id: "hashing-trick-v1".into(),
        dim: dim as u32,
        vector: vec![0.0; dim],
    }
}

/// A unit-norm embedding with a single nonzero component at `axis`.
pub fn unit_embedding(chunk: &Chunk, dim: usize, axis: usize) -> Embedding {
    let mut vector = vec![0.0; dim];
    vector[axis.min(dim.saturating_sub(1))] = 1.0;
    Embedding {
        chunk_id: chunk.id,
        model_id: "hashing-trick-v1".into(),
        dim: dim as u32,
        vector,
    }
}

/// A policy that includes everything and never early-stops.
pub fn permissive_policy() -> Policy {
    Policy {
        max_depth: 3,
        include_symbols: true,
        include_files: true,
        include_content: true,
        early_stop_threshold: 100,
        seed_weights: HashMap::new(),
    }
}

pub fn intent_classification(intent: Intent, confidence: f32) -> IntentClassification {
    IntentClassification {
        intent,
        confidence,
        entities: vec![],
        suggested_policies: vec![],
    }
}

pub fn query_entity(entity_type: &str, value: &str) -> QueryEntity {
    QueryEntity {
        entity_type: entity_type.to_string(),
        value: value.to_string(),
    }
}

/// An empty, well-formed bundle for a given query and budget.
pub fn empty_bundle(query: &str, budget: i64) -> Bundle {
    let assembled_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let signature = Bundle::compute_signature(query, &[], 0, assembled_at);
    Bundle {
        query: query.to_string(),
        sources: vec![],
        total_tokens: 0,
        budget,
        budget_used: 0.0,
        assembled_at,
        signature,
        explanation: BundleExplanation::default(),
    }
}

/// A bundle with a single source carrying the given tokens, still inside
/// budget.
pub fn bundle_with_source(query: &str, source: BundleSource, budget: i64) -> Bundle {
    let assembled_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let total_tokens = source.tokens;
    let sources = vec![source];
    let signature = Bundle::compute_signature(query, &sources, total_tokens, assembled_at);
    Bundle {
        query: query.to_string(),
        sources,
        total_tokens,
        budget,
        budget_used: total_tokens as f32 / budget as f32,
        assembled_at,
        signature,
        explanation: BundleExplanation::default(),
    }
}

/// An outcome signal reporting a satisfied retrieval against `bundle`.
pub fn satisfied_outcome(session_id: &str, query: &str, bundle_signature: BundleSignature) -> OutcomeSignal {
    OutcomeSignal {
        session_id: session_id.to_string(),
        query: query.to_string(),
        intent: Intent::Search,
        bundle_signature,
        satisfied: true,
        confidence: 0.9,
        time_to_fix_ms: Some(4_200),
        top_click_id: None,
        token_usage: Some(512),
    }
}

/// An outcome signal reporting a dissatisfied retrieval.
pub fn dissatisfied_outcome(session_id: &str, query: &str, bundle_signature: BundleSignature) -> OutcomeSignal {
    OutcomeSignal {
        session_id: session_id.to_string(),
        query: query.to_string(),
        intent: Intent::Search,
        bundle_signature,
        satisfied: false,
        confidence: 0.4,
        time_to_fix_ms: None,
        top_click_id: None,
        token_usage: None,
    }
}

pub fn minimal_config() -> CodeIntelConfig {
    CodeIntelConfig::default()
}

pub fn search_options(repo: &str, limit: usize) -> SearchOptions {
    SearchOptions {
        repo: Some(repo.to_string()),
        language: None,
        force_intent: None,
        limit: Some(limit),
    }
}

pub fn assemble_options(repo: &str, budget_tokens: i64) -> AssembleOptions {
    AssembleOptions {
        repo: Some(repo.to_string()),
        language: None,
        force_intent: None,
        budget_tokens: Some(budget_tokens),
        limit: None,
    }
}
