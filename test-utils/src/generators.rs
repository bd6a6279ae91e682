//! Proptest strategies for the data-model types in `codeintel_core::model`.

use codeintel_core::identity::{ChunkId, SpanId};
use codeintel_core::model::{
    Chunk, Embedding, File, Intent, IntentClassification, Policy, QueryEntity, ReferenceEdge,
    ReferenceKind, Span, SpanKind, SpanReference,
};
use proptest::collection::{hash_map, vec};
use proptest::prelude::*;

pub fn arb_repo() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,16}/[a-z][a-z0-9-]{2,16}"
}

pub fn arb_path() -> impl Strategy<Value = String> {
    "(src|lib|tests)/[a-z][a-z0-9_]{2,12}\\.rs"
}

pub fn arb_span_kind() -> impl Strategy<Value = SpanKind> {
    prop_oneof![
        Just(SpanKind::Module),
        Just(SpanKind::Class),
        Just(SpanKind::Function),
        Just(SpanKind::Method),
        Just(SpanKind::Property),
        Just(SpanKind::Enum),
        Just(SpanKind::Interface),
        Just(SpanKind::Comment),
    ]
}

pub fn arb_reference_kind() -> impl Strategy<Value = ReferenceKind> {
    prop_oneof![
        Just(ReferenceKind::Call),
        Just(ReferenceKind::Read),
        Just(ReferenceKind::Write),
    ]
}

fn arb_byte_range() -> impl Strategy<Value = (u32, u32)> {
    (0u32..10_000).prop_flat_map(|start| (Just(start), (start + 1)..(start + 2_000)))
}

prop_compose! {
    pub fn arb_span_reference()(
        path in arb_path(),
        (byte_start, byte_end) in arb_byte_range(),
        kind in arb_reference_kind(),
    ) -> SpanReference {
        SpanReference { path, byte_start, byte_end, kind }
    }
}

prop_compose! {
    pub fn arb_span()(
        repo in arb_repo(),
        path in arb_path(),
        (byte_start, byte_end) in arb_byte_range(),
        kind in arb_span_kind(),
        name in proptest::option::of("[a-z_][a-z0-9_]{1,24}"),
        signature in proptest::option::of("[a-z_ ()0-9:<>,]{1,40}"),
        doc in proptest::option::of("[a-zA-Z0-9 .,]{1,80}"),
        references in vec(arb_span_reference(), 0..4),
    ) -> Span {
        let id = Span::compute_id(
            &repo, &path, byte_start, byte_end, kind, &name, &signature, &doc, &[],
        );
        Span {
            id,
            repo,
            path,
            byte_start,
            byte_end,
            kind,
            name,
            signature,
            doc,
            parent_ids: vec![],
            references,
        }
    }
}

prop_compose! {
    pub fn arb_chunk()(
        span in arb_span(),
        content in "[a-zA-Z0-9_ \n{}();]{1,200}",
    ) -> Chunk {
        let id = Chunk::compute_id(span.id, span.byte_start, span.byte_end, &content);
        Chunk {
            id,
            span_id: span.id,
            content,
            repo: span.repo,
            path: span.path,
            byte_start: span.byte_start,
            byte_end: span.byte_end,
            span_kind: span.kind,
            span_name: span.name,
        }
    }
}

prop_compose! {
    pub fn arb_file()(
        repo in arb_repo(),
        path in arb_path(),
        content_hash in "[0-9a-f]{64}",
        lang in prop_oneof![Just("rust"), Just("python"), Just("typescript"), Just("go")],
    ) -> File {
        File { repo, path, content_hash, lang: lang.to_string() }
    }
}

pub fn arb_embedding_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    vec(-1.0f32..1.0f32, dim)
}

prop_compose! {
    pub fn arb_embedding(dim: usize)(
        chunk_id in any::<u64>().prop_map(|n| ChunkId::from_fields(&[("seed", n.into())])),
        vector in arb_embedding_vector(dim),
    ) -> Embedding {
        Embedding { chunk_id, model_id: "hashing-trick-v1".into(), dim: dim as u32, vector }
    }
}

fn arb_edge_type() -> impl Strategy<Value = codeintel_core::model::EdgeType> {
    use codeintel_core::model::EdgeType;
    prop_oneof![
        Just(EdgeType::Calls),
        Just(EdgeType::Uses),
        Just(EdgeType::Implements),
        Just(EdgeType::Exposes),
        Just(EdgeType::Configures),
        Just(EdgeType::DependsOn),
        Just(EdgeType::References),
    ]
}

prop_compose! {
    pub fn arb_reference_edge()(
        source_id in any::<u64>().prop_map(|n| SpanId::from_fields(&[("seed", n.into())])),
        target_id in any::<u64>().prop_map(|n| SpanId::from_fields(&[("seed", n.wrapping_add(1).into())])),
        edge_type in arb_edge_type(),
        confidence in 0.0f32..1.0f32,
    ) -> ReferenceEdge {
        ReferenceEdge { source_id, target_id, edge_type, confidence }
    }
}

pub fn arb_intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        Just(Intent::Symbol),
        Just(Intent::Config),
        Just(Intent::Api),
        Just(Intent::Incident),
        Just(Intent::Search),
    ]
}

prop_compose! {
    pub fn arb_query_entity()(
        entity_type in prop_oneof![Just("symbol"), Just("file_ext"), Just("http_verb"), Just("code")],
        value in "[a-zA-Z0-9_./]{1,20}",
    ) -> QueryEntity {
        QueryEntity { entity_type: entity_type.to_string(), value }
    }
}

prop_compose! {
    pub fn arb_intent_classification()(
        intent in arb_intent(),
        confidence in 0.0f32..1.0f32,
        entities in vec(arb_query_entity(), 0..3),
        suggested_policies in vec("[a-z_]{3,16}", 0..2),
    ) -> IntentClassification {
        IntentClassification { intent, confidence, entities, suggested_policies }
    }
}

prop_compose! {
    pub fn arb_policy()(
        max_depth in 1u32..6,
        include_symbols in any::<bool>(),
        include_files in any::<bool>(),
        include_content in any::<bool>(),
        early_stop_threshold in 1u32..50,
        seed_weights in hash_map("[a-z]{3,10}", 0.0f32..Policy::MAX_SEED_WEIGHT, 0..4),
    ) -> Policy {
        Policy {
            max_depth,
            include_symbols,
            include_files,
            include_content,
            early_stop_threshold,
            seed_weights,
        }
    }
}
