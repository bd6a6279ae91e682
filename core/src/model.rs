//! Data model for the code intelligence retrieval engine: files, spans,
//! chunks, reference edges, and the transient records (`IntentClassification`,
//! `Policy`, `Bundle`, `StoppingCondition`) produced while answering a query.

use crate::identity::{BundleSignature, ChunkId, SpanId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of semantic regions a span can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Module,
    Class,
    Function,
    Method,
    Property,
    Enum,
    Interface,
    Comment,
}

impl SpanKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SpanKind::Module => "module",
            SpanKind::Class => "class",
            SpanKind::Function => "function",
            SpanKind::Method => "method",
            SpanKind::Property => "property",
            SpanKind::Enum => "enum",
            SpanKind::Interface => "interface",
            SpanKind::Comment => "comment",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, SpanKindParseError> {
        match s.to_lowercase().as_str() {
            "module" => Ok(SpanKind::Module),
            "class" => Ok(SpanKind::Class),
            "function" => Ok(SpanKind::Function),
            "method" => Ok(SpanKind::Method),
            "property" => Ok(SpanKind::Property),
            "enum" => Ok(SpanKind::Enum),
            "interface" => Ok(SpanKind::Interface),
            "comment" => Ok(SpanKind::Comment),
            _ => Err(SpanKindParseError(s.to_string())),
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SpanKind {
    type Err = SpanKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid span kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanKindParseError(pub String);

impl fmt::Display for SpanKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid span kind: {}", self.0)
    }
}

impl std::error::Error for SpanKindParseError {}

/// The kind of a reference within a span's body (a call, a read, or a write
/// of some other symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Call,
    Read,
    Write,
}

/// A reference to another symbol made from within a span's body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SpanReference {
    pub path: String,
    pub byte_start: u32,
    pub byte_end: u32,
    pub kind: ReferenceKind,
}

/// A source file under a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct File {
    pub repo: String,
    pub path: String,
    pub content_hash: String,
    pub lang: String,
}

/// A semantic region within a file: the unit an adapter emits and the unit
/// identity is computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Span {
    pub id: SpanId,
    pub repo: String,
    pub path: String,
    pub byte_start: u32,
    pub byte_end: u32,
    pub kind: SpanKind,
    pub name: Option<String>,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub parent_ids: Vec<SpanId>,
    pub references: Vec<SpanReference>,
}

impl Span {
    /// Compute this span's content-addressed ID from its identity-bearing
    /// fields, per the hash-input tuple the identity scheme defines.
    pub fn compute_id(
        repo: &str,
        path: &str,
        byte_start: u32,
        byte_end: u32,
        kind: SpanKind,
        name: &Option<String>,
        signature: &Option<String>,
        doc: &Option<String>,
        parent_ids: &[SpanId],
    ) -> SpanId {
        let doc_hash = doc.as_ref().map(|d| crate::identity::content_hash_hex(
            &crate::identity::compute_content_hash(d.as_bytes()),
        ));
        let parents_hash = if parent_ids.is_empty() {
            None
        } else {
            let joined = parent_ids
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(",");
            Some(crate::identity::content_hash_hex(
                &crate::identity::compute_content_hash(joined.as_bytes()),
            ))
        };
        SpanId::from_fields(&[
            ("repo", repo.into()),
            ("path", path.into()),
            ("byte_start", byte_start.into()),
            ("byte_end", byte_end.into()),
            ("kind", kind.as_db_str().into()),
            ("name", crate::identity::optional_field(name)),
            ("signature", crate::identity::optional_field(signature)),
            ("doc_hash", crate::identity::optional_field(&doc_hash)),
            ("parents_hash", crate::identity::optional_field(&parents_hash)),
        ])
    }

    /// Whether `byte_start < byte_end` and `kind` is a recognized variant
    /// (always true for a constructed [`SpanKind`], but kept to make the
    /// invariant explicit at call sites that validate external input).
    pub fn is_well_formed(&self) -> bool {
        self.byte_start < self.byte_end
    }
}

/// A retrieval unit derived from a span: either its whole body or a
/// sub-slice, optionally carrying an embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Chunk {
    pub id: ChunkId,
    pub span_id: SpanId,
    pub content: String,
    pub repo: String,
    pub path: String,
    pub byte_start: u32,
    pub byte_end: u32,
    pub span_kind: SpanKind,
    pub span_name: Option<String>,
}

impl Chunk {
    pub fn compute_id(span_id: SpanId, byte_start: u32, byte_end: u32, content: &str) -> ChunkId {
        let content_hash = crate::identity::content_hash_hex(
            &crate::identity::compute_content_hash(content.as_bytes()),
        );
        ChunkId::from_fields(&[
            ("span_id", span_id.to_string().into()),
            ("byte_start", byte_start.into()),
            ("byte_end", byte_end.into()),
            ("content_hash", content_hash.into()),
        ])
    }
}

/// A fixed-dimension embedding vector for a chunk under a specific model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Embedding {
    pub chunk_id: ChunkId,
    pub model_id: String,
    pub dim: u32,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn is_valid(&self) -> bool {
        self.vector.len() as u32 == self.dim
    }

    /// Cosine similarity against another embedding, used by the in-memory
    /// storage reference implementation's `vector_search`.
    pub fn cosine_similarity(&self, other: &Embedding) -> Result<f32, crate::error::StorageError> {
        if self.dim != other.dim {
            return Err(crate::error::StorageError::Conflict {
                entity: "embedding",
                reason: format!(
                    "dimension mismatch: expected {}, got {}",
                    self.dim, other.dim
                ),
            });
        }
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.vector.iter().zip(other.vector.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm_a * norm_b))
    }
}

/// The closed set of reference-edge types between symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    Uses,
    Implements,
    Exposes,
    Configures,
    DependsOn,
    References,
}

impl EdgeType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "calls",
            EdgeType::Uses => "uses",
            EdgeType::Implements => "implements",
            EdgeType::Exposes => "exposes",
            EdgeType::Configures => "configures",
            EdgeType::DependsOn => "depends_on",
            EdgeType::References => "references",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// A typed, directed relation between two symbols (spans).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReferenceEdge {
    pub source_id: SpanId,
    pub target_id: SpanId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub confidence: f32,
}

/// The classification of a query's purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Symbol,
    Config,
    Api,
    Incident,
    Search,
}

impl Intent {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Intent::Symbol => "symbol",
            Intent::Config => "config",
            Intent::Api => "api",
            Intent::Incident => "incident",
            Intent::Search => "search",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// A lightweight entity extracted from a query (a symbol name, a file
/// extension, an HTTP verb, a numeric code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QueryEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: String,
}

/// Transient record produced by the intent classifier for a single
/// query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Vec<QueryEntity>,
    pub suggested_policies: Vec<String>,
}

/// The derived retrieval configuration for a single query, produced by the
/// policy gate and seed mix optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Policy {
    pub max_depth: u32,
    pub include_symbols: bool,
    pub include_files: bool,
    pub include_content: bool,
    pub early_stop_threshold: u32,
    pub seed_weights: HashMap<String, f32>,
}

impl Policy {
    /// Hard ceiling on any individual seed weight, per the design.
    pub const MAX_SEED_WEIGHT: f32 = 5.0;

    pub fn is_well_formed(&self) -> bool {
        self.early_stop_threshold >= 1
            && self
                .seed_weights
                .values()
                .all(|w| *w >= 0.0 && *w <= Self::MAX_SEED_WEIGHT)
    }
}

/// Severity of a [`StoppingCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The taxonomy of reasons the assembler (or an upstream phase) ended a
/// phase short of the ideal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StoppingConditionKind {
    TokenBudget,
    ResultLimit,
    QualityThreshold,
    CacheSaturation,
    GraphTruncated,
    StorageUnavailable,
}

/// A structured reason the assembler (or an upstream phase) stopped short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoppingCondition {
    #[serde(rename = "type")]
    pub kind: StoppingConditionKind,
    pub severity: Severity,
    pub title: String,
    pub explanation: String,
    pub actionable: Vec<String>,
}

impl StoppingCondition {
    pub fn token_budget(explanation: impl Into<String>) -> Self {
        Self {
            kind: StoppingConditionKind::TokenBudget,
            severity: Severity::Medium,
            title: "token budget exhausted".into(),
            explanation: explanation.into(),
            actionable: vec!["increase the budget or narrow the query".into()],
        }
    }

    pub fn result_limit(explanation: impl Into<String>) -> Self {
        Self {
            kind: StoppingConditionKind::ResultLimit,
            severity: Severity::Low,
            title: "result limit reached".into(),
            explanation: explanation.into(),
            actionable: vec![],
        }
    }

    pub fn quality_threshold(explanation: impl Into<String>) -> Self {
        Self {
            kind: StoppingConditionKind::QualityThreshold,
            severity: Severity::Medium,
            title: "remaining results below quality floor".into(),
            explanation: explanation.into(),
            actionable: vec![],
        }
    }

    pub fn cache_saturation(explanation: impl Into<String>) -> Self {
        Self {
            kind: StoppingConditionKind::CacheSaturation,
            severity: Severity::Low,
            title: "cache hit rate outside target range".into(),
            explanation: explanation.into(),
            actionable: vec![],
        }
    }

    pub fn graph_truncated(explanation: impl Into<String>) -> Self {
        Self {
            kind: StoppingConditionKind::GraphTruncated,
            severity: Severity::Medium,
            title: "graph expansion truncated".into(),
            explanation: explanation.into(),
            actionable: vec!["raise the graph token budget or reduce max_depth".into()],
        }
    }

    pub fn storage_unavailable(explanation: impl Into<String>) -> Self {
        Self {
            kind: StoppingConditionKind::StorageUnavailable,
            severity: Severity::High,
            title: "a source was unavailable after retries".into(),
            explanation: explanation.into(),
            actionable: vec!["retry later or check storage health".into()],
        }
    }
}

/// One packed section of a [`Bundle`]: all items drawn from a single source
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BundleSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub items: Vec<BundleItem>,
    pub tokens: i64,
}

/// A single packed item within a [`BundleSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BundleItem {
    pub chunk_id: Option<ChunkId>,
    pub span_id: Option<SpanId>,
    pub content: String,
    pub tokens: i64,
    pub degrade_level: u8,
    pub quality_score: f32,
}

/// Evidence and accounting attached to a bundle for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BundleExplanation {
    pub stopping_conditions: Vec<StoppingCondition>,
    pub cache_hit: bool,
    pub degraded: bool,
    pub overridden_budget: bool,
}

/// The context bundle assembler's output: a token-budgeted, ordered
/// pack of evidence for a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Bundle {
    pub query: String,
    pub sources: Vec<BundleSource>,
    pub total_tokens: i64,
    pub budget: i64,
    pub budget_used: f32,
    pub assembled_at: Timestamp,
    pub signature: BundleSignature,
    pub explanation: BundleExplanation,
}

impl Bundle {
    /// `sum(source.tokens) == total_tokens <= budget`, unless the
    /// explanation explicitly marks the budget as overridden.
    pub fn is_well_formed(&self) -> bool {
        let sum: i64 = self.sources.iter().map(|s| s.tokens).sum();
        let within_budget = self.total_tokens <= self.budget || self.explanation.overridden_budget;
        sum == self.total_tokens && within_budget
    }

    /// Compute the bundle signature: a hash over the query text,
    /// sorted source types, sorted per-source item counts, total tokens, and
    /// the assembly day (not the full timestamp, so bundles assembled on the
    /// same day with identical content are interchangeable).
    pub fn compute_signature(
        query_text: &str,
        sources: &[BundleSource],
        total_tokens: i64,
        assembled_at: Timestamp,
    ) -> BundleSignature {
        let mut source_types: Vec<&str> = sources.iter().map(|s| s.source_type.as_str()).collect();
        source_types.sort_unstable();
        let mut item_counts: Vec<usize> = sources.iter().map(|s| s.items.len()).collect();
        item_counts.sort_unstable();
        BundleSignature::from_fields(&[
            ("query_text", query_text.into()),
            ("source_types", serde_json::to_value(&source_types).unwrap()),
            ("source_item_counts", serde_json::to_value(&item_counts).unwrap()),
            ("total_tokens", total_tokens.into()),
            ("assembled_at_day", assembled_at.format("%Y-%m-%d").to_string().into()),
        ])
    }
}

/// A single cache entry's metadata, common across all namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub access_count: u64,
    pub last_accessed: Timestamp,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_span() -> Span {
        Span {
            id: SpanId::nil(),
            repo: "r".into(),
            path: "p.rs".into(),
            byte_start: 0,
            byte_end: 10,
            kind: SpanKind::Function,
            name: Some("f".into()),
            signature: None,
            doc: None,
            parent_ids: vec![],
            references: vec![],
        }
    }

    #[test]
    fn span_kind_round_trips_through_db_str() {
        for kind in [
            SpanKind::Module,
            SpanKind::Class,
            SpanKind::Function,
            SpanKind::Method,
            SpanKind::Property,
            SpanKind::Enum,
            SpanKind::Interface,
            SpanKind::Comment,
        ] {
            let s = kind.as_db_str();
            assert_eq!(SpanKind::from_db_str(s).unwrap(), kind);
        }
    }

    #[test]
    fn span_id_is_stable_across_identical_inputs() {
        let id1 = Span::compute_id(
            "r", "p.rs", 0, 10, SpanKind::Function, &Some("f".into()), &None, &None, &[],
        );
        let id2 = Span::compute_id(
            "r", "p.rs", 0, 10, SpanKind::Function, &Some("f".into()), &None, &None, &[],
        );
        assert_eq!(id1, id2);
    }

    #[test]
    fn span_id_changes_when_signature_changes() {
        let id1 = Span::compute_id(
            "r", "p.rs", 0, 10, SpanKind::Function, &Some("f".into()), &None, &None, &[],
        );
        let id2 = Span::compute_id(
            "r", "p.rs", 0, 10, SpanKind::Function, &Some("f".into()), &Some("fn f()".into()), &None, &[],
        );
        assert_ne!(id1, id2);
    }

    #[test]
    fn span_well_formed_requires_nonempty_range() {
        let mut span = sample_span();
        assert!(span.is_well_formed());
        span.byte_end = span.byte_start;
        assert!(!span.is_well_formed());
    }

    #[test]
    fn chunk_id_depends_on_content() {
        let span_id = SpanId::nil();
        let a = Chunk::compute_id(span_id, 0, 5, "hello");
        let b = Chunk::compute_id(span_id, 0, 5, "world");
        assert_ne!(a, b);
    }

    #[test]
    fn policy_rejects_weight_above_ceiling() {
        let mut policy = Policy {
            max_depth: 3,
            include_symbols: true,
            include_files: false,
            include_content: true,
            early_stop_threshold: 5,
            seed_weights: HashMap::new(),
        };
        policy.seed_weights.insert("vector".into(), 6.0);
        assert!(!policy.is_well_formed());
    }

    #[test]
    fn bundle_signature_is_order_independent_over_source_types() {
        let assembled_at = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let sources_a = vec![
            BundleSource { source_type: "code".into(), items: vec![], tokens: 10 },
            BundleSource { source_type: "docs".into(), items: vec![], tokens: 5 },
        ];
        let sources_b = vec![
            BundleSource { source_type: "docs".into(), items: vec![], tokens: 5 },
            BundleSource { source_type: "code".into(), items: vec![], tokens: 10 },
        ];
        let sig_a = Bundle::compute_signature("q", &sources_a, 15, assembled_at);
        let sig_b = Bundle::compute_signature("q", &sources_b, 15, assembled_at);
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn bundle_well_formed_checks_token_sum_and_budget() {
        let assembled_at = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let sources = vec![BundleSource { source_type: "code".into(), items: vec![], tokens: 300 }];
        let bundle = Bundle {
            query: "q".into(),
            sources,
            total_tokens: 300,
            budget: 500,
            budget_used: 0.6,
            assembled_at,
            signature: Bundle::compute_signature("q", &[], 300, assembled_at),
            explanation: BundleExplanation::default(),
        };
        assert!(bundle.is_well_formed());
    }
}
