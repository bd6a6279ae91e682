//! Hybrid retrieval orchestration: the data flow that ties intent
//! classification, policy derivation, parallel seed search, fusion, graph
//! expansion, and bundle assembly together behind two entry points,
//! `search` and `assemble`.

use crate::assembler::{self, AssembleLimits, AssemblerItem, ContentType, SourceBucket};
use crate::degrade::Capsule;
use crate::fusion::{self, SourceList};
use crate::graph::{self, ExpansionOrder};
use crate::intent;
use crate::policy;

use async_trait::async_trait;
use codeintel_core::config::CodeIntelConfig;
use codeintel_core::error::{CodeIntelError, RetrievalError};
use codeintel_core::identity::{CacheKey, ChunkId, SpanId};
use codeintel_core::model::{
    Bundle, Chunk, Intent, IntentClassification, Policy, Span, StoppingCondition,
    StoppingConditionKind,
};
use codeintel_reliability::ReliabilityEnvelope;
use codeintel_storage::{CacheFabric, CacheNamespace, MemoryScope, StorageFacade};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// External collaborator that turns query text into a vector embedding.
/// Embedding providers are an explicit non-goal of this crate; callers
/// plug in whatever local model or hosted API they use.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CodeIntelError>;

    /// The model identifier used for both the vector search call and
    /// token-budget estimation downstream.
    fn model_id(&self) -> &str;
}

/// Caller-supplied options narrowing a `search` call.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchOptions {
    pub repo: Option<String>,
    pub language: Option<String>,
    pub force_intent: Option<Intent>,
    pub limit: Option<usize>,
}

/// One fused, ranked, fully-hydrated result returned by `search`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RankedResult {
    pub id: String,
    pub score: f32,
    pub chunk: Option<Chunk>,
    pub span: Option<Span>,
    pub memory_content: Option<String>,
}

/// Caller-supplied options for an `assemble` call.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssembleOptions {
    pub repo: Option<String>,
    pub language: Option<String>,
    pub force_intent: Option<Intent>,
    pub budget_tokens: Option<i64>,
    pub limit: Option<usize>,
}

/// A cached seed-search hit: enough to either re-fetch the backing entity
/// (chunk, span) or, for memory hits with no standalone lookup, to
/// reconstruct the result without a second round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedHit {
    id: String,
    score: f32,
    memory_content: Option<String>,
}

struct Gathered {
    intent: IntentClassification,
    policy: Policy,
    ranked: Vec<RankedResult>,
    stopping_conditions: Vec<StoppingCondition>,
    cache_hit: bool,
}

/// Ties intent classification, the policy gate, parallel seed search,
/// fusion, graph expansion, and bundle assembly into two entry points.
pub struct HybridRetrieval {
    storage: Arc<dyn StorageFacade>,
    cache: Arc<dyn CacheFabric>,
    embedder: Arc<dyn QueryEmbedder>,
    reliability: ReliabilityEnvelope,
    config: CodeIntelConfig,
}

impl HybridRetrieval {
    pub fn new(
        storage: Arc<dyn StorageFacade>,
        cache: Arc<dyn CacheFabric>,
        embedder: Arc<dyn QueryEmbedder>,
        config: CodeIntelConfig,
    ) -> Self {
        let reliability = ReliabilityEnvelope::new(&config.reliability);
        Self {
            storage,
            cache,
            embedder,
            reliability,
            config,
        }
    }

    /// The reliability envelope guarding this instance's search, graph,
    /// cache, and storage phases — exposed so callers can report circuit
    /// breaker health without routing a probe through the pipeline itself.
    pub fn reliability(&self) -> &ReliabilityEnvelope {
        &self.reliability
    }

    /// Run intent classification through fusion and return the ranked,
    /// hydrated hits without assembling a bundle.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<RankedResult>, CodeIntelError> {
        let limit = options.limit;
        let gathered = self
            .gather(query, &options.repo, &options.language, options.force_intent, limit)
            .await?;
        Ok(gathered.ranked)
    }

    /// Run the full pipeline and return an assembled, token-budgeted
    /// bundle, including graph-expanded evidence.
    pub async fn assemble(
        &self,
        query: &str,
        options: AssembleOptions,
    ) -> Result<Bundle, CodeIntelError> {
        let started = Instant::now();
        let gathered = self
            .gather(query, &options.repo, &options.language, options.force_intent, options.limit)
            .await?;

        let budget = options
            .budget_tokens
            .unwrap_or(self.config.retrieval.assemble_budget);
        let model_id = self.embedder.model_id();

        let graph_seeds: Vec<SpanId> = gathered
            .ranked
            .iter()
            .filter_map(|r| r.span.as_ref().map(|s| s.id))
            .collect();

        let expansion_order = match gathered.intent.intent {
            Intent::Symbol | Intent::Api => ExpansionOrder::QualityFirst,
            _ => ExpansionOrder::Breadth,
        };

        let mut stopping_conditions = gathered.stopping_conditions;
        let mut graph_items = Vec::new();
        let mut doc_items = Vec::new();

        if !graph_seeds.is_empty() {
            let graph_start = Instant::now();
            let traversal = graph::traverse(
                self.storage.as_ref(),
                &graph_seeds,
                gathered.policy.max_depth,
                self.config.retrieval.graph_token_budget,
                expansion_order,
                None,
            )
            .await;
            if let Ok(metrics) = codeintel_telemetry::metrics::METRICS.as_ref() {
                metrics.record_graph_expansion_latency(graph_start.elapsed().as_millis() as f64);
            }

            let already_ranked: std::collections::HashSet<SpanId> = graph_seeds.iter().copied().collect();
            for visited in &traversal.visited {
                if already_ranked.contains(&visited.span_id) {
                    continue;
                }
                if let Ok(Some(span)) = self.storage.get_span(visited.span_id).await {
                    if let Some(doc) = span.doc.clone() {
                        doc_items.push(doc_item_from_span(&span, doc, visited.confidence));
                    }
                    graph_items.push(graph_item_from_span(span, visited.confidence));
                }
            }
            stopping_conditions.extend(traversal.stopping_conditions);
        }

        let mut items = to_assembler_items(&gathered.ranked);
        items.append(&mut graph_items);
        items.append(&mut doc_items);

        let bundle = assembler::assemble(
            query,
            items,
            &gathered.policy,
            &self.config.packing_profile,
            budget,
            model_id,
            AssembleLimits {
                max_items: options.limit,
            },
            gathered.cache_hit,
            stopping_conditions,
            now_utc(),
        );

        if let Ok(metrics) = codeintel_telemetry::metrics::METRICS.as_ref() {
            metrics.record_bundle_assembly(gathered.cache_hit, started.elapsed().as_millis() as f64);
            if bundle
                .explanation
                .stopping_conditions
                .iter()
                .any(|c| c.kind == StoppingConditionKind::TokenBudget)
            {
                metrics.record_budget_exhaustion();
            }
        }

        Ok(bundle)
    }

    /// The shared core of `search` and `assemble`: classify intent,
    /// derive a policy, consult the search-result cache, and otherwise run
    /// the parallel seed searches and fuse them.
    async fn gather(
        &self,
        query: &str,
        repo: &Option<String>,
        language: &Option<String>,
        force_intent: Option<Intent>,
        limit: Option<usize>,
    ) -> Result<Gathered, CodeIntelError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput {
                reason: "query must not be empty".to_string(),
            }
            .into());
        }

        let classification = intent::classify(
            query,
            force_intent,
            self.config.retrieval.intent_confidence_floor,
        );

        let pol = policy::derive_policy(
            classification.intent,
            classification.confidence,
            Some(self.config.retrieval.assemble_budget),
            repo.as_deref(),
            language.as_deref(),
            &self.config.policy_gate,
        );

        let cache_key = CacheKey::from_fields(&[
            ("query", query.into()),
            ("repo", repo.clone().unwrap_or_default().into()),
            ("language", language.clone().unwrap_or_default().into()),
            ("intent", classification.intent.as_db_str().into()),
        ]);

        let search_limit = limit.unwrap_or(self.config.retrieval.search_limit as usize).max(1);

        let cache_result = self
            .cache
            .get_raw(CacheNamespace::Search, cache_key)
            .await;

        let (cached_hits, cache_hit): (Vec<CachedHit>, bool) = match cache_result {
            Ok(Some(value)) => match serde_json::from_value::<Vec<CachedHit>>(value) {
                Ok(hits) => (hits, true),
                Err(_) => (Vec::new(), false),
            },
            _ => (Vec::new(), false),
        };

        let (ranked, stopping_conditions, fresh_hits) = if cache_hit {
            let ranked = self.hydrate_cached(&cached_hits).await;
            (ranked, Vec::new(), None)
        } else {
            let (ranked, conditions, fresh) = self
                .search_and_fuse(query, &pol, repo, search_limit)
                .await?;
            (ranked, conditions, Some(fresh))
        };

        if let Some(fresh) = fresh_hits {
            if let Ok(serialized) = serde_json::to_value(&fresh) {
                if let Err(err) = self.cache.set(CacheNamespace::Search, cache_key, serialized, None).await {
                    warn!(error = %err, "failed to populate search cache");
                }
            }
        }

        if let Ok(metrics) = codeintel_telemetry::metrics::METRICS.as_ref() {
            metrics.record_cache_operation(CacheNamespace::Search.as_str(), cache_hit);
        }

        Ok(Gathered {
            intent: classification,
            policy: pol,
            ranked,
            stopping_conditions,
            cache_hit,
        })
    }

    /// Run vector, lexical, memory, and symbol search concurrently, fuse
    /// their results with weighted RRF, and hydrate the fused ids back
    /// into full entities.
    async fn search_and_fuse(
        &self,
        query: &str,
        pol: &Policy,
        repo: &Option<String>,
        limit: usize,
    ) -> Result<(Vec<RankedResult>, Vec<StoppingCondition>, Vec<CachedHit>), CodeIntelError> {
        let model_id = self.embedder.model_id().to_string();
        let query_vector = self.embedder.embed(query).await?;
        let filters = Vec::new();
        let memory_scope = MemoryScope {
            scope: None,
            repo: repo.clone(),
        };

        let storage = self.storage.as_ref();
        let (vector_hits, lexical_hits, memory_hits, symbol_hits) = tokio::join!(
            self.reliability.search.call(|| async {
                storage
                    .vector_search(&query_vector, &model_id, limit, &filters)
                    .await
                    .map_err(CodeIntelError::from)
            }),
            self.reliability.search.call(|| async {
                storage
                    .lexical_search(query, limit, &filters)
                    .await
                    .map_err(CodeIntelError::from)
            }),
            self.reliability.search.call(|| async {
                storage
                    .memory_search(query, limit, &memory_scope)
                    .await
                    .map_err(CodeIntelError::from)
            }),
            self.reliability.search.call(|| async {
                storage
                    .symbol_search(query, limit, &filters)
                    .await
                    .map_err(CodeIntelError::from)
            }),
        );

        let mut stopping_conditions = Vec::new();
        let vector_hits = unwrap_or_empty(vector_hits, "vector", &mut stopping_conditions);
        let lexical_hits = unwrap_or_empty(lexical_hits, "lexical", &mut stopping_conditions);
        let memory_hits = unwrap_or_empty(memory_hits, "memory", &mut stopping_conditions);
        let symbol_hits = unwrap_or_empty(symbol_hits, "symbol", &mut stopping_conditions);

        let vector_list = SourceList::new(
            "vector",
            weight_for(pol, "vector"),
            vector_hits.iter().map(|(id, _)| format!("chunk:{id}")).collect(),
        );
        let lexical_list = SourceList::new(
            "lexical",
            weight_for(pol, "lexical"),
            lexical_hits.iter().map(|(id, _)| format!("chunk:{id}")).collect(),
        );
        let memory_list = SourceList::new(
            "memory",
            weight_for(pol, "memory"),
            memory_hits.iter().map(|(id, _)| format!("memory:{id}")).collect(),
        );
        let symbol_list = SourceList::new(
            "symbol",
            weight_for(pol, "symbol"),
            symbol_hits.iter().map(|(id, _)| format!("span:{id}")).collect(),
        );

        let sources = vec![vector_list, lexical_list, memory_list, symbol_list];
        let fused = fusion::fuse(&sources, self.config.policy_gate.fusion_k, fusion::DEFAULT_EARLY_STOP_FRACTION);

        let mut fused = fused;
        let result_limit_hit = fused.len() > pol.early_stop_threshold as usize;
        fused.truncate(pol.early_stop_threshold as usize);
        if result_limit_hit {
            stopping_conditions.push(StoppingCondition::result_limit(
                "fused candidate set exceeded the policy's early-stop threshold",
            ));
        }

        let mut ranked = Vec::with_capacity(fused.len());
        let mut cached_hits = Vec::with_capacity(fused.len());
        for result in &fused {
            let (chunk, span, memory) = self.hydrate_one(&result.id).await;
            cached_hits.push(CachedHit {
                id: result.id.clone(),
                score: result.score,
                memory_content: memory.clone(),
            });
            ranked.push(RankedResult {
                id: result.id.clone(),
                score: result.score,
                chunk,
                span,
                memory_content: memory,
            });
        }

        Ok((ranked, stopping_conditions, cached_hits))
    }

    async fn hydrate_cached(&self, cached: &[CachedHit]) -> Vec<RankedResult> {
        let mut ranked = Vec::with_capacity(cached.len());
        for hit in cached {
            let (chunk, span, memory) = self.hydrate_one(&hit.id).await;
            ranked.push(RankedResult {
                id: hit.id.clone(),
                score: hit.score,
                chunk,
                span,
                memory_content: memory.or_else(|| hit.memory_content.clone()),
            });
        }
        ranked
    }

    /// Resolve a prefixed fused id back into the entity it names. Memory
    /// hits carry their content directly in the id's suffix (the memory
    /// collaborator has no separate by-id lookup), so no extra fetch is
    /// needed there.
    async fn hydrate_one(&self, id: &str) -> (Option<Chunk>, Option<Span>, Option<String>) {
        if let Some(rest) = id.strip_prefix("chunk:") {
            if let Ok(chunk_id) = rest.parse::<ChunkId>() {
                let chunk = self.storage.get_chunk(chunk_id).await.ok().flatten();
                let span = match &chunk {
                    Some(c) => self.storage.get_span(c.span_id).await.ok().flatten(),
                    None => None,
                };
                return (chunk, span, None);
            }
        }
        if let Some(rest) = id.strip_prefix("span:") {
            if let Ok(span_id) = rest.parse::<SpanId>() {
                let span = self.storage.get_span(span_id).await.ok().flatten();
                return (None, span, None);
            }
        }
        if let Some(rest) = id.strip_prefix("memory:") {
            return (None, None, Some(rest.to_string()));
        }
        (None, None, None)
    }
}

fn weight_for(pol: &Policy, source: &str) -> f32 {
    pol.seed_weights.get(source).copied().unwrap_or(1.0)
}

fn unwrap_or_empty<T>(
    result: Result<T, CodeIntelError>,
    phase: &str,
    conditions: &mut Vec<StoppingCondition>,
) -> T
where
    T: Default,
{
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(phase, error = %err, "seed search phase failed, continuing without it");
            conditions.push(StoppingCondition::storage_unavailable(format!(
                "{phase} search was unavailable: {err}"
            )));
            T::default()
        }
    }
}

fn to_assembler_items(ranked: &[RankedResult]) -> Vec<AssemblerItem> {
    ranked
        .iter()
        .filter_map(|result| {
            if let Some(chunk) = &result.chunk {
                let span_name = result.span.as_ref().and_then(|s| s.name.clone());
                let span_sig = result.span.as_ref().and_then(|s| s.signature.clone());
                let span_doc = result.span.as_ref().and_then(|s| s.doc.clone());
                Some(AssemblerItem {
                    bucket: SourceBucket::Code,
                    content_type: ContentType::Code,
                    chunk_id: Some(chunk.id),
                    span_id: result.span.as_ref().map(|s| s.id),
                    score: result.score,
                    capsule: Capsule {
                        full_content: chunk.content.clone(),
                        signature: span_sig,
                        doc: span_doc,
                        name: span_name,
                        path: chunk.path.clone(),
                    },
                })
            } else if let Some(span) = &result.span {
                Some(AssemblerItem {
                    bucket: SourceBucket::Symbols,
                    content_type: ContentType::Code,
                    chunk_id: None,
                    span_id: Some(span.id),
                    score: result.score,
                    capsule: Capsule {
                        full_content: span.signature.clone().unwrap_or_default(),
                        signature: span.signature.clone(),
                        doc: span.doc.clone(),
                        name: span.name.clone(),
                        path: span.path.clone(),
                    },
                })
            } else {
                result.memory_content.as_ref().map(|content| AssemblerItem {
                    bucket: SourceBucket::Memory,
                    content_type: ContentType::Documentation,
                    chunk_id: None,
                    span_id: None,
                    score: result.score,
                    capsule: Capsule {
                        full_content: content.clone(),
                        signature: None,
                        doc: None,
                        name: None,
                        path: "memory".to_string(),
                    },
                })
            }
        })
        .collect()
}

fn graph_item_from_span(span: Span, confidence: f32) -> AssemblerItem {
    AssemblerItem {
        bucket: SourceBucket::GraphEvidence,
        content_type: ContentType::Code,
        chunk_id: None,
        span_id: Some(span.id),
        score: confidence,
        capsule: Capsule {
            full_content: span.signature.clone().unwrap_or_default(),
            signature: span.signature.clone(),
            doc: span.doc.clone(),
            name: span.name.clone(),
            path: span.path.clone(),
        },
    }
}

fn doc_item_from_span(span: &Span, doc: String, confidence: f32) -> AssemblerItem {
    AssemblerItem {
        bucket: SourceBucket::Docs,
        content_type: ContentType::Documentation,
        chunk_id: None,
        span_id: Some(span.id),
        score: confidence,
        capsule: Capsule {
            full_content: doc,
            signature: span.signature.clone(),
            doc: None,
            name: span.name.clone(),
            path: span.path.clone(),
        },
    }
}

/// Wraps `chrono::Utc::now()` behind a named helper so a future
/// deterministic-clock injection point has a single call site to change.
fn now_utc() -> codeintel_core::identity::Timestamp {
    chrono::Utc::now()
}
