//! The bundle assembler: packs pre-fetched, scored evidence into a
//! token-budgeted [`Bundle`]. Pure and synchronous — every item it packs
//! has already been fetched by the orchestrator; this module only
//! decides ordering, degradation, and when to stop.

use crate::degrade::{self, Capsule, MAX_DEGRADE_LEVEL};
use codeintel_core::config::PackingProfile;
use codeintel_core::identity::{ChunkId, SpanId, Timestamp};
use codeintel_core::model::{Bundle, BundleExplanation, BundleItem, BundleSource, Policy, StoppingCondition};
use codeintel_core::tokenizer::BudgetTracker;

/// The five fixed-priority buckets bundles are assembled from, in the
/// order they are packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBucket {
    Code,
    Memory,
    Symbols,
    GraphEvidence,
    Docs,
}

impl SourceBucket {
    fn as_str(self) -> &'static str {
        match self {
            SourceBucket::Code => "code",
            SourceBucket::Memory => "memory",
            SourceBucket::Symbols => "symbols",
            SourceBucket::GraphEvidence => "graph",
            SourceBucket::Docs => "docs",
        }
    }

    /// Whether `policy` allows this bucket to contribute at all.
    fn gated_by(self, policy: &Policy) -> bool {
        match self {
            SourceBucket::Code | SourceBucket::GraphEvidence => policy.include_content,
            SourceBucket::Symbols => policy.include_symbols,
            SourceBucket::Docs => policy.include_files,
            SourceBucket::Memory => true,
        }
    }
}

const BUCKET_ORDER: [SourceBucket; 5] = [
    SourceBucket::Code,
    SourceBucket::Memory,
    SourceBucket::Symbols,
    SourceBucket::GraphEvidence,
    SourceBucket::Docs,
];

/// The content category of one item, used to look up its packing
/// priority in a [`PackingProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Code,
    Tests,
    Comments,
    Examples,
    Configuration,
    Documentation,
}

impl ContentType {
    fn priority(self, profile: &PackingProfile) -> i32 {
        match self {
            ContentType::Code => profile.code,
            ContentType::Tests => profile.tests,
            ContentType::Comments => profile.comments,
            ContentType::Examples => profile.examples,
            ContentType::Configuration => profile.configuration,
            ContentType::Documentation => profile.documentation,
        }
    }
}

/// One piece of pre-fetched, scored evidence ready for packing.
#[derive(Debug, Clone)]
pub struct AssemblerItem {
    pub bucket: SourceBucket,
    pub content_type: ContentType,
    pub chunk_id: Option<ChunkId>,
    pub span_id: Option<SpanId>,
    pub score: f32,
    pub capsule: Capsule,
}

/// Below this score an item is treated as noise: skipped outright rather
/// than packed at a degraded level.
const QUALITY_SCORE_FLOOR: f32 = 0.05;

/// Caller-supplied limits the assembler enforces while packing.
#[derive(Debug, Clone, Copy)]
pub struct AssembleLimits {
    /// Stop once this many items have been packed across all buckets.
    pub max_items: Option<usize>,
}

impl Default for AssembleLimits {
    fn default() -> Self {
        Self { max_items: None }
    }
}

/// Assemble a [`Bundle`] from pre-fetched `items`, honoring `policy`'s
/// inclusion gates, `profile`'s per-content-type packing priorities, and
/// `budget` tokens total. `upstream_conditions` carries stopping
/// conditions already raised by earlier phases (e.g. graph truncation)
/// that should be folded into the bundle's explanation.
pub fn assemble(
    query: &str,
    mut items: Vec<AssemblerItem>,
    policy: &Policy,
    profile: &PackingProfile,
    budget: i64,
    model_id: &str,
    limits: AssembleLimits,
    cache_hit: bool,
    mut upstream_conditions: Vec<StoppingCondition>,
    assembled_at: Timestamp,
) -> Bundle {
    items.sort_by(|a, b| {
        let pa = a.content_type.priority(profile);
        let pb = b.content_type.priority(profile);
        pb.cmp(&pa).then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut tracker = BudgetTracker::new(budget);
    let mut sources: Vec<BundleSource> = Vec::new();
    let mut conditions = Vec::new();
    let mut degraded = false;
    let mut budget_exhausted = false;
    let mut quality_skipped = false;
    let mut packed_count = 0usize;
    let mut limit_hit = false;

    'buckets: for bucket in BUCKET_ORDER {
        if !bucket.gated_by(policy) {
            continue;
        }

        let mut bucket_items: Vec<&AssemblerItem> =
            items.iter().filter(|item| item.bucket == bucket).collect();
        bucket_items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut packed_items = Vec::new();
        let mut bucket_tokens: i64 = 0;

        for item in bucket_items {
            if let Some(max_items) = limits.max_items {
                if packed_count >= max_items {
                    limit_hit = true;
                    break 'buckets;
                }
            }

            if item.score < QUALITY_SCORE_FLOOR {
                quality_skipped = true;
                continue;
            }

            let rendered = degrade::degrade(&item.capsule, 0, model_id);
            let chosen = if tracker.can_fit(rendered.tokens) {
                rendered
            } else {
                degraded = true;
                degrade::degrade_to_fit(&item.capsule, tracker.remaining(), model_id)
            };

            if chosen.level >= MAX_DEGRADE_LEVEL {
                budget_exhausted = true;
                continue;
            }

            tracker.add(
                format!("{}:{}", bucket.as_str(), item.capsule.name.as_deref().unwrap_or("item")),
                chosen.tokens,
            );
            bucket_tokens += chosen.tokens;
            packed_items.push(BundleItem {
                chunk_id: item.chunk_id,
                span_id: item.span_id,
                content: chosen.content,
                tokens: chosen.tokens,
                degrade_level: chosen.level,
                quality_score: chosen.quality_score,
            });
            packed_count += 1;
        }

        if !packed_items.is_empty() {
            sources.push(BundleSource {
                source_type: bucket.as_str().to_string(),
                items: packed_items,
                tokens: bucket_tokens,
            });
        }
    }

    if budget_exhausted {
        conditions.push(StoppingCondition::token_budget(
            "remaining items would not fit even at the most aggressive degrade level",
        ));
    }
    if quality_skipped {
        conditions.push(StoppingCondition::quality_threshold(
            "one or more candidate items fell below the minimum score floor and were skipped",
        ));
    }
    if limit_hit {
        conditions.push(StoppingCondition::result_limit(format!(
            "stopped after packing {packed_count} items, the caller's limit"
        )));
    }
    conditions.append(&mut upstream_conditions);

    if sources.is_empty() && conditions.is_empty() {
        conditions.push(StoppingCondition::quality_threshold(
            "no candidate evidence was available for this query",
        ));
    }

    let total_tokens: i64 = sources.iter().map(|s| s.tokens).sum();
    let budget_used = if budget > 0 {
        total_tokens as f32 / budget as f32
    } else {
        0.0
    };
    let signature = Bundle::compute_signature(query, &sources, total_tokens, assembled_at);

    Bundle {
        query: query.to_string(),
        sources,
        total_tokens,
        budget,
        budget_used,
        assembled_at,
        signature,
        explanation: BundleExplanation {
            stopping_conditions: conditions,
            cache_hit,
            degraded,
            overridden_budget: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(bucket: SourceBucket, score: f32, content: &str) -> AssemblerItem {
        AssemblerItem {
            bucket,
            content_type: ContentType::Code,
            chunk_id: None,
            span_id: None,
            score,
            capsule: Capsule {
                full_content: content.to_string(),
                signature: Some(content.lines().next().unwrap_or_default().to_string()),
                doc: None,
                name: Some("item".to_string()),
                path: "src/lib.rs".to_string(),
            },
        }
    }

    fn default_policy() -> Policy {
        Policy {
            max_depth: 2,
            include_symbols: true,
            include_files: true,
            include_content: true,
            early_stop_threshold: 5,
            seed_weights: Default::default(),
        }
    }

    #[test]
    fn packs_items_in_bucket_priority_order() {
        let items = vec![
            item(SourceBucket::Docs, 0.9, "doc content"),
            item(SourceBucket::Code, 0.5, "fn a() {}"),
        ];
        let bundle = assemble(
            "query",
            items,
            &default_policy(),
            &PackingProfile::default(),
            10_000,
            "claude",
            AssembleLimits::default(),
            false,
            vec![],
            Utc::now(),
        );
        assert_eq!(bundle.sources[0].source_type, "code");
    }

    #[test]
    fn gated_bucket_is_excluded_entirely() {
        let mut policy = default_policy();
        policy.include_files = false;
        let items = vec![item(SourceBucket::Docs, 0.9, "doc content")];
        let bundle = assemble(
            "query",
            items,
            &policy,
            &PackingProfile::default(),
            10_000,
            "claude",
            AssembleLimits::default(),
            false,
            vec![],
            Utc::now(),
        );
        assert!(bundle.sources.is_empty());
    }

    #[test]
    fn tiny_budget_degrades_rather_than_dropping_outright() {
        let items = vec![item(
            SourceBucket::Code,
            0.9,
            "fn long_function() {\n    do_a();\n    do_b();\n    do_c();\n}\n",
        )];
        let bundle = assemble(
            "query",
            items,
            &default_policy(),
            &PackingProfile::default(),
            3,
            "claude",
            AssembleLimits::default(),
            false,
            vec![],
            Utc::now(),
        );
        assert!(bundle.explanation.degraded || bundle.sources.is_empty());
    }

    #[test]
    fn below_quality_floor_items_are_skipped_with_a_condition() {
        let items = vec![item(SourceBucket::Code, 0.01, "fn noise() {}")];
        let bundle = assemble(
            "query",
            items,
            &default_policy(),
            &PackingProfile::default(),
            10_000,
            "claude",
            AssembleLimits::default(),
            false,
            vec![],
            Utc::now(),
        );
        assert!(bundle.sources.is_empty());
        assert!(bundle
            .explanation
            .stopping_conditions
            .iter()
            .any(|c| c.kind == codeintel_core::model::StoppingConditionKind::QualityThreshold));
    }

    #[test]
    fn empty_input_yields_a_well_formed_empty_bundle_with_explanation() {
        let bundle = assemble(
            "query",
            vec![],
            &default_policy(),
            &PackingProfile::default(),
            10_000,
            "claude",
            AssembleLimits::default(),
            false,
            vec![],
            Utc::now(),
        );
        assert!(bundle.is_well_formed());
        assert!(!bundle.explanation.stopping_conditions.is_empty());
    }

    #[test]
    fn upstream_conditions_are_folded_into_the_bundle() {
        let bundle = assemble(
            "query",
            vec![item(SourceBucket::Code, 0.9, "fn a() {}")],
            &default_policy(),
            &PackingProfile::default(),
            10_000,
            "claude",
            AssembleLimits::default(),
            false,
            vec![StoppingCondition::graph_truncated("propagated from graph traversal")],
            Utc::now(),
        );
        assert!(bundle
            .explanation
            .stopping_conditions
            .iter()
            .any(|c| c.kind == codeintel_core::model::StoppingConditionKind::GraphTruncated));
    }
}
