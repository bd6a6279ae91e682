//! Weighted reciprocal rank fusion over an arbitrary number of ranked
//! source lists. Generic over the id type so callers can fuse chunk ids,
//! span ids, or the prefixed string ids the orchestrator uses to unify
//! heterogeneous id spaces.

use std::collections::HashMap;
use std::hash::Hash;

/// One ranked list contributed by a single retrieval source (vector
/// search, lexical search, memory recall, ...), paired with the weight
/// that source's contribution should carry in the fused score.
pub struct SourceList<Id> {
    pub name: String,
    pub weight: f32,
    pub ranked_ids: Vec<Id>,
}

impl<Id> SourceList<Id> {
    pub fn new(name: impl Into<String>, weight: f32, ranked_ids: Vec<Id>) -> Self {
        Self {
            name: name.into(),
            weight,
            ranked_ids,
        }
    }
}

/// A fused result: the id, its combined score, and the per-source ranks
/// that contributed to it (source name -> 0-based rank), kept around for
/// explanation/debugging rather than just the opaque total.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult<Id> {
    pub id: Id,
    pub score: f32,
    pub contributing_ranks: HashMap<String, usize>,
}

/// Consecutive fused results whose score falls below
/// `best_score * early_stop_threshold` before fusion stops scanning
/// further candidates, once at least one result has already qualified.
const EARLY_STOP_RUN: usize = 3;

/// Default early-stop fraction used by the orchestrator's own fusion
/// call; conservative enough to rarely trim a genuinely useful tail, since
/// the orchestrator layers its own `early_stop_threshold` result-count cap
/// on top of fusion's output.
pub const DEFAULT_EARLY_STOP_FRACTION: f32 = 0.05;

/// Fuse multiple ranked source lists into one ordered result list using
/// weighted reciprocal rank fusion: `contribution = weight / (k + rank + 1)`
/// summed across every source a candidate appears in.
///
/// `early_stop_threshold` is a fraction of the best score (e.g. `0.05`):
/// once the running best is known, a run of [`EARLY_STOP_RUN`] consecutive
/// candidates scoring below `best_score * early_stop_threshold` stops the
/// scan early. Always returns at least one result if any input list is
/// non-empty.
pub fn fuse<Id>(sources: &[SourceList<Id>], k: u32, early_stop_threshold: f32) -> Vec<FusedResult<Id>>
where
    Id: Clone + Eq + Hash + Ord,
{
    let mut scores: HashMap<Id, f32> = HashMap::new();
    let mut ranks: HashMap<Id, HashMap<String, usize>> = HashMap::new();
    // First-seen order, used as the final tie-break so fusion is
    // deterministic regardless of hash-map iteration order.
    let mut first_seen_order: HashMap<Id, usize> = HashMap::new();
    let mut next_order = 0usize;

    for source in sources {
        for (rank, id) in source.ranked_ids.iter().enumerate() {
            let contribution = source.weight / (k as f32 + rank as f32 + 1.0);
            *scores.entry(id.clone()).or_insert(0.0) += contribution;
            ranks
                .entry(id.clone())
                .or_default()
                .insert(source.name.clone(), rank);
            first_seen_order.entry(id.clone()).or_insert_with(|| {
                let order = next_order;
                next_order += 1;
                order
            });
        }
    }

    let mut candidates: Vec<Id> = scores.keys().cloned().collect();
    candidates.sort_by(|a, b| {
        let score_a = scores[a];
        let score_b = scores[b];
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| best_rank_of(&ranks[a]).cmp(&best_rank_of(&ranks[b])))
            .then_with(|| first_seen_order[a].cmp(&first_seen_order[b]))
    });

    if candidates.is_empty() {
        return Vec::new();
    }

    let best_score = scores[&candidates[0]];
    let cutoff = best_score * early_stop_threshold;

    let mut results = Vec::with_capacity(candidates.len());
    let mut below_cutoff_run = 0usize;
    for id in candidates {
        let score = scores[&id];
        if !results.is_empty() {
            if score < cutoff {
                below_cutoff_run += 1;
            } else {
                below_cutoff_run = 0;
            }
            if below_cutoff_run >= EARLY_STOP_RUN {
                break;
            }
        }
        let contributing_ranks = ranks.remove(&id).unwrap_or_default();
        results.push(FusedResult {
            id,
            score,
            contributing_ranks,
        });
    }

    results
}

/// Best (lowest) rank a candidate achieved across any source, used to
/// break exact score ties in favor of whichever candidate ranked higher
/// somewhere.
fn best_rank_of(per_source: &HashMap<String, usize>) -> usize {
    per_source.values().copied().min().unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_preserves_its_own_ranking() {
        let sources = vec![SourceList::new("vector", 1.0, vec!["a", "b", "c"])];
        let fused = fuse(&sources, 60, 0.05);
        assert_eq!(fused.iter().map(|r| r.id).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn agreement_across_sources_outranks_a_single_strong_source() {
        let sources = vec![
            SourceList::new("vector", 1.0, vec!["a", "b", "c"]),
            SourceList::new("lexical", 1.0, vec!["b", "a", "d"]),
        ];
        let fused = fuse(&sources, 60, 0.05);
        // "a" and "b" both appear near the top of both lists; either may
        // lead depending on exact rank math, but both must outrank "d"
        // and "c", which only one source surfaced.
        let position = |id: &str| fused.iter().position(|r| r.id == id).unwrap();
        assert!(position("a") < position("d"));
        assert!(position("b") < position("c"));
    }

    #[test]
    fn weight_scales_a_sources_contribution() {
        let heavy = vec![
            SourceList::new("memory", 3.0, vec!["x"]),
            SourceList::new("vector", 1.0, vec!["y"]),
        ];
        let fused = fuse(&heavy, 60, 0.05);
        assert_eq!(fused[0].id, "x");
    }

    #[test]
    fn empty_sources_produce_no_results() {
        let sources: Vec<SourceList<&str>> = vec![];
        assert!(fuse(&sources, 60, 0.05).is_empty());
    }

    #[test]
    fn at_least_one_result_survives_a_strict_cutoff() {
        let sources = vec![SourceList::new("vector", 1.0, vec!["solo"])];
        let fused = fuse(&sources, 60, 0.99);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].id, "solo");
    }

    #[test]
    fn tie_is_broken_by_first_seen_order() {
        let sources = vec![SourceList::new("vector", 1.0, vec!["first", "second"])];
        // Both ids score distinctly by rank, so force an explicit tie by
        // feeding two disjoint equal-weight single-entry lists.
        let tied = vec![
            SourceList::new("a", 1.0, vec!["p"]),
            SourceList::new("b", 1.0, vec!["q"]),
        ];
        let fused = fuse(&tied, 60, 0.05);
        assert_eq!(fused[0].id, "p");
        let _ = sources;
    }
}
