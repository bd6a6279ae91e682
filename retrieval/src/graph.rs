//! Budget-bounded graph traversal over reference edges, starting from a
//! set of seed spans. Two expansion orders are supported: breadth-first
//! (shallow, even coverage) and quality-first (expand the
//! highest-confidence frontier node next, favoring depth along strong
//! edges).

use codeintel_core::identity::SpanId;
use codeintel_core::model::{EdgeType, ReferenceEdge, StoppingCondition};
use codeintel_core::tokenizer::estimate_tokens;
use codeintel_storage::StorageFacade;
use std::collections::{HashSet, VecDeque};
use tracing::warn;

/// Model id used only to pick a characters-per-token ratio for the
/// traversal's own lightweight cost estimate; unrelated to whatever model
/// will eventually consume the assembled bundle.
const COST_ESTIMATE_MODEL: &str = "claude";

/// One node reached during traversal, with the confidence of the edge
/// chain that reached it and the depth at which it was first visited.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitedSpan {
    pub span_id: SpanId,
    pub depth: u32,
    pub confidence: f32,
}

/// The result of one traversal run.
#[derive(Debug, Clone)]
pub struct GraphTraversalOutput {
    pub visited: Vec<VisitedSpan>,
    pub edges: Vec<ReferenceEdge>,
    pub tokens_used: i64,
    pub truncated: bool,
    pub stopping_conditions: Vec<StoppingCondition>,
}

/// How the traversal frontier is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionOrder {
    /// Pop the oldest-queued frontier node first: even, shallow coverage.
    Breadth,
    /// Pop the highest-confidence frontier node first: follows strong
    /// edges deeper before weaker ones are explored at all.
    QualityFirst,
}

struct Pending {
    span_id: SpanId,
    depth: u32,
    confidence: f32,
}

/// Traverse the reference graph starting from `seeds`, up to `max_depth`
/// hops and `token_budget` estimated tokens of visited span content.
///
/// Storage errors during expansion are absorbed into `truncated = true`
/// rather than propagated, so a backend hiccup mid-traversal degrades the
/// result instead of failing the whole request.
pub async fn traverse(
    storage: &dyn StorageFacade,
    seeds: &[SpanId],
    max_depth: u32,
    token_budget: i64,
    order: ExpansionOrder,
    edge_types: Option<&[EdgeType]>,
) -> GraphTraversalOutput {
    let mut visited: Vec<VisitedSpan> = Vec::new();
    let mut visited_ids: HashSet<SpanId> = HashSet::new();
    let mut edges: Vec<ReferenceEdge> = Vec::new();
    let mut tokens_used: i64 = 0;
    let mut truncated = false;
    let mut conditions = Vec::new();

    let mut pending: VecDeque<Pending> = seeds
        .iter()
        .map(|id| Pending {
            span_id: *id,
            depth: 0,
            confidence: 1.0,
        })
        .collect();

    while let Some(next) = pop_next(&mut pending, order) {
        if visited_ids.contains(&next.span_id) {
            continue;
        }
        if next.depth > max_depth {
            continue;
        }

        let span = match storage.get_span(next.span_id).await {
            Ok(Some(span)) => span,
            Ok(None) => continue,
            Err(err) => {
                warn!(span_id = %next.span_id, error = %err, "graph traversal: span lookup failed, truncating");
                truncated = true;
                break;
            }
        };

        let span_text = [span.name.as_deref(), span.signature.as_deref(), span.doc.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let cost = estimate_tokens(&span_text, COST_ESTIMATE_MODEL) as i64;

        if tokens_used + cost > token_budget {
            truncated = true;
            conditions.push(StoppingCondition::token_budget(format!(
                "graph traversal stopped at {} visited nodes: next node would exceed the {}-token budget",
                visited.len(),
                token_budget
            )));
            break;
        }

        tokens_used += cost;
        visited_ids.insert(next.span_id);
        visited.push(VisitedSpan {
            span_id: next.span_id,
            depth: next.depth,
            confidence: next.confidence,
        });

        if next.depth == max_depth {
            continue;
        }

        match storage.graph_neighbors(&[next.span_id], edge_types).await {
            Ok(neighbor_edges) => {
                for edge in neighbor_edges {
                    let neighbor_confidence = next.confidence * edge.confidence;
                    if !visited_ids.contains(&edge.target_id) {
                        pending.push_back(Pending {
                            span_id: edge.target_id,
                            depth: next.depth + 1,
                            confidence: neighbor_confidence,
                        });
                    }
                    edges.push(edge);
                }
            }
            Err(err) => {
                warn!(span_id = %next.span_id, error = %err, "graph traversal: neighbor lookup failed, truncating");
                truncated = true;
                break;
            }
        }
    }

    if truncated && conditions.is_empty() {
        conditions.push(StoppingCondition::graph_truncated(format!(
            "visited {} nodes before stopping early",
            visited.len()
        )));
    }

    GraphTraversalOutput {
        visited,
        edges,
        tokens_used,
        truncated,
        stopping_conditions: conditions,
    }
}

fn pop_next(pending: &mut VecDeque<Pending>, order: ExpansionOrder) -> Option<Pending> {
    match order {
        ExpansionOrder::Breadth => pending.pop_front(),
        ExpansionOrder::QualityFirst => {
            if pending.is_empty() {
                return None;
            }
            let mut best_idx = 0;
            for (idx, candidate) in pending.iter().enumerate() {
                if candidate.confidence > pending[best_idx].confidence {
                    best_idx = idx;
                }
            }
            pending.remove(best_idx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_core::model::{Span, SpanKind};
    use codeintel_storage::InMemoryStorage;

    fn make_span(repo: &str, path: &str, name: &str, start: u32) -> Span {
        let name = Some(name.to_string());
        let signature = name.as_ref().map(|n| format!("fn {n}()"));
        let id = Span::compute_id(
            repo,
            path,
            start,
            start + 10,
            SpanKind::Function,
            &name,
            &signature,
            &None,
            &[],
        );
        Span {
            id,
            repo: repo.to_string(),
            path: path.to_string(),
            byte_start: start,
            byte_end: start + 10,
            kind: SpanKind::Function,
            name,
            signature,
            doc: None,
            parent_ids: vec![],
            references: vec![],
        }
    }

    #[tokio::test]
    async fn traversal_visits_seeds_with_no_neighbors() {
        let storage = InMemoryStorage::new();
        let span = make_span("repo", "a.rs", "root", 0);
        storage.insert_span(span.clone()).await.unwrap();

        let out = traverse(&storage, &[span.id], 3, 10_000, ExpansionOrder::Breadth, None).await;
        assert_eq!(out.visited.len(), 1);
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn traversal_follows_edges_up_to_max_depth() {
        let storage = InMemoryStorage::new();
        let root = make_span("repo", "a.rs", "root", 0);
        let child = make_span("repo", "a.rs", "child", 20);
        let grandchild = make_span("repo", "a.rs", "grandchild", 40);
        storage.insert_span(root.clone()).await.unwrap();
        storage.insert_span(child.clone()).await.unwrap();
        storage.insert_span(grandchild.clone()).await.unwrap();
        storage
            .insert_edge_for_test(ReferenceEdge {
                source_id: root.id,
                target_id: child.id,
                edge_type: EdgeType::Calls,
                confidence: 0.9,
            })
            .unwrap();
        storage
            .insert_edge_for_test(ReferenceEdge {
                source_id: child.id,
                target_id: grandchild.id,
                edge_type: EdgeType::Calls,
                confidence: 0.9,
            })
            .unwrap();

        let out = traverse(&storage, &[root.id], 1, 10_000, ExpansionOrder::Breadth, None).await;
        let visited_ids: Vec<_> = out.visited.iter().map(|v| v.span_id).collect();
        assert!(visited_ids.contains(&root.id));
        assert!(visited_ids.contains(&child.id));
        assert!(!visited_ids.contains(&grandchild.id));
    }

    #[tokio::test]
    async fn tight_token_budget_truncates_and_records_a_stopping_condition() {
        let storage = InMemoryStorage::new();
        let root = make_span("repo", "a.rs", "root", 0);
        let child = make_span("repo", "a.rs", "child", 20);
        storage.insert_span(root.clone()).await.unwrap();
        storage.insert_span(child.clone()).await.unwrap();
        storage
            .insert_edge_for_test(ReferenceEdge {
                source_id: root.id,
                target_id: child.id,
                edge_type: EdgeType::Calls,
                confidence: 0.9,
            })
            .unwrap();

        let out = traverse(&storage, &[root.id], 3, 1, ExpansionOrder::Breadth, None).await;
        assert!(out.truncated);
        assert!(!out.stopping_conditions.is_empty());
    }
}
