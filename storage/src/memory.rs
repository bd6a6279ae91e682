//! A reference, fully in-memory implementation of [`StorageFacade`], useful
//! for tests and as the default when no transactional relational+FTS store is
//! configured.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use codeintel_core::error::StorageError;
use codeintel_core::filter::{FilterExpr, FilterOperator};
use codeintel_core::identity::{ChunkId, ContentIdType, SpanId};
use codeintel_core::model::{Chunk, EdgeType, Embedding, File, ReferenceEdge, Span};

use crate::facade::{ChunkHit, MemoryHit, MemoryScope, SpanHit, StorageFacade, StorageResult};

#[derive(Default)]
struct Tables {
    files: HashMap<(String, String), File>,
    spans: HashMap<SpanId, Span>,
    spans_by_file: HashMap<(String, String), Vec<SpanId>>,
    chunks: HashMap<ChunkId, Chunk>,
    chunks_by_span: HashMap<SpanId, Vec<ChunkId>>,
    embeddings: HashMap<(ChunkId, String), Embedding>,
    edges: Vec<ReferenceEdge>,
}

/// An in-memory [`StorageFacade`]. Not crash-consistent, not concurrent
/// across processes; intended for tests and single-process reference use.
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn matches_filters(value: &serde_json::Value, filters: &[FilterExpr]) -> bool {
        filters.iter().all(|f| Self::matches_one(value, f))
    }

    fn matches_one(value: &serde_json::Value, filter: &FilterExpr) -> bool {
        let field_value = value.get(&filter.field);
        match filter.operator {
            FilterOperator::Eq => field_value == Some(&filter.value),
            FilterOperator::Ne => field_value != Some(&filter.value),
            FilterOperator::Contains => match (field_value.and_then(|v| v.as_str()), filter.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            FilterOperator::In => match filter.value.as_array() {
                Some(list) => field_value.map(|v| list.contains(v)).unwrap_or(false),
                None => false,
            },
            // Ordering/regex/logical composition are left to a real query engine;
            // the in-memory reference treats anything else as non-matching.
            _ => false,
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageFacade for InMemoryStorage {
    async fn upsert_file(&self, file: File) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        tables.files.insert((file.repo.clone(), file.path.clone()), file);
        Ok(())
    }

    async fn get_file(&self, repo: &str, path: &str) -> StorageResult<Option<File>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        Ok(tables.files.get(&(repo.to_string(), path.to_string())).cloned())
    }

    async fn insert_span(&self, span: Span) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        tables
            .spans_by_file
            .entry((span.repo.clone(), span.path.clone()))
            .or_default()
            .push(span.id);
        tables.spans.insert(span.id, span);
        Ok(())
    }

    async fn bulk_insert_spans(&self, spans: Vec<Span>) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        for span in spans {
            tables
                .spans_by_file
                .entry((span.repo.clone(), span.path.clone()))
                .or_default()
                .push(span.id);
            tables.spans.insert(span.id, span);
        }
        Ok(())
    }

    async fn delete_spans_by_file(&self, repo: &str, path: &str) -> StorageResult<u64> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        let key = (repo.to_string(), path.to_string());
        let ids = tables.spans_by_file.remove(&key).unwrap_or_default();
        for id in &ids {
            tables.spans.remove(id);
            if let Some(chunk_ids) = tables.chunks_by_span.remove(id) {
                for chunk_id in chunk_ids {
                    tables.chunks.remove(&chunk_id);
                }
            }
        }
        Ok(ids.len() as u64)
    }

    async fn get_span(&self, span_id: SpanId) -> StorageResult<Option<Span>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        Ok(tables.spans.get(&span_id).cloned())
    }

    async fn insert_chunk(&self, chunk: Chunk) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        tables
            .chunks_by_span
            .entry(chunk.span_id)
            .or_default()
            .push(chunk.id);
        tables.chunks.insert(chunk.id, chunk);
        Ok(())
    }

    async fn bulk_insert_chunks(&self, chunks: Vec<Chunk>) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        for chunk in chunks {
            tables
                .chunks_by_span
                .entry(chunk.span_id)
                .or_default()
                .push(chunk.id);
            tables.chunks.insert(chunk.id, chunk);
        }
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: ChunkId) -> StorageResult<Option<Chunk>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        Ok(tables.chunks.get(&chunk_id).cloned())
    }

    async fn set_embedding(&self, embedding: Embedding) -> StorageResult<()> {
        if !embedding.is_valid() {
            return Err(StorageError::Conflict {
                entity: "embedding",
                reason: "vector length does not match declared dimension".to_string(),
            });
        }
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        tables
            .embeddings
            .insert((embedding.chunk_id, embedding.model_id.clone()), embedding);
        Ok(())
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        model_id: &str,
        k: usize,
        _filters: &[FilterExpr],
    ) -> StorageResult<Vec<ChunkHit>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        let query = Embedding {
            chunk_id: ChunkId::nil(),
            model_id: model_id.to_string(),
            dim: query_vector.len() as u32,
            vector: query_vector.to_vec(),
        };
        let mut scored: Vec<ChunkHit> = tables
            .embeddings
            .values()
            .filter(|e| e.model_id == model_id)
            .filter_map(|e| query.cosine_similarity(e).ok().map(|score| (e.chunk_id, score)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn lexical_search(
        &self,
        query_text: &str,
        k: usize,
        _filters: &[FilterExpr],
    ) -> StorageResult<Vec<ChunkHit>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        let needle = query_text.to_lowercase();
        let terms: Vec<&str> = needle.split_whitespace().collect();
        let mut scored: Vec<ChunkHit> = tables
            .chunks
            .values()
            .filter_map(|chunk| {
                let haystack = chunk.content.to_lowercase();
                let matches = terms.iter().filter(|t| haystack.contains(*t)).count();
                if matches == 0 {
                    None
                } else {
                    Some((chunk.id, matches as f32 / terms.len().max(1) as f32))
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn symbol_search(
        &self,
        query_text: &str,
        k: usize,
        _filters: &[FilterExpr],
    ) -> StorageResult<Vec<SpanHit>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        let needle = query_text.to_lowercase();
        let mut scored: Vec<SpanHit> = tables
            .spans
            .values()
            .filter_map(|span| {
                let name = span.name.as_deref()?.to_lowercase();
                if name == needle {
                    Some((span.id, 1.0))
                } else if name.contains(&needle) {
                    Some((span.id, 0.5))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn memory_search(
        &self,
        _query_text: &str,
        _k: usize,
        _scope: &MemoryScope,
    ) -> StorageResult<Vec<MemoryHit>> {
        // No memory collaborator configured for the in-memory reference.
        Ok(Vec::new())
    }

    async fn graph_neighbors(
        &self,
        symbol_ids: &[SpanId],
        edge_types: Option<&[EdgeType]>,
    ) -> StorageResult<Vec<ReferenceEdge>> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        let ids: std::collections::HashSet<SpanId> = symbol_ids.iter().copied().collect();
        Ok(tables
            .edges
            .iter()
            .filter(|e| ids.contains(&e.source_id))
            .filter(|e| edge_types.map(|types| types.contains(&e.edge_type)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn transaction(
        &self,
        work: Box<dyn FnOnce() -> StorageResult<()> + Send>,
    ) -> StorageResult<()> {
        let _guard = self.tables.write().map_err(|_| lock_poisoned())?;
        work()
    }
}

impl InMemoryStorage {
    /// Insert a reference edge directly; a convenience for tests and fixtures
    /// since the public facade has no single `insert_edge` operation.
    pub fn insert_edge_for_test(&self, edge: ReferenceEdge) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        tables.edges.push(edge);
        Ok(())
    }
}

fn lock_poisoned() -> StorageError {
    StorageError::Unavailable {
        reason: "in-memory storage lock poisoned".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_core::model::SpanKind;

    fn sample_span(repo: &str, path: &str, name: &str) -> Span {
        let id = Span::compute_id(
            repo,
            path,
            0,
            10,
            SpanKind::Function,
            &Some(name.to_string()),
            &None,
            &None,
            &[],
        );
        Span {
            id,
            repo: repo.to_string(),
            path: path.to_string(),
            byte_start: 0,
            byte_end: 10,
            kind: SpanKind::Function,
            name: Some(name.to_string()),
            signature: None,
            doc: None,
            parent_ids: Vec::new(),
            references: Vec::new(),
        }
    }

    fn sample_chunk(span: &Span, content: &str) -> Chunk {
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

    #[tokio::test]
    async fn insert_and_get_file_round_trips() {
        let storage = InMemoryStorage::new();
        let file = File {
            repo: "r".into(),
            path: "p.rs".into(),
            content_hash: codeintel_core::identity::content_hash_hex(
                &codeintel_core::identity::compute_content_hash(b"hi"),
            ),
            lang: "rust".into(),
        };
        storage.upsert_file(file.clone()).await.unwrap();
        let fetched = storage.get_file("r", "p.rs").await.unwrap();
        assert_eq!(fetched, Some(file));
    }

    #[tokio::test]
    async fn delete_spans_by_file_cascades_to_chunks() {
        let storage = InMemoryStorage::new();
        let span = sample_span("r", "p.rs", "foo");
        storage.insert_span(span.clone()).await.unwrap();
        let chunk = sample_chunk(&span, "fn foo() {}");
        storage.insert_chunk(chunk.clone()).await.unwrap();

        let deleted = storage.delete_spans_by_file("r", "p.rs").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(storage.get_span(span.id).await.unwrap().is_none());
        assert!(storage.get_chunk(chunk.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn symbol_search_prefers_exact_match() {
        let storage = InMemoryStorage::new();
        storage.insert_span(sample_span("r", "a.rs", "parse")).await.unwrap();
        storage.insert_span(sample_span("r", "b.rs", "parse_all")).await.unwrap();
        let hits = storage.symbol_search("parse", 10, &[]).await.unwrap();
        assert_eq!(hits[0].1, 1.0);
    }

    #[tokio::test]
    async fn lexical_search_scores_by_term_overlap() {
        let storage = InMemoryStorage::new();
        let span = sample_span("r", "a.rs", "foo");
        storage.insert_span(span.clone()).await.unwrap();
        let chunk = sample_chunk(&span, "fn foo() { parse_tree() }");
        storage.insert_chunk(chunk).await.unwrap();
        let hits = storage.lexical_search("parse tree", 10, &[]).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
