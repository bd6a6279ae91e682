//! The storage facade: the typed interface the retrieval pipeline
//! consumes. The backing engine (a transactional relational+FTS store) is
//! intentionally out of scope; this trait is the seam a real implementation
//! plugs into.

use async_trait::async_trait;
use codeintel_core::error::StorageError;
use codeintel_core::filter::FilterExpr;
use codeintel_core::identity::{ChunkId, SpanId};
use codeintel_core::model::{Chunk, EdgeType, Embedding, File, ReferenceEdge, Span};

/// Result alias for storage facade operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A scored chunk hit from a search operation.
pub type ChunkHit = (ChunkId, f32);

/// A scored span hit from symbol search.
pub type SpanHit = (SpanId, f32);

/// A scored memory hit, returned by the optional memory collaborator.
pub type MemoryHit = (String, f32);

/// Scope for a memory search, narrowing results to a repo and/or logical
/// scope identifier.
#[derive(Debug, Clone, Default)]
pub struct MemoryScope {
    pub scope: Option<String>,
    pub repo: Option<String>,
}

/// The typed interface the retrieval pipeline consumes.
///
/// All operations may raise a transient [`StorageError::Unavailable`]
/// (retried by the reliability envelope) or a permanent
/// [`StorageError::Conflict`]/[`StorageError::NotFound`] (surfaced as-is).
/// Reads are snapshot-consistent within a single operation.
#[async_trait]
pub trait StorageFacade: Send + Sync {
    async fn upsert_file(&self, file: File) -> StorageResult<()>;
    async fn get_file(&self, repo: &str, path: &str) -> StorageResult<Option<File>>;

    async fn insert_span(&self, span: Span) -> StorageResult<()>;
    async fn bulk_insert_spans(&self, spans: Vec<Span>) -> StorageResult<()>;
    async fn delete_spans_by_file(&self, repo: &str, path: &str) -> StorageResult<u64>;
    async fn get_span(&self, span_id: SpanId) -> StorageResult<Option<Span>>;

    async fn insert_chunk(&self, chunk: Chunk) -> StorageResult<()>;
    async fn bulk_insert_chunks(&self, chunks: Vec<Chunk>) -> StorageResult<()>;
    async fn get_chunk(&self, chunk_id: ChunkId) -> StorageResult<Option<Chunk>>;

    async fn set_embedding(&self, embedding: Embedding) -> StorageResult<()>;

    async fn vector_search(
        &self,
        query_vector: &[f32],
        model_id: &str,
        k: usize,
        filters: &[FilterExpr],
    ) -> StorageResult<Vec<ChunkHit>>;

    async fn lexical_search(
        &self,
        query_text: &str,
        k: usize,
        filters: &[FilterExpr],
    ) -> StorageResult<Vec<ChunkHit>>;

    async fn symbol_search(
        &self,
        query_text: &str,
        k: usize,
        filters: &[FilterExpr],
    ) -> StorageResult<Vec<SpanHit>>;

    /// Optional collaborator; implementations with no memory backend should
    /// return an empty list rather than an error.
    async fn memory_search(
        &self,
        query_text: &str,
        k: usize,
        scope: &MemoryScope,
    ) -> StorageResult<Vec<MemoryHit>>;

    async fn graph_neighbors(
        &self,
        symbol_ids: &[SpanId],
        edge_types: Option<&[EdgeType]>,
    ) -> StorageResult<Vec<ReferenceEdge>>;

    /// Run `work` as a single ACID transaction. All multi-row writes go
    /// through this rather than issuing bare inserts.
    async fn transaction(
        &self,
        work: Box<dyn FnOnce() -> StorageResult<()> + Send>,
    ) -> StorageResult<()>;
}
