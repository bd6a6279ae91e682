//! Cache fabric trait and namespace definitions.

use async_trait::async_trait;
use codeintel_core::error::CacheError;
use codeintel_core::identity::CacheKey;
use std::future::Future;
use std::pin::Pin;

pub type CacheResult<T> = Result<T, CacheError>;

/// One of the four independently configured cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Search,
    Bundle,
    Index,
    Metadata,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Search => "search",
            CacheNamespace::Bundle => "bundle",
            CacheNamespace::Index => "index",
            CacheNamespace::Metadata => "metadata",
        }
    }

    pub const ALL: [CacheNamespace; 4] = [
        CacheNamespace::Search,
        CacheNamespace::Bundle,
        CacheNamespace::Index,
        CacheNamespace::Metadata,
    ];
}

/// Statistics for a single namespace, feeding `get_health`'s warning flags
/// (hit_rate < 0.3, memory > 100 MB, eviction_rate > 10%).
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub evictions: u64,
    pub size_bytes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn eviction_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.evictions as f64 / total as f64
        }
    }
}

/// Whether a `get` call was satisfied from cache or required a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheGetOutcome {
    Hit,
    Miss,
}

/// A fetch callback used by `get_or_fetch` on a cache miss. Returns `None`
/// when the underlying source has nothing for the key (not cached).
pub type FetchFn<'a> =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = CacheResult<Option<serde_json::Value>>> + Send + 'a>> + Send + 'a>;

/// The cache fabric: read-through access to four namespaces plus
/// targeted invalidation.
#[async_trait]
pub trait CacheFabric: Send + Sync {
    /// Read-through get: return the cached value, or on miss await
    /// `fetch_fn`, store the result if it is non-null, and return it tagged
    /// with the outcome.
    async fn get_or_fetch<'a>(
        &'a self,
        namespace: CacheNamespace,
        key: CacheKey,
        fetch_fn: FetchFn<'a>,
    ) -> CacheResult<(Option<serde_json::Value>, CacheGetOutcome)>;

    async fn set(
        &self,
        namespace: CacheNamespace,
        key: CacheKey,
        value: serde_json::Value,
        ttl_override_secs: Option<u64>,
    ) -> CacheResult<()>;

    async fn get_raw(&self, namespace: CacheNamespace, key: CacheKey) -> CacheResult<Option<serde_json::Value>>;

    async fn delete(&self, namespace: CacheNamespace, key: CacheKey) -> CacheResult<()>;

    async fn clear(&self, namespace: CacheNamespace) -> CacheResult<u64>;

    /// Walk the `bundle` namespace and remove entries whose stored value
    /// carries this signature (matched via a `"signature"` field in the
    /// cached JSON payload).
    async fn invalidate_by_signature(&self, signature: &str) -> CacheResult<u64>;

    /// Clear `search` entries whose key hash space contains the file's
    /// basename, and bundles whose evidence references that path.
    async fn invalidate_on_file_change(&self, path: &str) -> CacheResult<u64>;

    /// Clear `search`, `bundle`, and `index` wholesale for a repository.
    async fn invalidate_on_repo_change(&self, repo: &str) -> CacheResult<u64>;

    async fn stats(&self, namespace: CacheNamespace) -> CacheResult<CacheStats>;
}
