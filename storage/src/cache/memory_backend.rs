//! In-memory reference implementation of the cache fabric: one LRU, per
//! namespace, with lazy TTL expiry on access and a periodic sweep.

use super::fabric::{CacheFabric, CacheGetOutcome, CacheNamespace, CacheResult, CacheStats, FetchFn};
use async_trait::async_trait;
use codeintel_core::config::CacheConfig;
use codeintel_core::error::CacheError;
use codeintel_core::identity::{CacheKey, Timestamp};
use codeintel_core::model::CacheEntryMeta;
use chrono::Utc;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

struct Entry {
    value: serde_json::Value,
    meta: CacheEntryMeta,
}

struct NamespaceCache {
    entries: LruCache<CacheKey, Entry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl NamespaceCache {
    fn new(max_entries: usize, ttl_secs: u64) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).expect("max_entries clamped to >= 1");
        Self {
            entries: LruCache::new(cap),
            ttl: Duration::from_secs(ttl_secs),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn sweep_expired(&mut self, now: Timestamp) {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.meta.expires_at <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in expired {
            self.entries.pop(&key);
            self.evictions += 1;
        }
    }

    fn get(&mut self, key: &CacheKey, now: Timestamp) -> Option<serde_json::Value> {
        let expired = self.entries.peek(key).map(|e| e.meta.expires_at <= now);
        match expired {
            Some(true) => {
                self.entries.pop(key);
                self.evictions += 1;
                self.misses += 1;
                None
            }
            Some(false) => {
                self.hits += 1;
                let entry = self.entries.get_mut(key).expect("just peeked present");
                entry.meta.access_count += 1;
                entry.meta.last_accessed = now;
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn put(&mut self, key: CacheKey, value: serde_json::Value, ttl_override_secs: Option<u64>, now: Timestamp) {
        let ttl = ttl_override_secs.map(Duration::from_secs).unwrap_or(self.ttl);
        let size_bytes = value.to_string().len() as u64;
        let entry = Entry {
            value,
            meta: CacheEntryMeta {
                created_at: now,
                expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
                access_count: 0,
                last_accessed: now,
                size_bytes,
            },
        };
        self.entries.put(key, entry);
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entry_count: self.entries.len() as u64,
            evictions: self.evictions,
            size_bytes: self.entries.iter().map(|(_, e)| e.meta.size_bytes).sum(),
        }
    }
}

fn lock_poisoned() -> CacheError {
    CacheError::Unavailable {
        reason: "cache lock poisoned".to_string(),
    }
}

/// In-memory cache fabric: four independent per-namespace LRUs, built from
/// a validated [`CacheConfig`].
pub struct InMemoryCacheFabric {
    search: Mutex<NamespaceCache>,
    bundle: Mutex<NamespaceCache>,
    index: Mutex<NamespaceCache>,
    metadata: Mutex<NamespaceCache>,
}

impl InMemoryCacheFabric {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            search: Mutex::new(NamespaceCache::new(config.search.max_entries, config.search.ttl_secs)),
            bundle: Mutex::new(NamespaceCache::new(config.bundle.max_entries, config.bundle.ttl_secs)),
            index: Mutex::new(NamespaceCache::new(config.index.max_entries, config.index.ttl_secs)),
            metadata: Mutex::new(NamespaceCache::new(config.metadata.max_entries, config.metadata.ttl_secs)),
        }
    }

    fn namespace(&self, ns: CacheNamespace) -> &Mutex<NamespaceCache> {
        match ns {
            CacheNamespace::Search => &self.search,
            CacheNamespace::Bundle => &self.bundle,
            CacheNamespace::Index => &self.index,
            CacheNamespace::Metadata => &self.metadata,
        }
    }

    /// Drop expired entries across every namespace; intended to be driven by
    /// a periodic task at `CacheConfig::sweep_interval_secs`.
    pub fn sweep(&self) -> CacheResult<()> {
        let now = Utc::now();
        for ns in CacheNamespace::ALL {
            self.namespace(ns).lock().map_err(|_| lock_poisoned())?.sweep_expired(now);
        }
        Ok(())
    }

    /// Best-effort substring match over an entry's serialized value, used by
    /// the invalidation hooks below. A real backend would index entries by
    /// the repo/path they were derived from instead of scanning content.
    fn invalidate_matching<F>(&self, ns: CacheNamespace, predicate: F) -> CacheResult<u64>
    where
        F: Fn(&str) -> bool,
    {
        let mut cache = self.namespace(ns).lock().map_err(|_| lock_poisoned())?;
        let matches: Vec<CacheKey> = cache
            .entries
            .iter()
            .filter(|(_, entry)| predicate(&entry.value.to_string()))
            .map(|(key, _)| *key)
            .collect();
        let removed = matches.len() as u64;
        for key in matches {
            cache.entries.pop(&key);
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheFabric for InMemoryCacheFabric {
    async fn get_or_fetch<'a>(
        &'a self,
        namespace: CacheNamespace,
        key: CacheKey,
        fetch_fn: FetchFn<'a>,
    ) -> CacheResult<(Option<serde_json::Value>, CacheGetOutcome)> {
        let now = Utc::now();
        let cached = self
            .namespace(namespace)
            .lock()
            .map_err(|_| lock_poisoned())?
            .get(&key, now);
        if let Some(value) = cached {
            return Ok((Some(value), CacheGetOutcome::Hit));
        }
        let fetched = fetch_fn().await?;
        if let Some(value) = &fetched {
            self.namespace(namespace)
                .lock()
                .map_err(|_| lock_poisoned())?
                .put(key, value.clone(), None, now);
        }
        Ok((fetched, CacheGetOutcome::Miss))
    }

    async fn set(
        &self,
        namespace: CacheNamespace,
        key: CacheKey,
        value: serde_json::Value,
        ttl_override_secs: Option<u64>,
    ) -> CacheResult<()> {
        let now = Utc::now();
        self.namespace(namespace)
            .lock()
            .map_err(|_| lock_poisoned())?
            .put(key, value, ttl_override_secs, now);
        Ok(())
    }

    async fn get_raw(&self, namespace: CacheNamespace, key: CacheKey) -> CacheResult<Option<serde_json::Value>> {
        let now = Utc::now();
        Ok(self.namespace(namespace).lock().map_err(|_| lock_poisoned())?.get(&key, now))
    }

    async fn delete(&self, namespace: CacheNamespace, key: CacheKey) -> CacheResult<()> {
        self.namespace(namespace).lock().map_err(|_| lock_poisoned())?.entries.pop(&key);
        Ok(())
    }

    async fn clear(&self, namespace: CacheNamespace) -> CacheResult<u64> {
        let mut cache = self.namespace(namespace).lock().map_err(|_| lock_poisoned())?;
        let count = cache.entries.len() as u64;
        cache.entries.clear();
        Ok(count)
    }

    async fn invalidate_by_signature(&self, signature: &str) -> CacheResult<u64> {
        self.invalidate_matching(CacheNamespace::Bundle, |serialized| serialized.contains(signature))
    }

    async fn invalidate_on_file_change(&self, path: &str) -> CacheResult<u64> {
        let search_removed = self.invalidate_matching(CacheNamespace::Search, |s| s.contains(path))?;
        let bundle_removed = self.invalidate_matching(CacheNamespace::Bundle, |s| s.contains(path))?;
        Ok(search_removed + bundle_removed)
    }

    async fn invalidate_on_repo_change(&self, repo: &str) -> CacheResult<u64> {
        let search_removed = self.invalidate_matching(CacheNamespace::Search, |s| s.contains(repo))?;
        let bundle_removed = self.invalidate_matching(CacheNamespace::Bundle, |s| s.contains(repo))?;
        let index_removed = self.invalidate_matching(CacheNamespace::Index, |s| s.contains(repo))?;
        Ok(search_removed + bundle_removed + index_removed)
    }

    async fn stats(&self, namespace: CacheNamespace) -> CacheResult<CacheStats> {
        Ok(self.namespace(namespace).lock().map_err(|_| lock_poisoned())?.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_core::identity::ContentIdType;

    fn fabric() -> InMemoryCacheFabric {
        InMemoryCacheFabric::new(&CacheConfig::default())
    }

    fn no_fetch<'a>() -> FetchFn<'a> {
        Box::new(|| Box::pin(async { Ok(None) }))
    }

    #[tokio::test]
    async fn set_then_get_is_a_hit() {
        let cache = fabric();
        let key = CacheKey::from_fields(&[("q", "foo".into())]);
        cache.set(CacheNamespace::Search, key, serde_json::json!({"hits": 3}), None).await.unwrap();
        let (value, outcome) = cache.get_or_fetch(CacheNamespace::Search, key, no_fetch()).await.unwrap();
        assert_eq!(outcome, CacheGetOutcome::Hit);
        assert_eq!(value.unwrap()["hits"], 3);
    }

    #[tokio::test]
    async fn miss_invokes_fetch_and_populates_cache() {
        let cache = fabric();
        let key = CacheKey::from_fields(&[("q", "bar".into())]);
        let fetch: FetchFn = Box::new(|| Box::pin(async { Ok(Some(serde_json::json!({"v": 1}))) }));
        let (value, outcome) = cache.get_or_fetch(CacheNamespace::Search, key, fetch).await.unwrap();
        assert_eq!(outcome, CacheGetOutcome::Miss);
        assert_eq!(value.unwrap()["v"], 1);

        let (cached, outcome) = cache.get_or_fetch(CacheNamespace::Search, key, no_fetch()).await.unwrap();
        assert_eq!(outcome, CacheGetOutcome::Hit);
        assert_eq!(cached.unwrap()["v"], 1);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let mut config = CacheConfig::default();
        config.search.ttl_secs = 0;
        let cache = InMemoryCacheFabric::new(&config);
        let key = CacheKey::from_fields(&[("q", "baz".into())]);
        cache.set(CacheNamespace::Search, key, serde_json::json!({}), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (value, outcome) = cache.get_or_fetch(CacheNamespace::Search, key, no_fetch()).await.unwrap();
        assert_eq!(outcome, CacheGetOutcome::Miss);
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn invalidate_on_repo_change_clears_matching_entries() {
        let cache = fabric();
        let key = CacheKey::from_fields(&[("q", "x".into())]);
        cache
            .set(CacheNamespace::Search, key, serde_json::json!({"repo": "acme/widgets"}), None)
            .await
            .unwrap();
        let removed = cache.invalidate_on_repo_change("acme/widgets").await.unwrap();
        assert_eq!(removed, 1);
        let stats = cache.stats(CacheNamespace::Search).await.unwrap();
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = fabric();
        let key = CacheKey::from_fields(&[("q", "y".into())]);
        let _ = cache.get_or_fetch(CacheNamespace::Search, key, no_fetch()).await.unwrap();
        cache.set(CacheNamespace::Search, key, serde_json::json!({}), None).await.unwrap();
        let _ = cache.get_or_fetch(CacheNamespace::Search, key, no_fetch()).await.unwrap();
        let stats = cache.stats(CacheNamespace::Search).await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.hit_rate() > 0.0);
    }
}
