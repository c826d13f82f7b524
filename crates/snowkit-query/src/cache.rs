//! Result caching

use parking_lot::RwLock;
use snowkit_core::QueryOutput;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::CacheKey;

/// Storage for memoised query results
pub trait ResultCache: Send + Sync {
    /// A live entry for `key`, if any
    fn get(&self, key: &CacheKey) -> Option<Arc<QueryOutput>>;

    /// Store `value`; `ttl = None` keeps it until invalidated
    fn insert(&self, key: CacheKey, value: Arc<QueryOutput>, ttl: Option<Duration>);

    fn invalidate(&self, key: &CacheKey);

    fn clear(&self);

    /// Number of stored entries; expired ones may linger until the next insert
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether reads are memoised. Chosen once when the executor is built.
#[derive(Clone)]
pub enum CacheStrategy {
    Memoize(Arc<dyn ResultCache>),
    Disabled,
}

impl CacheStrategy {
    /// Memoise into a fresh unbounded in-memory cache
    pub fn in_memory() -> Self {
        Self::Memoize(Arc::new(MemoryResultCache::new()))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Memoize(_))
    }
}

impl Default for CacheStrategy {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memoize(cache) => f.debug_tuple("Memoize").field(&cache.len()).finish(),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

struct CachedResult {
    value: Arc<QueryOutput>,
    cached_at: Instant,
    ttl: Option<Duration>,
}

impl CachedResult {
    fn is_live(&self) -> bool {
        self.ttl.is_none_or(|ttl| self.cached_at.elapsed() < ttl)
    }
}

/// In-process result cache with per-entry TTL
///
/// Every insert drops expired entries first. With `max_entries` set,
/// inserting into a cache that is still full evicts the oldest entry.
pub struct MemoryResultCache {
    entries: RwLock<HashMap<CacheKey, CachedResult>>,
    max_entries: Option<usize>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: None,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: Some(max_entries.max(1)),
        }
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        before - entries.len()
    }
}

impl Default for MemoryResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache for MemoryResultCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<QueryOutput>> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_live() => {
                    tracing::debug!(sql = %key.sql(), "cache hit for query result");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    tracing::debug!(sql = %key.sql(), "cache miss for query result");
                    return None;
                }
            }
        }

        tracing::debug!(sql = %key.sql(), "cached query result expired");
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| !entry.is_live()) {
            entries.remove(key);
        }
        None
    }

    fn insert(&self, key: CacheKey, value: Arc<QueryOutput>, ttl: Option<Duration>) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        if entries.len() < before {
            tracing::trace!(purged = before - entries.len(), "dropped expired cached results");
        }
        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.cached_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::trace!(sql = %oldest.sql(), "evicting oldest cached result");
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            CachedResult {
                value,
                cached_at: Instant::now(),
                ttl,
            },
        );
    }

    fn invalidate(&self, key: &CacheKey) {
        self.entries.write().remove(key);
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowkit_core::Value;

    fn key(sql: &str) -> CacheKey {
        CacheKey::new(sql, None).unwrap()
    }

    fn output(n: i64) -> Arc<QueryOutput> {
        Arc::new(QueryOutput::Rows(vec![vec![Value::Int64(n)]]))
    }

    #[test]
    fn test_insert_and_get() {
        let cache = MemoryResultCache::new();
        assert!(cache.get(&key("a")).is_none());

        cache.insert(key("a"), output(1), None);
        assert_eq!(cache.get(&key("a")).as_deref(), Some(&*output(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = MemoryResultCache::new();
        cache.insert(key("a"), output(1), Some(Duration::from_millis(20)));
        assert!(cache.get(&key("a")).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = MemoryResultCache::new();
        cache.insert(key("a"), output(1), Some(Duration::ZERO));
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let cache = MemoryResultCache::with_max_entries(2);
        cache.insert(key("a"), output(1), None);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("b"), output(2), None);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("c"), output(3), None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = MemoryResultCache::new();
        cache.insert(key("a"), output(1), None);
        cache.insert(key("b"), output(2), None);

        cache.invalidate(&key("a"));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_drops_expired_entries() {
        let cache = MemoryResultCache::new();
        for i in 0..1000 {
            cache.insert(key(&format!("SELECT {}", i)), output(i), Some(Duration::from_millis(1)));
        }
        std::thread::sleep(Duration::from_millis(20));

        cache.insert(key("SELECT fresh"), output(-1), None);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("SELECT fresh")).is_some());
    }

    #[test]
    fn test_expired_entries_do_not_cause_eviction() {
        let cache = MemoryResultCache::with_max_entries(2);
        cache.insert(key("a"), output(1), None);
        cache.insert(key("b"), output(2), Some(Duration::ZERO));

        cache.insert(key("c"), output(3), None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryResultCache::new();
        cache.insert(key("a"), output(1), Some(Duration::ZERO));
        cache.insert(key("b"), output(2), None);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
