use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    results: V,
    inserted_at: Instant,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl: Duration,
}

/// LRU cache with TTL for search results.
///
/// Recency order is maintained by the LRU structure (`get` promotes);
/// expiry is checked lazily on `get` and eagerly via [`SearchCache::remove_expired`].
/// Timestamps are monotonic, so a clock stepping backwards never evicts
/// prematurely.
pub struct SearchCache<V> {
    entries: LruCache<String, CacheEntry<V>>,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> SearchCache<V> {
    pub const DEFAULT_MAX_SIZE: usize = 1000;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    #[must_use]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            max_size: capacity.get(),
            ttl,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_MAX_SIZE, Self::DEFAULT_TTL)
    }

    /// Get cached results, promoting the entry to most-recent. Expired
    /// entries are removed and miss.
    pub fn get(&mut self, query: &str) -> Option<V> {
        let expired = self
            .entries
            .peek(query)
            .is_some_and(|entry| entry.inserted_at.elapsed() > self.ttl);
        if expired {
            self.entries.pop(query);
            log::debug!("cache expired for query: {:.50}", query);
            return None;
        }
        self.entries.get(query).map(|entry| entry.results.clone())
    }

    /// Cache results for a query, evicting the least-recent entry when the
    /// cache is full.
    pub fn set(&mut self, query: impl Into<String>, results: V) {
        let query = query.into();
        if let Some((evicted, _)) = self.entries.push(
            query,
            CacheEntry {
                results,
                inserted_at: Instant::now(),
            },
        ) {
            log::debug!("cache evicted: {:.50}", evicted);
        }
    }

    /// Clear all entries; returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        if count > 0 {
            log::info!("cache cleared: {count} entries removed");
        }
        count
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn remove_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > self.ttl)
            .map(|(query, _)| query.clone())
            .collect();
        for query in &expired {
            self.entries.pop(query);
        }
        if !expired.is_empty() {
            log::info!("removed {} expired cache entries", expired.len());
        }
        expired.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            ttl: self.ttl,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Presence check without an expiry check or promotion.
    #[must_use]
    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains(query)
    }
}
