//! In-memory TTL cache for resolved stream locations.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use muzic_core::constants::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECONDS};
use muzic_core::types::{MediaId, Resolution};

/// Cache entry with TTL.
#[derive(Clone)]
struct CacheEntry {
    resolution: Resolution,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Valid only while `now < inserted_at + ttl`.
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Default TTL in seconds
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            default_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    /// Sets the maximum number of entries.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Sets the default TTL.
    pub fn with_ttl_seconds(mut self, seconds: u64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Process-wide cache of resolutions keyed by media identifier.
///
/// Bounded by [`CacheConfig::max_entries`]. Inserting a new identifier into a
/// full cache evicts exactly one entry: the least recently used one, where
/// both [`lookup`](Self::lookup) and [`insert`](Self::insert) count as a use.
/// Expired entries are never returned and are dropped when a lookup finds
/// them, or in bulk by [`cleanup_expired`](Self::cleanup_expired).
///
/// All operations take a single mutex and are O(1), so readers never observe
/// a partially written entry.
pub struct ResolutionCache {
    entries: Mutex<LruCache<MediaId, CacheEntry>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResolutionCache {
    /// Creates a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity())),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks up a valid resolution and marks it as recently used.
    ///
    /// Returns `None` if the identifier is not cached or its entry expired.
    pub fn lookup(&self, id: &MediaId) -> Option<Resolution> {
        let mut entries = self.entries.lock();

        let expired = match entries.get(id) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.resolution.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(id);
            debug!(%id, "Dropped expired resolution");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Like [`lookup`](Self::lookup) but touches neither recency nor stats.
    pub fn peek(&self, id: &MediaId) -> Option<Resolution> {
        let entries = self.entries.lock();
        entries
            .peek(id)
            .filter(|e| !e.is_expired())
            .map(|e| e.resolution.clone())
    }

    /// Caches a resolution with the default TTL.
    pub fn insert(&self, resolution: Resolution) {
        self.insert_with_ttl(resolution, Duration::from_secs(self.config.default_ttl_seconds));
    }

    /// Caches a resolution with a custom TTL, replacing any existing entry
    /// for the same identifier.
    pub fn insert_with_ttl(&self, resolution: Resolution, ttl: Duration) {
        let id = resolution.id.clone();
        let entry = CacheEntry {
            resolution,
            inserted_at: Instant::now(),
            ttl,
        };

        let displaced = self.entries.lock().push(id.clone(), entry);

        if let Some((evicted, _)) = displaced {
            if evicted != id {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(%evicted, inserted = %id, "Evicted least recently used resolution");
            }
        }
    }

    /// Removes a cached entry. Returns true if one was present.
    pub fn invalidate(&self, id: &MediaId) -> bool {
        let removed = self.entries.lock().pop(id).is_some();
        if removed {
            debug!(%id, "Invalidated resolution");
        }
        removed
    }

    /// Removes the entry for `id` only if it still points at `stream_url`.
    ///
    /// A request holding a rejected location must not discard a newer
    /// resolution another request cached in the meantime.
    pub fn invalidate_if(&self, id: &MediaId, stream_url: &str) -> bool {
        let mut entries = self.entries.lock();
        let matches = entries
            .peek(id)
            .is_some_and(|e| e.resolution.stream_url == stream_url);
        if matches {
            entries.pop(id);
            debug!(%id, "Invalidated stale resolution");
        }
        matches
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Removes all expired entries and returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<MediaId> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();

        for id in &expired {
            entries.pop(id);
        }
        expired.len()
    }

    /// Returns the number of cached entries (including expired ones not yet dropped).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let expired = entries.iter().filter(|(_, e)| e.is_expired()).count();

        CacheStats {
            total_entries: entries.len(),
            expired_entries: expired,
            valid_entries: entries.len().saturating_sub(expired),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// Total entries (including expired)
    pub total_entries: usize,
    /// Expired entries
    pub expired_entries: usize,
    /// Valid (non-expired) entries
    pub valid_entries: usize,
    /// Maximum capacity
    pub capacity: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing valid
    pub misses: u64,
    /// Entries displaced by capacity pressure
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn id(raw: &str) -> MediaId {
        MediaId::new(raw).unwrap()
    }

    fn make_resolution(raw: &str) -> Resolution {
        Resolution::new(id(raw), format!("https://cdn.example/{}.mp4", raw), "Sample", 212)
    }

    fn small_cache(max_entries: usize) -> ResolutionCache {
        ResolutionCache::with_config(CacheConfig::default().with_max_entries(max_entries))
    }

    #[test]
    fn test_cache_insert_lookup() {
        let cache = ResolutionCache::new();
        let res = make_resolution("dQw4w9WgXcQ");

        cache.insert(res.clone());

        assert_eq!(cache.lookup(&id("dQw4w9WgXcQ")), Some(res));
    }

    #[test]
    fn test_cache_miss() {
        let cache = ResolutionCache::new();
        assert!(cache.lookup(&id("aaaaaaaaaaa")).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = ResolutionCache::new();
        cache.insert(make_resolution("aaaaaaaaaaa"));

        let mut newer = make_resolution("aaaaaaaaaaa");
        newer.stream_url = "https://cdn.example/fresh.mp4".into();
        cache.insert(newer.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&id("aaaaaaaaaaa")), Some(newer));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = ResolutionCache::new();
        cache.insert(make_resolution("aaaaaaaaaaa"));

        assert!(cache.invalidate(&id("aaaaaaaaaaa")));
        assert!(!cache.invalidate(&id("aaaaaaaaaaa")));
        assert!(cache.lookup(&id("aaaaaaaaaaa")).is_none());
    }

    #[test]
    fn test_invalidate_if_keeps_newer_location() {
        let cache = ResolutionCache::new();
        let stale = make_resolution("aaaaaaaaaaa");
        let mut fresh = stale.clone();
        fresh.stream_url = "https://cdn.example/fresh.mp4".into();
        cache.insert(fresh.clone());

        assert!(!cache.invalidate_if(&id("aaaaaaaaaaa"), &stale.stream_url));
        assert_eq!(cache.peek(&id("aaaaaaaaaaa")), Some(fresh.clone()));

        assert!(cache.invalidate_if(&id("aaaaaaaaaaa"), &fresh.stream_url));
        assert!(cache.peek(&id("aaaaaaaaaaa")).is_none());
        assert!(!cache.invalidate_if(&id("aaaaaaaaaaa"), &fresh.stream_url));
    }

    #[test]
    fn test_cache_clear() {
        let cache = ResolutionCache::new();
        cache.insert(make_resolution("aaaaaaaaaaa"));
        cache.insert(make_resolution("bbbbbbbbbbb"));

        cache.clear();

        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_ttl_expiration() {
        let cache = ResolutionCache::new();

        cache.insert_with_ttl(make_resolution("aaaaaaaaaaa"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.lookup(&id("aaaaaaaaaaa")).is_none());
        // The lookup drops the expired entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_is_never_valid() {
        let cache = ResolutionCache::new();
        cache.insert_with_ttl(make_resolution("aaaaaaaaaaa"), Duration::ZERO);
        assert!(cache.lookup(&id("aaaaaaaaaaa")).is_none());
        assert!(cache.peek(&id("aaaaaaaaaaa")).is_none());
    }

    #[test]
    fn test_cache_capacity_eviction_is_lru() {
        let cache = small_cache(2);

        cache.insert(make_resolution("aaaaaaaaaaa"));
        cache.insert(make_resolution("bbbbbbbbbbb"));
        // Touch "a" so "b" becomes least recently used.
        assert!(cache.lookup(&id("aaaaaaaaaaa")).is_some());
        cache.insert(make_resolution("ccccccccccc"));

        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&id("aaaaaaaaaaa")).is_some());
        assert!(cache.peek(&id("bbbbbbbbbbb")).is_none());
        assert!(cache.peek(&id("ccccccccccc")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = small_cache(2);

        cache.insert(make_resolution("aaaaaaaaaaa"));
        cache.insert(make_resolution("bbbbbbbbbbb"));
        assert!(cache.peek(&id("aaaaaaaaaaa")).is_some());
        cache.insert(make_resolution("ccccccccccc"));

        assert!(cache.peek(&id("aaaaaaaaaaa")).is_none());
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_zero_capacity_config_holds_one() {
        let cache = small_cache(0);
        cache.insert(make_resolution("aaaaaaaaaaa"));
        cache.insert(make_resolution("bbbbbbbbbbb"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().capacity, 1);
    }

    #[test]
    fn test_cache_stats() {
        let cache = ResolutionCache::new();
        cache.insert(make_resolution("aaaaaaaaaaa"));
        cache.insert_with_ttl(make_resolution("bbbbbbbbbbb"), Duration::ZERO);
        cache.lookup(&id("aaaaaaaaaaa"));

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.capacity, DEFAULT_CACHE_MAX_ENTRIES);
    }

    #[test]
    fn test_cache_cleanup_expired() {
        let cache = ResolutionCache::new();

        cache.insert_with_ttl(make_resolution("aaaaaaaaaaa"), Duration::from_millis(1));
        cache.insert(make_resolution("bbbbbbbbbbb"));
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&id("bbbbbbbbbbb")).is_some());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(small_cache(8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let raw = format!("idx{:02}{:06}", t, i % 16);
                        cache.insert(make_resolution(&raw));
                        if let Some(found) = cache.lookup(&id(&raw)) {
                            assert_eq!(found.id.as_str(), raw);
                        }
                        cache.invalidate(&id(&format!("idx{:02}{:06}", (t + 1) % 8, i % 16)));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 8);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(cap in 1usize..16, inserts in 0usize..64) {
            let cache = small_cache(cap);
            for i in 0..inserts {
                let before = cache.len();
                cache.insert(make_resolution(&format!("k{:010}", i)));
                prop_assert!(cache.len() <= cap);
                // Each insertion beyond capacity evicts exactly one entry.
                if before == cap {
                    prop_assert_eq!(cache.len(), cap);
                }
            }
            prop_assert_eq!(cache.stats().evictions as usize, inserts.saturating_sub(cap));
        }
    }
}
