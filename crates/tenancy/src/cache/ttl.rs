//! In-memory bounded TTL cache.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use super::{CacheMetrics, TenantCache};

/// A stored value and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Bounded in-memory cache with per-entry expiry.
///
/// `get` takes a shared lock; `set`, `invalidate`, `clear`, eviction and the
/// sweep take the exclusive lock. Entries live in a `BTreeMap` so overflow
/// eviction scans in key order, which keeps it deterministic.
///
/// Reads use [`tokio::time::Instant`], so tests can drive expiry with a
/// paused runtime clock.
pub struct TtlCache<K, V> {
    entries: RwLock<BTreeMap<K, CacheEntry<V>>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<K: Ord, V> TtlCache<K, V> {
    /// Create a cache holding at most `max_size` entries (minimum 1).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Configured entry bound.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<K: Ord + Clone, V> TtlCache<K, V> {
    /// Pick the overflow victim: the first expired entry in key order, else
    /// the earliest to expire (ties go to the lowest key).
    fn victim(entries: &BTreeMap<K, CacheEntry<V>>, now: Instant) -> Option<K> {
        entries
            .iter()
            .find(|(_, entry)| entry.is_expired(now))
            .or_else(|| entries.iter().min_by_key(|(_, entry)| entry.expires_at))
            .map(|(key, _)| key.clone())
    }
}

impl<K, V> TenantCache<K, V> for TtlCache<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let value = self
            .entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());

        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    fn set(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();

        if !entries.contains_key(&key) {
            while entries.len() >= self.max_size {
                let Some(victim) = Self::victim(&entries, now) else {
                    break;
                };
                entries.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now.checked_add(ttl).unwrap_or_else(|| far_future(now)),
            },
        );
    }

    fn invalidate(&self, key: &K) {
        self.entries.write().remove(key);
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn size(&self) -> usize {
        self.entries.read().len()
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();
        self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: self.size(),
        }
    }
}

/// Roughly thirty years out; stands in for "never" when `now + ttl`
/// does not fit in an `Instant`.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86_400 * 365 * 30)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_expiry_boundary() {
        let cache = TtlCache::new(8);
        cache.set("acme".to_string(), 1, MINUTE);

        tokio::time::advance(MINUTE - Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"acme".to_string()), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"acme".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_saturates() {
        let cache = TtlCache::new(8);
        cache.set("k", 1, Duration::MAX);
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(cache.get(&"k"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let cache = TtlCache::new(8);
        cache.set("k", 1, MINUTE);
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set("k", 2, MINUTE);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get(&"k"), Some(2));
        assert_eq!(cache.size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_evicts_expired_entry_first() {
        let cache = TtlCache::new(3);
        cache.set("a", 1, Duration::from_secs(300));
        cache.set("b", 2, Duration::from_secs(10));
        cache.set("c", 3, Duration::from_secs(200));
        tokio::time::advance(Duration::from_secs(20)).await;

        cache.set("d", 4, MINUTE);
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"d"), Some(4));
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_evicts_earliest_to_expire() {
        let cache = TtlCache::new(3);
        cache.set("a", 1, Duration::from_secs(300));
        cache.set("b", 2, Duration::from_secs(100));
        cache.set("c", 3, Duration::from_secs(200));

        cache.set("d", 4, MINUTE);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"d"), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_at_capacity_does_not_evict() {
        let cache = TtlCache::new(2);
        cache.set("a", 1, MINUTE);
        cache.set("b", 2, MINUTE);
        cache.set("a", 10, MINUTE);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.metrics().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contains_skips_counters() {
        let cache = TtlCache::new(4);
        cache.set("a", 1, Duration::from_secs(5));
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!cache.contains(&"a"));
        let metrics = cache.metrics();
        assert_eq!((metrics.hits, metrics.misses), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_is_idempotent() {
        let cache = TtlCache::new(4);
        cache.set("a", 1, MINUTE);
        cache.invalidate(&"a");
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_and_metrics() {
        let cache = TtlCache::new(8);
        cache.set("short", 1, Duration::from_secs(5));
        cache.set("long", 2, Duration::from_secs(500));
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.size(), 1);

        let _ = cache.get(&"long");
        let _ = cache.get(&"short");
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.expirations, 1);
        assert_eq!(metrics.size, 1);
    }

    #[test]
    fn test_clear() {
        let cache = TtlCache::new(4);
        cache.set(1u32, "x", MINUTE);
        cache.set(2u32, "y", MINUTE);
        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_zero_bound_is_clamped() {
        let cache: TtlCache<u32, u32> = TtlCache::new(0);
        assert_eq!(cache.max_size(), 1);
        cache.set(1, 1, MINUTE);
        cache.set(2, 2, MINUTE);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&2), Some(2));
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_bound(
            max_size in 1usize..16,
            ops in proptest::collection::vec((0u8..32, 1u64..600), 1..200),
        ) {
            let cache = TtlCache::new(max_size);
            for (key, ttl) in ops {
                cache.set(key, u32::from(key), Duration::from_secs(ttl));
                prop_assert!(cache.size() <= max_size);
                prop_assert_eq!(cache.get(&key), Some(u32::from(key)));
            }
        }
    }
}
