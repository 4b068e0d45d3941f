//! Bounded TTL caches for storefront lookups and tenant stats.
//!
//! The resolver only talks to caches through [`TenantCache`], so an
//! alternative backend can be plugged in without touching resolution logic.
//! Backends must honor the same semantics as [`TtlCache`]: an entry is
//! absent once `now >= expires_at`, `size()` never exceeds the bound after
//! `set` returns, and overflow eviction prefers an already-expired entry
//! before the one closest to expiry.
//!
//! No operation here performs I/O, and none can fail.

mod ttl;

use std::time::Duration;

use serde::Serialize;

pub use ttl::{CacheEntry, TtlCache};

/// Key prefix for storefronts cached by slug.
pub const SLUG_PREFIX: &str = "storefront:";
/// Key prefix for storefronts cached by custom domain.
pub const DOMAIN_PREFIX: &str = "domain:";
/// Key prefix for storefronts cached by ID.
pub const ID_PREFIX: &str = "id:";

/// Cache key for a storefront slug lookup.
#[must_use]
pub fn slug_key(slug: &str) -> String {
    format!("{SLUG_PREFIX}{slug}")
}

/// Cache key for a custom-domain lookup.
#[must_use]
pub fn domain_key(host: &str) -> String {
    format!("{DOMAIN_PREFIX}{host}")
}

/// Cache key for an ID lookup.
#[must_use]
pub fn id_key(id: impl std::fmt::Display) -> String {
    format!("{ID_PREFIX}{id}")
}

/// Operational contract of a tenant cache backend.
pub trait TenantCache<K, V>: Send + Sync {
    /// Returns the value iff an entry exists and has not expired.
    fn get(&self, key: &K) -> Option<V>;

    /// Whether a live entry exists, without touching the hit counters.
    fn contains(&self, key: &K) -> bool;

    /// Insert or overwrite, evicting first if the cache is full.
    fn set(&self, key: K, value: V, ttl: Duration);

    /// Remove the entry if present. Idempotent.
    fn invalidate(&self, key: &K);

    /// Remove every entry.
    fn clear(&self);

    /// Number of stored entries, expired ones included until swept.
    fn size(&self) -> usize;

    /// Remove every expired entry, returning how many were dropped.
    fn purge_expired(&self) -> usize;

    /// Point-in-time counters.
    fn metrics(&self) -> CacheMetrics;
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to make room for a new key.
    pub evictions: u64,
    /// Entries removed by the sweep after expiring.
    pub expirations: u64,
    pub size: usize,
}

impl CacheMetrics {
    /// Fraction of lookups served from the cache.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.hits as f64 / total as f64;
        rate
    }
}
