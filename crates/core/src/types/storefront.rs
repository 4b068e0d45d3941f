//! Storefront, tenant context, and usage statistics values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IsolationTier, SellerId, Slug, StorefrontId};

/// A single customer-facing shop.
///
/// Immutable for the lifetime of a cache entry; updates must be followed by
/// an explicit invalidation in the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storefront {
    pub id: StorefrontId,
    pub slug: Slug,
    /// Fully-qualified custom hostname, unique when present.
    pub domain: Option<String>,
    pub seller_id: SellerId,
}

/// The canonical tenant for one resolved request.
///
/// Small and `Copy`-cheap apart from the slug; created per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub storefront_id: StorefrontId,
    pub slug: Slug,
    pub seller_id: SellerId,
    pub isolation_tier: IsolationTier,
}

impl TenantContext {
    /// Pack a storefront and its effective tier into a context.
    #[must_use]
    pub fn new(storefront: &Storefront, isolation_tier: IsolationTier) -> Self {
        Self {
            storefront_id: storefront.id,
            slug: storefront.slug.clone(),
            seller_id: storefront.seller_id,
            isolation_tier,
        }
    }

    /// Name of the dedicated schema for schema-tier tenants.
    ///
    /// Returns `None` for other tiers. The name is derived from the storefront
    /// ID (not the slug) so it survives slug renames.
    #[must_use]
    pub fn schema_name(&self) -> Option<String> {
        match self.isolation_tier {
            IsolationTier::Schema => Some(format!(
                "tenant_{}",
                self.storefront_id.as_uuid().simple()
            )),
            IsolationTier::Shared | IsolationTier::Database => None,
        }
    }
}

/// Aggregated usage statistics for one storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantStats {
    pub storefront_id: StorefrontId,
    pub customer_count: u64,
    pub order_count: u64,
    pub product_count: u64,
    pub data_size_bytes: u64,
    pub avg_query_time_ms: f64,
    pub queries_per_second: f64,
    pub storage_usage_mb: f64,
    pub active_sessions: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl TenantStats {
    /// Zeroed stats for a storefront with no recorded activity.
    #[must_use]
    pub const fn empty(storefront_id: StorefrontId) -> Self {
        Self {
            storefront_id,
            customer_count: 0,
            order_count: 0,
            product_count: 0,
            data_size_bytes: 0,
            avg_query_time_ms: 0.0,
            queries_per_second: 0.0,
            storage_usage_mb: 0.0,
            active_sessions: 0,
            last_activity_at: None,
        }
    }
}
