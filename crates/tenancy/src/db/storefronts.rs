//! `PostgreSQL` storefront repository.
//!
//! Uses runtime-checked `query_as` so the crate builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopgrid_core::{SellerId, Slug, Storefront, StorefrontId, TenantStats};
use sqlx::PgPool;
use tracing::instrument;

use super::{RepositoryError, StorefrontRepository};

/// Repository over the `tenancy` schema of the shared store.
#[derive(Clone)]
pub struct PgStorefrontRepository {
    pool: PgPool,
}

impl PgStorefrontRepository {
    /// Create a new storefront repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StorefrontRow {
    id: StorefrontId,
    slug: String,
    domain: Option<String>,
    seller_id: SellerId,
}

impl TryFrom<StorefrontRow> for Storefront {
    type Error = RepositoryError;

    fn try_from(row: StorefrontRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid slug in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            slug,
            domain: row.domain,
            seller_id: row.seller_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    customer_count: i64,
    order_count: i64,
    product_count: i64,
    data_size_bytes: i64,
    avg_query_time_ms: f64,
    queries_per_second: f64,
    storage_usage_mb: f64,
    active_sessions: i64,
    last_activity_at: Option<DateTime<Utc>>,
}

fn non_negative(field: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {field}: {value}")))
}

impl StatsRow {
    fn into_stats(self, storefront_id: StorefrontId) -> Result<TenantStats, RepositoryError> {
        Ok(TenantStats {
            storefront_id,
            customer_count: non_negative("customer_count", self.customer_count)?,
            order_count: non_negative("order_count", self.order_count)?,
            product_count: non_negative("product_count", self.product_count)?,
            data_size_bytes: non_negative("data_size_bytes", self.data_size_bytes)?,
            avg_query_time_ms: self.avg_query_time_ms,
            queries_per_second: self.queries_per_second,
            storage_usage_mb: self.storage_usage_mb,
            active_sessions: non_negative("active_sessions", self.active_sessions)?,
            last_activity_at: self.last_activity_at,
        })
    }
}

const STOREFRONT_COLUMNS: &str = "id, slug, domain, seller_id";

#[async_trait]
impl StorefrontRepository for PgStorefrontRepository {
    #[instrument(skip(self), fields(slug = %slug))]
    async fn get_storefront_by_slug(
        &self,
        slug: &Slug,
    ) -> Result<Option<Storefront>, RepositoryError> {
        let row: Option<StorefrontRow> = sqlx::query_as(&format!(
            "SELECT {STOREFRONT_COLUMNS} FROM tenancy.storefront WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Storefront::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn get_storefront_by_domain(
        &self,
        host: &str,
    ) -> Result<Option<Storefront>, RepositoryError> {
        let row: Option<StorefrontRow> = sqlx::query_as(&format!(
            "SELECT {STOREFRONT_COLUMNS} FROM tenancy.storefront WHERE lower(domain) = lower($1)"
        ))
        .bind(host)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Storefront::try_from).transpose()
    }

    #[instrument(skip(self), fields(storefront_id = %id))]
    async fn get_storefront_by_id(
        &self,
        id: StorefrontId,
    ) -> Result<Option<Storefront>, RepositoryError> {
        let row: Option<StorefrontRow> = sqlx::query_as(&format!(
            "SELECT {STOREFRONT_COLUMNS} FROM tenancy.storefront WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Storefront::try_from).transpose()
    }

    #[instrument(skip(self), fields(storefront_id = %id))]
    async fn get_storefront_stats(&self, id: StorefrontId) -> Result<TenantStats, RepositoryError> {
        let row: Option<StatsRow> = sqlx::query_as(
            r"
            SELECT customer_count, order_count, product_count, data_size_bytes,
                   avg_query_time_ms, queries_per_second, storage_usage_mb,
                   active_sessions, last_activity_at
            FROM tenancy.storefront_stats
            WHERE storefront_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        // No stats row yet means no recorded activity.
        row.map_or_else(|| Ok(TenantStats::empty(id)), |r| r.into_stats(id))
    }
}
