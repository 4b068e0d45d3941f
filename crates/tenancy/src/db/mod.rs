//! Storefront persistence adapter.
//!
//! The resolver consumes storefront data through the narrow
//! [`StorefrontRepository`] port. A miss is `Ok(None)`, never an error; every
//! failure surfaces as [`RepositoryError`], which the resolver reports as
//! `repository_unavailable`.
//!
//! # Database
//!
//! [`PgStorefrontRepository`] reads the shared store:
//!
//! - `tenancy.storefront` - one row per storefront (slug, custom domain, seller)
//! - `tenancy.storefront_stats` - aggregated usage counters, refreshed out of band
//!
//! # Migrations
//!
//! Migrations are stored in `crates/tenancy/migrations/` and run via:
//! ```bash
//! cargo run -p shopgrid-cli -- migrate
//! ```

mod storefronts;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use shopgrid_core::{Slug, Storefront, StorefrontId, TenantStats};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use storefronts::PgStorefrontRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The backing store could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Read-only storefront lookups consumed by the resolver.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait StorefrontRepository: Send + Sync {
    /// Look up a storefront by its slug.
    async fn get_storefront_by_slug(&self, slug: &Slug)
    -> Result<Option<Storefront>, RepositoryError>;

    /// Look up a storefront by its custom domain (lowercase, no port).
    async fn get_storefront_by_domain(
        &self,
        host: &str,
    ) -> Result<Option<Storefront>, RepositoryError>;

    /// Look up a storefront by ID.
    async fn get_storefront_by_id(
        &self,
        id: StorefrontId,
    ) -> Result<Option<Storefront>, RepositoryError>;

    /// Fetch aggregated usage stats for a storefront.
    async fn get_storefront_stats(&self, id: StorefrontId) -> Result<TenantStats, RepositoryError>;
}

/// Create the shared `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
