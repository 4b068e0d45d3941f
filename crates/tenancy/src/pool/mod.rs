//! Per-tenant database handles.
//!
//! [`Connector`] abstracts opening, probing and closing a pool handle so the
//! [`ConnectionRegistry`] can be exercised without a live database.
//! [`PgConnector`] is the production implementation over `sqlx::PgPool`.

mod registry;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use shopgrid_core::StorefrontId;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use registry::ConnectionRegistry;

/// Substitution slot for the storefront ID in `tenant_database_pattern`.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Lifetime cap for every connection in a tenant pool.
pub const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(3600);

/// Errors that can occur while obtaining a tenant handle.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Opening the pool (dial, auth, TLS) failed.
    #[error("connect failed for {storefront_id}: {message}")]
    ConnectFailed {
        storefront_id: StorefrontId,
        message: String,
    },

    /// The pool opened but the liveness probe failed.
    #[error("tenant {storefront_id} unreachable: {message}")]
    TenantUnreachable {
        storefront_id: StorefrontId,
        message: String,
    },

    /// The connection-string pattern could not be formatted.
    #[error("misconfigured tenant database pattern: {0}")]
    MisconfiguredPattern(String),

    /// The caller's cancellation token fired.
    #[error("canceled")]
    Canceled,
}

/// Limits applied to every per-tenant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime: Duration,
}

impl PoolSettings {
    /// Derive pool limits from the per-tenant connection budget.
    #[must_use]
    pub const fn for_tenant(max_connections_per_tenant: u32) -> Self {
        Self {
            max_open: max_connections_per_tenant,
            max_idle: max_connections_per_tenant / 4,
            max_lifetime: MAX_CONNECTION_LIFETIME,
        }
    }
}

/// Opens, probes and closes database handles.
///
/// `Handle` is cheap to clone and shared with callers, who must never close
/// it themselves; only the registry does.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    /// Open a pool handle for `url`.
    async fn open(&self, url: &SecretString, settings: PoolSettings)
    -> Result<Self::Handle, String>;

    /// Liveness probe.
    async fn ping(&self, handle: &Self::Handle) -> Result<(), String>;

    /// Close the handle and release its connections.
    async fn close(&self, handle: Self::Handle);
}

/// Substitute the storefront ID into a connection-string pattern.
///
/// Accepts a single `{id}` slot, or a single legacy `%s` slot. The result must
/// still parse as a URL.
///
/// # Errors
///
/// Returns `PoolError::MisconfiguredPattern` if the pattern has no slot or
/// more than one, or the formatted string is not a valid URL.
pub fn format_connection_string(
    pattern: &SecretString,
    storefront_id: StorefrontId,
) -> Result<SecretString, PoolError> {
    let pattern = pattern.expose_secret();
    let slot = match (
        pattern.matches(ID_PLACEHOLDER).count(),
        pattern.matches("%s").count(),
    ) {
        (1, 0) => ID_PLACEHOLDER,
        (0, 1) => "%s",
        (braces, legacy) => {
            return Err(PoolError::MisconfiguredPattern(format!(
                "expected exactly one substitution slot, found {}",
                braces + legacy
            )));
        }
    };

    // Simple form keeps the ID usable as a database name.
    let formatted = pattern.replacen(slot, &storefront_id.as_uuid().simple().to_string(), 1);
    url::Url::parse(&formatted).map_err(|e| {
        PoolError::MisconfiguredPattern(format!("formatted connection string is not a URL: {e}"))
    })?;
    Ok(SecretString::from(formatted))
}

// =============================================================================
// PgConnector
// =============================================================================

/// Opens per-tenant `PostgreSQL` pools with `sqlx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgPool;

    async fn open(&self, url: &SecretString, settings: PoolSettings) -> Result<PgPool, String> {
        // sqlx has no idle ceiling; the idle allowance becomes the warm floor.
        PgPoolOptions::new()
            .max_connections(settings.max_open)
            .min_connections(settings.max_idle)
            .max_lifetime(settings.max_lifetime)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url.expose_secret())
            .await
            .map_err(|e| e.to_string())
    }

    async fn ping(&self, handle: &PgPool) -> Result<(), String> {
        sqlx::query("SELECT 1")
            .execute(handle)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn close(&self, handle: PgPool) {
        handle.close().await;
    }
}
