//! Resolver error kinds.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::pool::PoolError;

/// Errors surfaced by resolution and handle acquisition.
///
/// "Not found" is not an error; lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The storefront repository failed.
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(#[from] RepositoryError),

    /// Opening the tenant's database pool failed.
    #[error(transparent)]
    ConnectFailed(PoolError),

    /// The tenant's database did not answer its liveness probe.
    #[error(transparent)]
    TenantUnreachable(PoolError),

    /// The tenant connection-string pattern is unusable.
    #[error(transparent)]
    MisconfiguredPattern(PoolError),

    /// The caller's cancellation token fired.
    #[error("canceled")]
    Canceled,

    /// A storefront ID or slug hint failed to parse.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ResolverError {
    /// Stable machine-readable kind, used verbatim in API error envelopes.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RepositoryUnavailable(_) => "repository_unavailable",
            Self::ConnectFailed(_) => "connect_failed",
            Self::TenantUnreachable(_) => "tenant_unreachable",
            Self::MisconfiguredPattern(_) => "misconfigured_pattern",
            Self::Canceled => "canceled",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<PoolError> for ResolverError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ConnectFailed { .. } => Self::ConnectFailed(err),
            PoolError::TenantUnreachable { .. } => Self::TenantUnreachable(err),
            PoolError::MisconfiguredPattern(_) => Self::MisconfiguredPattern(err),
            PoolError::Canceled => Self::Canceled,
        }
    }
}
