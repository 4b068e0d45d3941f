//! Application state shared across handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AdminTokens;
use crate::frontend::TenantFrontend;
use crate::pool::Connector;
use crate::resolver::TenantResolver;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Generic over the connector so routes can be
/// exercised without a database.
pub struct AppState<C: Connector> {
    inner: Arc<AppStateInner<C>>,
}

struct AppStateInner<C: Connector> {
    frontend: TenantFrontend<C>,
    admin_tokens: AdminTokens,
    shutdown: CancellationToken,
}

// Derive would require `C: Clone`.
impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> AppState<C> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `resolver` - The process-wide tenant resolver
    /// * `default_domain` - Platform domain for subdomain resolution
    /// * `admin_tokens` - Bearer tokens accepted by the admin API
    /// * `shutdown` - Fires when the server begins shutting down; request
    ///   resolution runs under a child of it
    #[must_use]
    pub fn new(
        resolver: Arc<TenantResolver<C>>,
        default_domain: Option<String>,
        admin_tokens: AdminTokens,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                frontend: TenantFrontend::new(resolver, default_domain),
                admin_tokens,
                shutdown,
            }),
        }
    }

    /// Get a reference to the tenant resolver.
    #[must_use]
    pub fn resolver(&self) -> &TenantResolver<C> {
        self.inner.frontend.resolver()
    }

    /// Get a reference to the resolution front-end.
    #[must_use]
    pub fn frontend(&self) -> &TenantFrontend<C> {
        &self.inner.frontend
    }

    #[must_use]
    pub fn admin_tokens(&self) -> &AdminTokens {
        &self.inner.admin_tokens
    }

    /// A token canceled on shutdown, for one unit of request work.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }
}
