//! Tenant resolution middleware and extractors.
//!
//! [`tenant_middleware`] runs the resolution front-end once per request and
//! stores the resulting [`TenantContext`] in request extensions. Handlers
//! then pick it up with an extractor:
//!
//! ```rust,ignore
//! async fn catalog(
//!     RequireTenant(tenant): RequireTenant,
//!     TenantHandle(pool): TenantHandle<PgConnector>,
//! ) -> Result<Json<Catalog>> {
//!     // ...
//! }
//! ```

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use shopgrid_core::TenantContext;
use tracing::{Span, field};

use crate::error::AppError;
use crate::frontend::RequestHints;
use crate::pool::Connector;
use crate::state::AppState;

/// Resolve the request's tenant.
///
/// A request that matches no storefront passes through without a context;
/// [`RequireTenant`] turns that into `tenant_not_found`. Resolution errors
/// (bad hints, repository outage) end the request here.
///
/// # Errors
///
/// Returns the front-end's error as an [`AppError`].
pub async fn tenant_middleware<C: Connector>(
    State(state): State<AppState<C>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let hints = RequestHints::from_parts(request.headers(), request.uri());
    let cancel = state.request_token();

    if let Some(resolution) = state.frontend().resolve(&hints, &cancel).await? {
        let context = resolution.context;
        let span = Span::current();
        span.record("storefront_id", field::display(context.storefront_id));
        span.record("tenant_tier", context.isolation_tier.as_str());
        sentry::configure_scope(|scope| {
            scope.set_tag("storefront_id", context.storefront_id);
            scope.set_tag("tenant_tier", context.isolation_tier);
            scope.set_tag("tenant_strategy", resolution.strategy);
        });
        request.extensions_mut().insert(context);
    }

    Ok(next.run(request).await)
}

/// Extractor that requires a resolved tenant.
///
/// Rejects with `tenant_not_found` (400) when resolution found nothing.
pub struct RequireTenant(pub TenantContext);

impl<S> FromRequestParts<S> for RequireTenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(Self)
            .ok_or(AppError::TenantNotFound)
    }
}

/// Extractor for routes that serve both tenant and platform requests.
pub struct OptionalTenant(pub Option<TenantContext>);

impl<S> FromRequestParts<S> for OptionalTenant
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<TenantContext>().cloned()))
    }
}

/// Extractor for the database handle serving the request's tenant.
///
/// Shared and schema tiers get the shared handle; database-tier tenants get
/// their dedicated pool, opened on first use. Fails with `tenant_not_found`
/// when no tenant was resolved and `tenant_unreachable` (500) when the
/// dedicated pool cannot be reached.
pub struct TenantHandle<C: Connector>(pub C::Handle);

impl<C: Connector> FromRequestParts<AppState<C>> for TenantHandle<C> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<C>,
    ) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<TenantContext>()
            .ok_or(AppError::TenantNotFound)?;
        let cancel = state.request_token();
        let handle = state.resolver().handle_for(context, &cancel).await?;
        Ok(Self(handle))
    }
}
