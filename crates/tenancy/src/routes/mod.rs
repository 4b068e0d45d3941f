//! HTTP routes for the tenancy service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Shared store reachable
//!
//! # Tenant-scoped (resolution middleware applied)
//! GET  /api/tenant                          - Resolved tenant context
//! GET  /api/tenant/db                       - Ping the tenant's database handle
//! GET  /api/s/{slug}/tenant                 - Same as /api/tenant, path strategy
//! GET  /api/context                         - Resolved tenant or null
//!
//! # Admin (bearer token)
//! GET  /admin/tenants/{id}/stats            - Usage statistics (viewer)
//! GET  /admin/tenants/{id}/migration        - Migration check (viewer)
//! POST /admin/tenants/{id}/migration        - Switch isolation tier (admin)
//! POST /admin/tenants/cache/invalidate      - Drop cached entries (admin)
//! ```

pub mod admin;
pub mod health;
pub mod tenant;

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};

use crate::middleware::{request_id_middleware, tenant_middleware};
use crate::pool::Connector;
use crate::state::AppState;

/// All routes. Tenant resolution runs on `/api` only.
pub fn routes<C: Connector>(state: &AppState<C>) -> Router<AppState<C>> {
    let tenant_routes = tenant::routes::<C>().route_layer(from_fn_with_state(
        state.clone(),
        tenant_middleware::<C>,
    ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<C>))
        .nest("/api", tenant_routes)
        .nest("/admin/tenants", admin::routes::<C>())
}

/// The service with request IDs and state applied.
///
/// The binary adds tracing and Sentry layers on top.
pub fn router<C: Connector>(state: AppState<C>) -> Router {
    routes(&state)
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
