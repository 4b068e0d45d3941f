//! Tenant-scoped endpoints.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use shopgrid_core::{IsolationTier, SellerId, Slug, StorefrontId, TenantContext};

use crate::error::{AppError, Result};
use crate::middleware::{OptionalTenant, RequireTenant, TenantHandle};
use crate::pool::Connector;
use crate::state::AppState;

pub fn routes<C: Connector>() -> Router<AppState<C>> {
    Router::new()
        .route("/tenant", get(current_tenant))
        .route("/tenant/db", get(tenant_db::<C>))
        .route("/context", get(request_context))
        .route("/s/{slug}/tenant", get(current_tenant))
}

/// The resolved tenant, as downstream services see it.
#[derive(Debug, Serialize)]
pub struct TenantView {
    pub storefront_id: StorefrontId,
    pub slug: Slug,
    pub seller_id: SellerId,
    pub isolation_tier: IsolationTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl From<TenantContext> for TenantView {
    fn from(context: TenantContext) -> Self {
        let schema = context.schema_name();
        Self {
            storefront_id: context.storefront_id,
            slug: context.slug,
            seller_id: context.seller_id,
            isolation_tier: context.isolation_tier,
            schema,
        }
    }
}

async fn current_tenant(RequireTenant(context): RequireTenant) -> Json<TenantView> {
    Json(context.into())
}

/// Resolution outcome for a request that may or may not name a tenant.
#[derive(Debug, Serialize)]
pub struct ContextView {
    pub tenant: Option<TenantView>,
}

async fn request_context(OptionalTenant(context): OptionalTenant) -> Json<ContextView> {
    Json(ContextView {
        tenant: context.map(TenantView::from),
    })
}

#[derive(Debug, Serialize)]
struct DbStatus {
    status: &'static str,
    isolation_tier: IsolationTier,
}

async fn tenant_db<C: Connector>(
    State(state): State<AppState<C>>,
    RequireTenant(context): RequireTenant,
    TenantHandle(handle): TenantHandle<C>,
) -> Result<Json<DbStatus>> {
    state.resolver().ping(&handle).await.map_err(|message| {
        AppError::Internal(format!(
            "tenant {} database ping failed: {message}",
            context.storefront_id
        ))
    })?;
    Ok(Json(DbStatus {
        status: "ok",
        isolation_tier: context.isolation_tier,
    }))
}
