//! Admin tenant operations.
//!
//! Read endpoints accept the viewer or admin token; writes need the admin
//! token. Errors use the standard envelope with the resolver's error kind.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use shopgrid_core::{IsolationTier, Slug, StorefrontId, TenantStats};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireViewer};
use crate::pool::Connector;
use crate::resolver::{MigrationCheck, ResolverError};
use crate::state::AppState;

pub fn routes<C: Connector>() -> Router<AppState<C>> {
    Router::new()
        .route("/{id}/stats", get(stats::<C>))
        .route(
            "/{id}/migration",
            get(check_migration::<C>).post(migrate::<C>),
        )
        .route("/cache/invalidate", post(invalidate_cache::<C>))
}

/// Body of `POST /admin/tenants/{id}/migration`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrateRequest {
    pub target_tier: IsolationTier,
    /// Skip the recommendation check.
    #[serde(default)]
    pub force: bool,
}

/// Body of `POST /admin/tenants/cache/invalidate`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidateRequest {
    pub slug: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

fn parse_id(raw: &str) -> Result<StorefrontId> {
    raw.parse()
        .map_err(|e| ResolverError::InvalidInput(format!("storefront id {raw:?}: {e}")).into())
}

fn parse_slug(raw: &str) -> Result<Slug> {
    Slug::parse(raw)
        .map_err(|e| ResolverError::InvalidInput(format!("slug {raw:?}: {e}")).into())
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

async fn require_storefront<C: Connector>(
    state: &AppState<C>,
    id: StorefrontId,
    cancel: &CancellationToken,
) -> Result<()> {
    match state.resolver().get_by_id(id, cancel).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("storefront {id}"))),
    }
}

#[instrument(skip(state, _role))]
async fn stats<C: Connector>(
    _role: RequireViewer,
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<TenantStats>> {
    let id = parse_id(&id)?;
    let cancel = state.request_token();
    require_storefront(&state, id, &cancel).await?;
    Ok(Json(state.resolver().get_stats(id, &cancel).await?))
}

#[instrument(skip(state, _role))]
async fn check_migration<C: Connector>(
    _role: RequireViewer,
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<MigrationCheck>> {
    let id = parse_id(&id)?;
    let cancel = state.request_token();
    require_storefront(&state, id, &cancel).await?;
    Ok(Json(state.resolver().can_migrate(id, &cancel).await?))
}

#[instrument(skip(state, _admin, body))]
async fn migrate<C: Connector>(
    _admin: RequireAdmin,
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    body: std::result::Result<Json<MigrateRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let request = json_body(body)?;
    let id = parse_id(&id)?;
    let cancel = state.request_token();
    let resolver = state.resolver();
    require_storefront(&state, id, &cancel).await?;

    if !request.force {
        let check = resolver.can_migrate(id, &cancel).await?;
        if !check.can_migrate || check.target_tier != request.target_tier {
            return Err(AppError::MigrationNotRecommended {
                requested: request.target_tier,
                recommended: check.target_tier,
            });
        }
    }

    resolver.migrate(id, request.target_tier).await;
    info!(
        storefront_id = %id,
        target_tier = %request.target_tier,
        forced = request.force,
        "Tenant migration initiated"
    );
    Ok(Json(StatusResponse {
        status: "migration_initiated",
    }))
}

#[instrument(skip(state, _admin, body))]
async fn invalidate_cache<C: Connector>(
    _admin: RequireAdmin,
    State(state): State<AppState<C>>,
    body: std::result::Result<Json<InvalidateRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let request = json_body(body)?;
    if request.slug.is_none() && request.id.is_none() {
        return Err(AppError::BadRequest(
            "provide at least one of slug, id".to_string(),
        ));
    }

    // Parse both before touching the cache so a bad field changes nothing.
    let slug = request.slug.as_deref().map(parse_slug).transpose()?;
    let id = request.id.as_deref().map(parse_id).transpose()?;

    let resolver = state.resolver();
    if let Some(slug) = &slug {
        resolver.invalidate_by_slug(slug);
    }
    if let Some(id) = id {
        resolver.invalidate_by_id(id);
    }
    info!(slug = ?slug.as_ref().map(Slug::as_str), storefront_id = ?id, "Tenant cache invalidated");

    Ok(Json(StatusResponse {
        status: "cache_invalidated",
    }))
}
