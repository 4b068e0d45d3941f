//! Bearer-token authentication for the admin API.
//!
//! Two roles: `viewer` may read stats and migration checks, `admin` may
//! also migrate tenants and invalidate caches. With no tokens configured
//! every admin request is refused.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use shopgrid_core::AdminRole;
use tracing::{Span, warn};

use crate::error::AppError;
use crate::pool::Connector;
use crate::state::AppState;

/// Extractor for read-only admin endpoints. Carries the caller's role.
pub struct RequireViewer(pub AdminRole);

/// Extractor for admin endpoints that change state.
pub struct RequireAdmin;

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

fn authenticate<C: Connector>(parts: &Parts, state: &AppState<C>) -> Result<AdminRole, AppError> {
    let role = bearer_token(parts)
        .and_then(|token| state.admin_tokens().role_for(token))
        .ok_or_else(|| {
            warn!(path = %parts.uri.path(), "Rejected admin request without valid token");
            AppError::Unauthorized
        })?;
    Span::current().record("admin_role", role.to_string());
    Ok(role)
}

impl<C: Connector> FromRequestParts<AppState<C>> for RequireViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<C>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}

impl<C: Connector> FromRequestParts<AppState<C>> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<C>,
    ) -> Result<Self, Self::Rejection> {
        let role = authenticate(parts, state)?;
        if role.can_write() {
            Ok(Self)
        } else {
            Err(AppError::Forbidden(format!("role {role} is read-only")))
        }
    }
}
