//! Unified HTTP error handling with Sentry integration.
//!
//! Every handler and extractor returns `Result<T, AppError>`. Responses use
//! one JSON envelope:
//!
//! ```json
//! {"error": "tenant_unreachable", "message": "...", "details": "..."}
//! ```
//!
//! `error` is a stable kind string; `details` is only present for client
//! errors. Server errors are captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shopgrid_core::IsolationTier;
use thiserror::Error;

use crate::resolver::ResolverError;

/// Application-level error type for the tenancy service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resolution or handle acquisition failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// No lookup strategy matched the request.
    #[error("No storefront matches this request")]
    TenantNotFound,

    /// A named resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input from the client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or unknown credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but the role may not do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A migration was requested without `force` to a tier the rules don't
    /// recommend.
    #[error("Migration to {requested} not recommended (recommended: {recommended})")]
    MigrationNotRecommended {
        requested: IsolationTier,
        recommended: IsolationTier,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Stable machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Resolver(err) => err.kind(),
            Self::TenantNotFound => "tenant_not_found",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::MigrationNotRecommended { .. } => "migration_not_recommended",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Resolver(ResolverError::InvalidInput(_))
            | Self::TenantNotFound
            | Self::BadRequest(_)
            | Self::MigrationNotRecommended { .. } => StatusCode::BAD_REQUEST,
            Self::Resolver(ResolverError::Canceled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Resolver(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                kind = self.kind(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let (message, details) = match &self {
            Self::Resolver(ResolverError::TenantUnreachable(_) | ResolverError::ConnectFailed(_)) => {
                ("Tenant database unavailable".to_string(), None)
            }
            Self::Resolver(ResolverError::Canceled) => ("Request canceled".to_string(), None),
            Self::Resolver(ResolverError::InvalidInput(detail)) => {
                ("Invalid storefront identifier".to_string(), Some(detail.clone()))
            }
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                ("Internal server error".to_string(), None)
            }
            Self::BadRequest(detail) => ("Bad request".to_string(), Some(detail.clone())),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
