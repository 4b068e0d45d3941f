//! HTTP middleware and extractors for the tenancy service.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, error capture)
//! 2. `TraceLayer` (`http_request` span with `request_id`, `storefront_id`
//!    and `tenant_tier` fields left empty for later layers)
//! 3. Request ID (record/propagate `x-request-id`)
//! 4. Tenant resolution (tenant-scoped routes only)
//!
//! Admin routes authenticate per handler through the [`RequireViewer`] and
//! [`RequireAdmin`] extractors.

pub mod admin_auth;
pub mod request_id;
pub mod tenant;

pub use admin_auth::{RequireAdmin, RequireViewer};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use tenant::{OptionalTenant, RequireTenant, TenantHandle, tenant_middleware};
