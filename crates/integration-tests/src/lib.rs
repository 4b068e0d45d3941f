//! Integration tests for Shopgrid tenancy.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopgrid-integration-tests
//! ```
//!
//! No database is needed: the service is assembled from the in-memory
//! repository and the recording connector in `shopgrid_tenancy::testing`,
//! and HTTP requests go straight into the router with `oneshot`.
//!
//! # Test Categories
//!
//! - `scenarios` - Resolution scenarios through the library API
//! - `tenant_api` - Tenant-scoped routes and health checks
//! - `admin_api` - Admin routes and bearer-token auth

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use shopgrid_core::{SellerId, Slug, Storefront, StorefrontId};
use shopgrid_tenancy::{
    config::{AdminTokens, ResolverSettings},
    db::StorefrontRepository,
    frontend::TenantFrontend,
    resolver::TenantResolver,
    routes,
    state::AppState,
    testing::{FakeConnector, FakeHandle, InMemoryStorefrontRepository},
};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "adm-7f3c9e21b4d84a6f";
pub const VIEWER_TOKEN: &str = "view-52a1d0c8e93b47f6";
pub const PLATFORM_DOMAIN: &str = "shop.io";

/// Tenancy document used unless a test brings its own.
pub const CONFIG: &str = "\
default_tenant_type: shared
tenant_database_pattern: postgres://app@db/tenant_{id}
max_connections_per_tenant: 8
cache_settings:
  storefront_ttl: 60
  stats_ttl: 30
  max_cache_size: 128
  cleanup_interval: 60
";

/// Storefront ID `n`.
#[must_use]
pub fn storefront_id(n: u128) -> StorefrontId {
    StorefrontId::new(Uuid::from_u128(n))
}

/// Storefront `n` owned by seller `1000 + n`.
///
/// # Panics
///
/// Panics if `slug` is not a valid slug.
#[must_use]
pub fn storefront(n: u128, slug: &str, domain: Option<&str>) -> Storefront {
    Storefront {
        id: storefront_id(n),
        slug: Slug::parse(slug).expect("fixture slug"),
        domain: domain.map(str::to_string),
        seller_id: SellerId::new(Uuid::from_u128(1000 + n)),
    }
}

/// The service assembled around in-memory fakes.
pub struct TestApp {
    pub repo: Arc<InMemoryStorefrontRepository>,
    pub resolver: Arc<TenantResolver<FakeConnector>>,
    pub state: AppState<FakeConnector>,
    pub shutdown: CancellationToken,
}

impl TestApp {
    /// [`CONFIG`] with [`PLATFORM_DOMAIN`] and both admin tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CONFIG)
    }

    /// # Panics
    ///
    /// Panics if `yaml` is not a valid tenancy document.
    #[must_use]
    pub fn with_config(yaml: &str) -> Self {
        let settings = ResolverSettings::from_yaml_str(yaml).expect("fixture config");
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let resolver = Arc::new(TenantResolver::new(
            &settings,
            Arc::clone(&repo) as Arc<dyn StorefrontRepository>,
            FakeConnector::new(),
            FakeHandle::shared(),
        ));
        let shutdown = CancellationToken::new();
        let tokens = AdminTokens {
            admin: Some(SecretString::from(ADMIN_TOKEN)),
            viewer: Some(SecretString::from(VIEWER_TOKEN)),
        };
        let state = AppState::new(
            Arc::clone(&resolver),
            Some(PLATFORM_DOMAIN.to_string()),
            tokens,
            shutdown.clone(),
        );
        Self {
            repo,
            resolver,
            state,
            shutdown,
        }
    }

    /// A front-end over the same resolver with its own platform domain.
    #[must_use]
    pub fn frontend(&self, default_domain: Option<&str>) -> TenantFrontend<FakeConnector> {
        TenantFrontend::new(Arc::clone(&self.resolver), default_domain.map(str::to_string))
    }

    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Send one request and decode the body. Non-JSON bodies come back as a
    /// JSON string.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = match self.router().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder shorthand for test requests.
pub struct Req {
    builder: axum::http::request::Builder,
    body: Option<Value>,
}

impl Req {
    #[must_use]
    pub fn get(uri: &str) -> Self {
        Self {
            builder: Request::builder().method("GET").uri(uri),
            body: None,
        }
    }

    #[must_use]
    pub fn post(uri: &str, body: Value) -> Self {
        Self {
            builder: Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json"),
            body: Some(body),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// # Panics
    ///
    /// Panics on an invalid URI or header.
    #[must_use]
    pub fn build(self) -> Request<Body> {
        let body = self
            .body
            .map_or_else(Body::empty, |value| Body::from(value.to_string()));
        self.builder.body(body).expect("test request")
    }
}
