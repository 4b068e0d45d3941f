//! Shopgrid Tenancy - tenant resolution and isolation routing service.
//!
//! Serves the admin tenancy API and health checks, and resolves tenants for
//! `/api` routes.
//!
//! # Start-up
//!
//! 1. Load environment config and the YAML tenancy document
//! 2. Open the shared store pool (also backs the storefront repository)
//! 3. Build the resolver and start maintenance
//! 4. Serve until SIGINT/SIGTERM, then stop maintenance and close tenant pools
//!
//! Migrations are not run on start-up; use `shopgrid-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, Response};
use sentry::integrations::tracing as sentry_tracing;
use shopgrid_tenancy::config::{ResolverSettings, TenancyConfig};
use shopgrid_tenancy::db::{PgStorefrontRepository, StorefrontRepository, create_pool};
use shopgrid_tenancy::pool::PgConnector;
use shopgrid_tenancy::resolver::TenantResolver;
use shopgrid_tenancy::routes;
use shopgrid_tenancy::state::AppState;
use shopgrid_tenancy::tasks::Maintenance;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &TenancyConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = TenancyConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopgrid_tenancy=info,tower_http=debug".into());

    // JSON logs when LOG_FORMAT=json, text otherwise
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let json_layer = json_logs.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let settings =
        ResolverSettings::from_file(&config.config_path).expect("Failed to load tenancy config");
    tracing::info!(
        path = %config.config_path.display(),
        default_tier = %settings.default_tenant_type,
        overrides = settings.tenant_overrides.len(),
        "Tenancy config loaded"
    );

    let shared_pool = create_pool(settings.shared_url(&config.database_url))
        .await
        .expect("Failed to create shared database pool");
    tracing::info!("Shared database pool created");

    let repository: Arc<dyn StorefrontRepository> =
        Arc::new(PgStorefrontRepository::new(shared_pool.clone()));
    let resolver = Arc::new(TenantResolver::new(
        &settings,
        repository,
        PgConnector,
        shared_pool.clone(),
    ));

    let shutdown = CancellationToken::new();
    let maintenance = Maintenance::spawn(
        Arc::clone(&resolver),
        settings.cache_settings.cleanup_interval,
        shutdown.child_token(),
    );

    let state = AppState::new(
        Arc::clone(&resolver),
        config.default_domain.clone(),
        config.admin_tokens.clone(),
        shutdown.clone(),
    );

    let app = routes::router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        storefront_id = tracing::field::Empty,
                        tenant_tier = tracing::field::Empty,
                        admin_role = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("tenancy listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            serve_shutdown.cancel();
        })
        .await
        .expect("Server error");

    maintenance.shutdown().await;
    shared_pool.close().await;
    tracing::info!("Shutdown complete");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
