//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! shopgrid-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `TENANCY_DATABASE_URL` - `PostgreSQL` connection string for the shared
//!   store (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Tenancy migrations live in `crates/tenancy/migrations/` and create the
//! `tenancy` schema with the storefront directory and usage statistics.

use sqlx::PgPool;
use thiserror::Error;

const URL_VARS: [&str; 2] = ["TENANCY_DATABASE_URL", "DATABASE_URL"];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {}", URL_VARS.join(" or "))]
    MissingEnvVar,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

fn database_url() -> Result<String, MigrationError> {
    URL_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .ok_or(MigrationError::MissingEnvVar)
}

/// Apply the tenancy schema migrations to the shared store.
///
/// # Errors
///
/// Returns `MigrationError` if no database URL is configured, the database
/// is unreachable, or a migration fails.
pub async fn tenancy() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();
    let database_url = database_url()?;

    tracing::info!("Connecting to tenancy database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running tenancy migrations...");
    sqlx::migrate!("../tenancy/migrations").run(&pool).await?;
    pool.close().await;

    tracing::info!("Tenancy migrations complete!");
    Ok(())
}
