//! Shopgrid tenancy library.
//!
//! Resolves incoming requests to storefront tenants and routes each tenant
//! to the database handle for its isolation tier.
//!
//! # Modules
//!
//! - [`cache`] - Bounded TTL caches behind the [`cache::TenantCache`] contract
//! - [`db`] - Storefront repository port and its `PostgreSQL` adapter
//! - [`pool`] - Per-tenant connection registry with single-flight creation
//! - [`migration`] - Isolation tier rule engine
//! - [`resolver`] - The tenant resolver composing all of the above
//! - [`frontend`] - Request hint extraction and strategy precedence
//! - [`tasks`] - Supervised cache and pool sweeps
//! - [`middleware`], [`routes`] - Axum surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod frontend;
pub mod middleware;
pub mod migration;
pub mod pool;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod tasks;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
