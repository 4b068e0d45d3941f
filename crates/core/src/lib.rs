//! Shopgrid Core - Shared tenancy types library.
//!
//! This crate provides the domain types used across all Shopgrid components:
//! - `tenancy` - Tenant resolution, isolation routing, and admin surface
//! - `cli` - Command-line tools for migrations and config validation
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, slugs, isolation tiers, storefront and tenant context values

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
