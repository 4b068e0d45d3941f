//! Core types for Shopgrid.
//!
//! This module provides type-safe wrappers for tenancy domain concepts.

pub mod id;
pub mod role;
pub mod slug;
pub mod storefront;
pub mod tier;

pub use id::*;
pub use role::AdminRole;
pub use slug::{Slug, SlugError};
pub use storefront::{Storefront, TenantContext, TenantStats};
pub use tier::{IsolationTier, UnknownTier};
