//! Isolation-tier migration rules.
//!
//! A pure function from usage statistics and thresholds to a recommended
//! tier. Every comparison is a strict `>`, so a tenant sitting exactly on a
//! threshold stays where it is.
//!
//! Operator overrides are applied by the resolver, never here.

use serde::Deserialize;
use shopgrid_core::{IsolationTier, TenantStats};

/// Promotion limits for one tier. Exceeding any single limit triggers it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    pub customers: u64,
    pub orders: u64,
    pub size_mb: f64,
    pub avg_query_ms: f64,
    /// Only consulted for database promotion.
    #[serde(default)]
    pub qps: f64,
}

/// Thresholds for promotion into the schema and database tiers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationThresholds {
    pub schema: Thresholds,
    pub database: Thresholds,
}

impl Default for MigrationThresholds {
    fn default() -> Self {
        Self {
            schema: Thresholds {
                customers: 1_000,
                orders: 10_000,
                size_mb: 1_024.0,
                avg_query_ms: 100.0,
                qps: 50.0,
            },
            database: Thresholds {
                customers: 10_000,
                orders: 100_000,
                size_mb: 10_240.0,
                avg_query_ms: 500.0,
                qps: 500.0,
            },
        }
    }
}

/// True iff any database-tier limit is exceeded.
#[must_use]
pub fn wants_database(stats: &TenantStats, thresholds: &MigrationThresholds) -> bool {
    let dt = &thresholds.database;
    stats.customer_count > dt.customers
        || stats.order_count > dt.orders
        || stats.storage_usage_mb > dt.size_mb
        || stats.avg_query_time_ms > dt.avg_query_ms
        || stats.queries_per_second > dt.qps
}

/// True iff any schema-tier limit is exceeded. Query rate is not considered.
#[must_use]
pub fn wants_schema(stats: &TenantStats, thresholds: &MigrationThresholds) -> bool {
    let st = &thresholds.schema;
    stats.customer_count > st.customers
        || stats.order_count > st.orders
        || stats.storage_usage_mb > st.size_mb
        || stats.avg_query_time_ms > st.avg_query_ms
}

/// Recommend an isolation tier for the given stats.
///
/// Database wins over schema; with neither triggered the configured default
/// is returned. The default is also a floor: a tenant is never recommended a
/// weaker tier than it, so raising any stat never lowers the result.
#[must_use]
pub fn recommend(
    stats: &TenantStats,
    thresholds: &MigrationThresholds,
    default: IsolationTier,
) -> IsolationTier {
    let triggered = if wants_database(stats, thresholds) {
        IsolationTier::Database
    } else if wants_schema(stats, thresholds) {
        IsolationTier::Schema
    } else {
        return default;
    };
    triggered.max(default)
}

/// Decide whether a tenant currently on `current` should move, and where.
///
/// Returns `(true, Database)` when not already on the database tier and the
/// database rule fires; `(true, Schema)` when on the shared tier and the
/// schema rule fires; otherwise `(false, current)`.
#[must_use]
pub fn migration_target(
    current: IsolationTier,
    stats: &TenantStats,
    thresholds: &MigrationThresholds,
) -> (bool, IsolationTier) {
    if current != IsolationTier::Database && wants_database(stats, thresholds) {
        (true, IsolationTier::Database)
    } else if current == IsolationTier::Shared && wants_schema(stats, thresholds) {
        (true, IsolationTier::Schema)
    } else {
        (false, current)
    }
}
