//! Offline evaluation of the tier migration rules.
//!
//! Useful when tuning `migration_thresholds`: feed in a tenant's numbers and
//! see which tier the service would recommend.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use shopgrid_core::{IsolationTier, StorefrontId, TenantStats};
use shopgrid_tenancy::config::{ConfigError, ResolverSettings};
use shopgrid_tenancy::migration::{MigrationThresholds, migration_target, recommend};

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// Tenancy config to read thresholds and the default tier from
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The tenant's current tier; adds a migration check to the report
    #[arg(long)]
    pub current: Option<IsolationTier>,

    #[arg(long, default_value_t = 0)]
    pub customers: u64,

    #[arg(long, default_value_t = 0)]
    pub orders: u64,

    /// Storage used, in megabytes
    #[arg(long, default_value_t = 0.0)]
    pub size_mb: f64,

    /// Average query latency, in milliseconds
    #[arg(long, default_value_t = 0.0)]
    pub avg_query_ms: f64,

    /// Queries per second
    #[arg(long, default_value_t = 0.0)]
    pub qps: f64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub recommended_tier: IsolationTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tier: Option<IsolationTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_migrate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tier: Option<IsolationTier>,
}

impl RecommendArgs {
    fn stats(&self) -> TenantStats {
        TenantStats {
            customer_count: self.customers,
            order_count: self.orders,
            storage_usage_mb: self.size_mb,
            avg_query_time_ms: self.avg_query_ms,
            queries_per_second: self.qps,
            ..TenantStats::empty(StorefrontId::new(uuid::Uuid::nil()))
        }
    }
}

/// Evaluate the rules for `args`.
///
/// Without `--config` the built-in thresholds and the `shared` default apply.
///
/// # Errors
///
/// Returns `ConfigError` if the config document cannot be loaded.
pub fn run(args: &RecommendArgs) -> Result<Report, ConfigError> {
    let (thresholds, default) = match &args.config {
        Some(path) => {
            let settings = ResolverSettings::from_file(path)?;
            (settings.migration_thresholds, settings.default_tenant_type)
        }
        None => (MigrationThresholds::default(), IsolationTier::default()),
    };
    Ok(evaluate(args, &thresholds, default))
}

fn evaluate(
    args: &RecommendArgs,
    thresholds: &MigrationThresholds,
    default: IsolationTier,
) -> Report {
    let stats = args.stats();
    let check = args
        .current
        .map(|current| migration_target(current, &stats, thresholds));

    Report {
        recommended_tier: recommend(&stats, thresholds, default),
        current_tier: args.current,
        can_migrate: check.map(|(can, _)| can),
        target_tier: check.map(|(_, target)| target),
    }
}
