//! Tenancy config validation.
//!
//! Loads a YAML tenancy document with the same rules the service applies at
//! start-up and prints what it resolved to. Connection strings are never
//! printed.

use std::path::Path;

use shopgrid_tenancy::config::{ConfigError, ResolverSettings};

/// Validate the document at `path` and print a summary.
///
/// # Errors
///
/// Returns the `ConfigError` the service would fail to start with.
pub fn check(path: &Path) -> Result<(), ConfigError> {
    let settings = ResolverSettings::from_file(path)?;
    tracing::info!(path = %path.display(), "Tenancy config is valid");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", summary(&settings));
    }
    Ok(())
}

fn summary(settings: &ResolverSettings) -> String {
    let thresholds = &settings.migration_thresholds;
    let cache = &settings.cache_settings;
    let shared = if settings.shared_database_url.is_some() {
        "config document"
    } else {
        "TENANCY_DATABASE_URL"
    };

    format!(
        "default tier:        {default}\n\
         tier overrides:      {overrides}\n\
         shared store from:   {shared}\n\
         tenant connections:  {max_conn} per pool\n\
         schema promotion:    customers > {sc}, orders > {so}, size > {ss} MB, avg query > {sq} ms\n\
         database promotion:  customers > {dc}, orders > {do_}, size > {ds} MB, avg query > {dq} ms, qps > {dqps}\n\
         storefront ttl:      {sf_ttl:?}\n\
         stats ttl:           {st_ttl:?}\n\
         max cache size:      {max_size}\n\
         cleanup interval:    {cleanup:?}",
        default = settings.default_tenant_type,
        overrides = settings.tenant_overrides.len(),
        max_conn = settings.max_connections_per_tenant,
        sc = thresholds.schema.customers,
        so = thresholds.schema.orders,
        ss = thresholds.schema.size_mb,
        sq = thresholds.schema.avg_query_ms,
        dc = thresholds.database.customers,
        do_ = thresholds.database.orders,
        ds = thresholds.database.size_mb,
        dq = thresholds.database.avg_query_ms,
        dqps = thresholds.database.qps,
        sf_ttl = cache.storefront_ttl,
        st_ttl = cache.stats_ttl,
        max_size = cache.max_cache_size,
        cleanup = cache.cleanup_interval,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_hides_connection_strings() {
        let settings = ResolverSettings::from_yaml_str(
            "\
shared_database_url: postgres://app:hunter2@db/shared
tenant_database_pattern: postgres://app:hunter2@db/tenant_{id}
tenant_overrides:
  acme: database
",
        )
        .unwrap();

        let text = summary(&settings);
        assert!(text.contains("default tier:        shared"));
        assert!(text.contains("tier overrides:      1"));
        assert!(text.contains("shared store from:   config document"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_check_reports_missing_file() {
        let err = check(Path::new("/nonexistent/tenancy.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }
}
