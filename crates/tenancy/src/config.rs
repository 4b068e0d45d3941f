//! Tenancy configuration.
//!
//! Two layers, loaded once at startup:
//!
//! 1. [`TenancyConfig`] - process settings from environment variables.
//! 2. [`ResolverSettings`] - the YAML tenancy document (tiers, thresholds,
//!    cache settings) pointed to by `TENANCY_CONFIG_PATH`.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TENANCY_DATABASE_URL` - `PostgreSQL` connection string for the shared store
//!   (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `TENANCY_HOST` - Bind address (default: 127.0.0.1)
//! - `TENANCY_PORT` - Listen port (default: 3000)
//! - `TENANCY_CONFIG_PATH` - YAML tenancy document (default: config/tenancy.yaml)
//! - `TENANCY_DEFAULT_DOMAIN` - Platform domain for subdomain resolution (e.g. shop.io)
//! - `TENANCY_ADMIN_TOKEN` - Bearer token granting the `admin` role
//! - `TENANCY_VIEWER_TOKEN` - Bearer token granting the `viewer` role
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shopgrid_core::{AdminRole, IsolationTier};
use thiserror::Error;

use crate::migration::MigrationThresholds;
use crate::pool::ID_PLACEHOLDER;
use crate::resolver::TierOverrides;

const MIN_TOKEN_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Failed to read {0}: {1}")]
    Io(String, String),
    #[error("Invalid tenancy config: {0}")]
    Parse(String),
    #[error("Invalid setting {0}: {1}")]
    InvalidSetting(&'static str, String),
}

// =============================================================================
// Process settings (environment)
// =============================================================================

/// Tenancy service configuration.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Shared `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Path to the YAML tenancy document
    pub config_path: PathBuf,
    /// Platform domain whose subdomains are storefront slugs
    pub default_domain: Option<String>,
    /// Admin API tokens
    pub admin_tokens: AdminTokens,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Bearer tokens accepted by the admin API.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone, Default)]
pub struct AdminTokens {
    pub admin: Option<SecretString>,
    pub viewer: Option<SecretString>,
}

impl std::fmt::Debug for AdminTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<SecretString>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AdminTokens")
            .field("admin", &redact(&self.admin))
            .field("viewer", &redact(&self.viewer))
            .finish()
    }
}

impl AdminTokens {
    /// The role a presented bearer token grants, if any.
    ///
    /// The admin token is checked first so a deployment that reuses one
    /// token for both roles still gets write access.
    #[must_use]
    pub fn role_for(&self, presented: &str) -> Option<AdminRole> {
        let matches = |slot: &Option<SecretString>| {
            slot.as_ref()
                .is_some_and(|secret| secret_matches(secret, presented))
        };
        if matches(&self.admin) {
            Some(AdminRole::Admin)
        } else if matches(&self.viewer) {
            Some(AdminRole::Viewer)
        } else {
            None
        }
    }

    /// Whether any token is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.admin.is_some() || self.viewer.is_some()
    }
}

impl TenancyConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if admin tokens fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("TENANCY_DATABASE_URL")?;
        let host = get_env_or_default("TENANCY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("TENANCY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("TENANCY_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("TENANCY_PORT".to_string(), e.to_string()))?;
        let config_path = PathBuf::from(get_env_or_default(
            "TENANCY_CONFIG_PATH",
            "config/tenancy.yaml",
        ));
        let default_domain =
            get_optional_env("TENANCY_DEFAULT_DOMAIN").map(|d| normalize_domain(&d));

        let admin_tokens = AdminTokens {
            admin: get_optional_validated_secret("TENANCY_ADMIN_TOKEN")?,
            viewer: get_optional_validated_secret("TENANCY_VIEWER_TOKEN")?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            config_path,
            default_domain,
            admin_tokens,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

// =============================================================================
// Resolver settings (YAML)
// =============================================================================

/// Cache TTLs and sweep cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(deserialize_with = "duration_serde::deserialize")]
    pub storefront_ttl: Duration,
    #[serde(deserialize_with = "duration_serde::deserialize")]
    pub stats_ttl: Duration,
    pub max_cache_size: usize,
    #[serde(deserialize_with = "duration_serde::deserialize")]
    pub cleanup_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            storefront_ttl: Duration::from_secs(300),
            stats_ttl: Duration::from_secs(60),
            max_cache_size: 10_000,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// The YAML tenancy document as written on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResolverSettingsFile {
    #[serde(default)]
    default_tenant_type: IsolationTier,
    #[serde(default)]
    tenant_overrides: HashMap<String, IsolationTier>,
    shared_database_url: Option<String>,
    tenant_database_pattern: String,
    #[serde(default = "default_max_connections")]
    max_connections_per_tenant: u32,
    #[serde(default)]
    migration_thresholds: MigrationThresholds,
    #[serde(default)]
    cache_settings: CacheSettings,
}

/// Upper bound for every cache TTL and the sweep interval.
const MAX_CACHE_DURATION: Duration = Duration::from_secs(365 * 24 * 3600);

const fn default_max_connections() -> u32 {
    20
}

/// Validated resolver settings.
///
/// Immutable after construction; runtime tier overrides set by migrations
/// live in the resolver, seeded from `tenant_overrides`.
#[derive(Clone)]
pub struct ResolverSettings {
    pub default_tenant_type: IsolationTier,
    /// Configured by storefront ID or slug.
    pub tenant_overrides: TierOverrides,
    pub shared_database_url: Option<SecretString>,
    /// Per-tenant connection string with one `{id}` slot.
    pub tenant_database_pattern: SecretString,
    pub max_connections_per_tenant: u32,
    pub migration_thresholds: MigrationThresholds,
    pub cache_settings: CacheSettings,
}

impl std::fmt::Debug for ResolverSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverSettings")
            .field("default_tenant_type", &self.default_tenant_type)
            .field("tenant_overrides", &self.tenant_overrides)
            .field(
                "shared_database_url",
                &self.shared_database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("tenant_database_pattern", &"[REDACTED]")
            .field("max_connections_per_tenant", &self.max_connections_per_tenant)
            .field("migration_thresholds", &self.migration_thresholds)
            .field("cache_settings", &self.cache_settings)
            .finish()
    }
}

impl ResolverSettings {
    /// Load and validate the YAML tenancy document from disk.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise see
    /// [`ResolverSettings::from_yaml_str`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML tenancy document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed YAML or unknown tier names,
    /// and `ConfigError::InvalidSetting` for values that parse but cannot work
    /// (zero cache size, a zero or longer-than-a-year duration, pattern
    /// without an ID slot, zero connections, an override key that is neither
    /// an ID nor a slug).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: ResolverSettingsFile =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if file.cache_settings.max_cache_size == 0 {
            return Err(ConfigError::InvalidSetting(
                "cache_settings.max_cache_size",
                "must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("cache_settings.storefront_ttl", file.cache_settings.storefront_ttl),
            ("cache_settings.stats_ttl", file.cache_settings.stats_ttl),
            ("cache_settings.cleanup_interval", file.cache_settings.cleanup_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidSetting(name, "must be positive".to_string()));
            }
            if value > MAX_CACHE_DURATION {
                return Err(ConfigError::InvalidSetting(
                    name,
                    format!("must not exceed {}s", MAX_CACHE_DURATION.as_secs()),
                ));
            }
        }
        if file.max_connections_per_tenant == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_connections_per_tenant",
                "must be at least 1".to_string(),
            ));
        }
        if !file.tenant_database_pattern.contains(ID_PLACEHOLDER)
            && !file.tenant_database_pattern.contains("%s")
        {
            return Err(ConfigError::InvalidSetting(
                "tenant_database_pattern",
                format!("must contain a {ID_PLACEHOLDER} slot"),
            ));
        }

        let tenant_overrides = TierOverrides::parse(&file.tenant_overrides)?;

        Ok(Self {
            default_tenant_type: file.default_tenant_type,
            tenant_overrides,
            shared_database_url: file.shared_database_url.map(SecretString::from),
            tenant_database_pattern: SecretString::from(file.tenant_database_pattern),
            max_connections_per_tenant: file.max_connections_per_tenant,
            migration_thresholds: file.migration_thresholds,
            cache_settings: file.cache_settings,
        })
    }

    /// Shared store URL, preferring the document over the environment.
    #[must_use]
    pub fn shared_url<'a>(&'a self, env_url: &'a SecretString) -> &'a SecretString {
        self.shared_database_url.as_ref().unwrap_or(env_url)
    }
}

/// Durations as integer seconds or `"250ms"`, `"30s"`, `"5m"`, `"1h"`.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }

    pub(super) fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration {text:?}"))?;
        match unit.trim() {
            "ms" => Ok(Duration::from_millis(value)),
            "" | "s" => Ok(Duration::from_secs(value)),
            "m" => scaled(value, 60, text),
            "h" => scaled(value, 3600, text),
            other => Err(format!("unknown duration unit {other:?} in {text:?}")),
        }
    }

    fn scaled(value: u64, secs_per_unit: u64, text: &str) -> Result<Duration, String> {
        value
            .checked_mul(secs_per_unit)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration {text:?} is out of range"))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a token is long, not a placeholder, and has sufficient entropy.
fn validate_token_strength(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }

    let lower = token.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Load and validate an optional secret from environment.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    match get_optional_env(key) {
        Some(value) => {
            validate_token_strength(&value, key)?;
            Ok(Some(SecretString::from(value)))
        }
        None => Ok(None),
    }
}

/// Expose a secret for comparison without cloning it into a `String`.
pub(crate) fn secret_matches(secret: &SecretString, candidate: &str) -> bool {
    let expected = secret.expose_secret().as_bytes();
    let candidate = candidate.as_bytes();
    // Length leaks, contents do not.
    expected.len() == candidate.len()
        && expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MINIMAL: &str = "tenant_database_pattern: postgres://app@db/tenant_{id}\n";

    #[test]
    fn test_minimal_document_uses_defaults() {
        let settings = ResolverSettings::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(settings.default_tenant_type, IsolationTier::Shared);
        assert!(settings.tenant_overrides.is_empty());
        assert_eq!(settings.max_connections_per_tenant, 20);
        assert_eq!(settings.cache_settings, CacheSettings::default());
        assert!(settings.shared_database_url.is_none());
    }

    #[test]
    fn test_full_document() {
        let yaml = r"
default_tenant_type: schema
tenant_overrides:
  acme: database
  0190a6b2-7c1e-7d3a-9f00-4b1c2d3e4f50: shared
shared_database_url: postgres://app@db/shared
tenant_database_pattern: postgres://app@db/tenant_{id}
max_connections_per_tenant: 8
migration_thresholds:
  schema:
    customers: 500
    orders: 5000
    size_mb: 512
    avg_query_ms: 80
    qps: 20
  database:
    customers: 10000
    orders: 100000
    size_mb: 10240
    avg_query_ms: 250
    qps: 400
cache_settings:
  storefront_ttl: 5m
  stats_ttl: 30s
  max_cache_size: 2048
  cleanup_interval: 90
";
        let settings = ResolverSettings::from_yaml_str(yaml).unwrap();
        assert_eq!(settings.default_tenant_type, IsolationTier::Schema);
        assert_eq!(
            settings
                .tenant_overrides
                .for_slug(&shopgrid_core::Slug::parse("acme").unwrap()),
            Some(IsolationTier::Database)
        );
        assert_eq!(settings.max_connections_per_tenant, 8);
        assert_eq!(settings.migration_thresholds.database.customers, 10_000);
        assert!((settings.migration_thresholds.schema.qps - 20.0).abs() < f64::EPSILON);
        assert_eq!(settings.cache_settings.storefront_ttl, Duration::from_secs(300));
        assert_eq!(settings.cache_settings.stats_ttl, Duration::from_secs(30));
        assert_eq!(settings.cache_settings.max_cache_size, 2048);
        assert_eq!(settings.cache_settings.cleanup_interval, Duration::from_secs(90));
    }

    #[test]
    fn test_shipped_config_parses() {
        let settings =
            ResolverSettings::from_yaml_str(include_str!("../config/tenancy.yaml")).unwrap();
        assert_eq!(settings.default_tenant_type, IsolationTier::Shared);
        assert!(settings.tenant_overrides.is_empty());
        assert_eq!(settings.cache_settings, CacheSettings::default());
        assert_eq!(settings.migration_thresholds, MigrationThresholds {
            schema: crate::migration::Thresholds {
                qps: 0.0,
                ..MigrationThresholds::default().schema
            },
            ..MigrationThresholds::default()
        });
    }

    #[test]
    fn test_bad_override_key_rejected() {
        let yaml = format!("{MINIMAL}tenant_overrides:\n  Not_A_Slug: schema\n");
        assert!(matches!(
            ResolverSettings::from_yaml_str(&yaml),
            Err(ConfigError::InvalidSetting("tenant_overrides", _))
        ));
    }

    #[test]
    fn test_unknown_tier_rejected_at_load() {
        let yaml = format!("{MINIMAL}default_tenant_type: dedicated\n");
        let err = ResolverSettings::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let yaml = format!("{MINIMAL}tenant_overrides:\n  acme: cluster\n");
        assert!(matches!(
            ResolverSettings::from_yaml_str(&yaml).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_pattern_requires_slot() {
        let err =
            ResolverSettings::from_yaml_str("tenant_database_pattern: postgres://db/tenant\n")
                .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSetting("tenant_database_pattern", _)
        ));
        assert!(
            ResolverSettings::from_yaml_str("tenant_database_pattern: postgres://db/t_%s\n")
                .is_ok()
        );
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let yaml = format!("{MINIMAL}cache_settings:\n  max_cache_size: 0\n");
        assert!(matches!(
            ResolverSettings::from_yaml_str(&yaml).unwrap_err(),
            ConfigError::InvalidSetting("cache_settings.max_cache_size", _)
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let yaml = format!("{MINIMAL}cache_settings:\n  stats_ttl: 0s\n");
        assert!(matches!(
            ResolverSettings::from_yaml_str(&yaml).unwrap_err(),
            ConfigError::InvalidSetting("cache_settings.stats_ttl", _)
        ));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let yaml = format!("{MINIMAL}cache_settings:\n  storefront_ttl: 18446744073709551615\n");
        assert!(matches!(
            ResolverSettings::from_yaml_str(&yaml).unwrap_err(),
            ConfigError::InvalidSetting("cache_settings.storefront_ttl", _)
        ));

        let yaml = format!("{MINIMAL}cache_settings:\n  cleanup_interval: 9000h\n");
        assert!(matches!(
            ResolverSettings::from_yaml_str(&yaml).unwrap_err(),
            ConfigError::InvalidSetting("cache_settings.cleanup_interval", _)
        ));

        let yaml = format!("{MINIMAL}cache_settings:\n  stats_ttl: 8760h\n");
        assert!(ResolverSettings::from_yaml_str(&yaml).is_ok());
    }

    #[test]
    fn test_duration_unit_overflow_is_an_error() {
        assert!(duration_serde::parse("18446744073709551615m").is_err());
        assert!(duration_serde::parse("5124095576030432h").is_err());
        assert_eq!(
            duration_serde::parse("5124095576030431h").unwrap(),
            Duration::from_secs(5_124_095_576_030_431 * 3600)
        );
        assert!(matches!(
            ResolverSettings::from_yaml_str(&format!(
                "{MINIMAL}cache_settings:\n  stats_ttl: 18446744073709551615h\n"
            ))
            .unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!(duration_serde::parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(duration_serde::parse("45").unwrap(), Duration::from_secs(45));
        assert_eq!(duration_serde::parse("2h").unwrap(), Duration::from_secs(7200));
        assert!(duration_serde::parse("5 fortnights").is_err());
        assert!(duration_serde::parse("m").is_err());
    }

    #[test]
    fn test_settings_debug_redacts_urls() {
        let yaml = "shared_database_url: postgres://app:hunter2@db/shared\ntenant_database_pattern: postgres://app:hunter2@db/t_{id}\n";
        let settings = ResolverSettings::from_yaml_str(yaml).unwrap();
        let debug_output = format!("{settings:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_token_strength() {
        assert!(matches!(
            validate_token_strength("short", "T"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_token_strength(&"a".repeat(40), "T").is_err());
        assert!(validate_token_strength("your-admin-token-goes-here-0123456789", "T").is_err());
        assert!(validate_token_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%", "T").is_ok());
    }

    #[test]
    fn test_secret_matches() {
        let secret = SecretString::from("aB3$xY9!mK2@nL5#");
        assert!(secret_matches(&secret, "aB3$xY9!mK2@nL5#"));
        assert!(!secret_matches(&secret, "aB3$xY9!mK2@nL5"));
        assert!(!secret_matches(&secret, "aB3$xY9!mK2@nL5$"));
    }

    #[test]
    fn test_role_for_token() {
        let tokens = AdminTokens {
            admin: Some(SecretString::from("admin-token-value")),
            viewer: Some(SecretString::from("viewer-token-value")),
        };
        assert!(tokens.is_configured());
        assert_eq!(tokens.role_for("admin-token-value"), Some(AdminRole::Admin));
        assert_eq!(tokens.role_for("viewer-token-value"), Some(AdminRole::Viewer));
        assert_eq!(tokens.role_for("viewer-token-valu"), None);
        assert_eq!(AdminTokens::default().role_for(""), None);
        assert!(!AdminTokens::default().is_configured());
    }

    #[test]
    fn test_admin_tokens_debug_redacts() {
        let tokens = AdminTokens {
            admin: Some(SecretString::from("super-private-admin-token")),
            viewer: None,
        };
        let debug_output = format!("{tokens:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-private"));
    }
}
