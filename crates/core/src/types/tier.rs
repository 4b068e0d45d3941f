//! Tenant isolation tiers.

use serde::{Deserialize, Serialize};

/// The strategy by which a tenant's data is physically separated.
///
/// Variants are ordered from weakest to strongest isolation, so
/// `IsolationTier::Shared < IsolationTier::Database`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum IsolationTier {
    /// Row-level isolation in the common store.
    #[default]
    Shared,
    /// Dedicated schema inside the shared store.
    Schema,
    /// Dedicated database per tenant.
    Database,
}

impl IsolationTier {
    /// All tiers, weakest first.
    pub const ALL: [Self; 3] = [Self::Shared, Self::Schema, Self::Database];

    /// The canonical lowercase name used in config files and API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Schema => "schema",
            Self::Database => "database",
        }
    }

    /// Whether requests for this tier are served from the shared store.
    #[must_use]
    pub const fn uses_shared_store(&self) -> bool {
        matches!(self, Self::Shared | Self::Schema)
    }
}

impl std::fmt::Display for IsolationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised tier name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown isolation tier: {0}")]
pub struct UnknownTier(pub String);

impl std::str::FromStr for IsolationTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "schema" => Ok(Self::Schema),
            "database" => Ok(Self::Database),
            _ => Err(UnknownTier(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_isolation_strength() {
        assert!(IsolationTier::Shared < IsolationTier::Schema);
        assert!(IsolationTier::Schema < IsolationTier::Database);
    }

    #[test]
    fn test_from_str_round_trips_display() {
        for tier in IsolationTier::ALL {
            assert_eq!(tier.to_string().parse::<IsolationTier>().unwrap(), tier);
        }
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let err = "dedicated".parse::<IsolationTier>().unwrap_err();
        assert_eq!(err.to_string(), "unknown isolation tier: dedicated");
        assert!("Shared".parse::<IsolationTier>().is_err());
    }

    #[test]
    fn test_serde_rejects_unknown_variant() {
        assert!(serde_json::from_str::<IsolationTier>("\"cluster\"").is_err());
        assert_eq!(
            serde_json::from_str::<IsolationTier>("\"schema\"").unwrap(),
            IsolationTier::Schema
        );
    }

    #[test]
    fn test_shared_store_tiers() {
        assert!(IsolationTier::Shared.uses_shared_store());
        assert!(IsolationTier::Schema.uses_shared_store());
        assert!(!IsolationTier::Database.uses_shared_store());
    }
}
