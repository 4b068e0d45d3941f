//! Operator tier overrides.

use std::collections::HashMap;

use shopgrid_core::{IsolationTier, Slug, Storefront, StorefrontId};

use crate::config::ConfigError;

/// Explicit tier decisions that bypass the migration rules.
///
/// Configured keys may be storefront IDs or slugs; runtime migrations always
/// write by ID. An ID override wins over a slug override for the same
/// storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierOverrides {
    by_id: HashMap<StorefrontId, IsolationTier>,
    by_slug: HashMap<Slug, IsolationTier>,
}

impl TierOverrides {
    /// Parse configured `key -> tier` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSetting` for a key that is neither a UUID
    /// nor a valid slug.
    pub fn parse(raw: &HashMap<String, IsolationTier>) -> Result<Self, ConfigError> {
        let mut overrides = Self::default();
        for (key, tier) in raw {
            if let Ok(id) = key.parse::<StorefrontId>() {
                overrides.by_id.insert(id, *tier);
            } else {
                let slug = Slug::parse(key).map_err(|e| {
                    ConfigError::InvalidSetting(
                        "tenant_overrides",
                        format!("{key:?} is neither a storefront ID nor a slug: {e}"),
                    )
                })?;
                overrides.by_slug.insert(slug, *tier);
            }
        }
        Ok(overrides)
    }

    #[must_use]
    pub fn for_id(&self, id: StorefrontId) -> Option<IsolationTier> {
        self.by_id.get(&id).copied()
    }

    #[must_use]
    pub fn for_slug(&self, slug: &Slug) -> Option<IsolationTier> {
        self.by_slug.get(slug).copied()
    }

    /// ID override first, then slug override.
    #[must_use]
    pub fn for_storefront(&self, storefront: &Storefront) -> Option<IsolationTier> {
        self.for_id(storefront.id)
            .or_else(|| self.for_slug(&storefront.slug))
    }

    #[must_use]
    pub fn has_slug_overrides(&self) -> bool {
        !self.by_slug.is_empty()
    }

    /// Set an ID override, returning the previous one.
    pub fn set(&mut self, id: StorefrontId, tier: IsolationTier) -> Option<IsolationTier> {
        self.by_id.insert(id, tier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len() + self.by_slug.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_slug.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopgrid_core::SellerId;
    use uuid::Uuid;

    use super::*;

    const ID: &str = "0190a6b2-7c1e-7d3a-9f00-4b1c2d3e4f50";

    #[test]
    fn test_parse_splits_ids_and_slugs() {
        let raw = HashMap::from([
            (ID.to_string(), IsolationTier::Database),
            ("acme".to_string(), IsolationTier::Schema),
        ]);
        let overrides = TierOverrides::parse(&raw).unwrap();
        assert_eq!(
            overrides.for_id(ID.parse().unwrap()),
            Some(IsolationTier::Database)
        );
        assert_eq!(
            overrides.for_slug(&Slug::parse("acme").unwrap()),
            Some(IsolationTier::Schema)
        );
        assert_eq!(overrides.len(), 2);
        assert!(overrides.has_slug_overrides());
    }

    #[test]
    fn test_parse_rejects_garbage_key() {
        let raw = HashMap::from([("Not A Key!".to_string(), IsolationTier::Shared)]);
        assert!(matches!(
            TierOverrides::parse(&raw),
            Err(ConfigError::InvalidSetting("tenant_overrides", _))
        ));
    }

    #[test]
    fn test_id_beats_slug() {
        let raw = HashMap::from([
            (ID.to_string(), IsolationTier::Database),
            ("acme".to_string(), IsolationTier::Schema),
        ]);
        let overrides = TierOverrides::parse(&raw).unwrap();
        let storefront = Storefront {
            id: ID.parse().unwrap(),
            slug: Slug::parse("acme").unwrap(),
            domain: None,
            seller_id: SellerId::new(Uuid::nil()),
        };
        assert_eq!(
            overrides.for_storefront(&storefront),
            Some(IsolationTier::Database)
        );
    }

    #[test]
    fn test_set_returns_previous() {
        let mut overrides = TierOverrides::default();
        let id: StorefrontId = ID.parse().unwrap();
        assert_eq!(overrides.set(id, IsolationTier::Schema), None);
        assert_eq!(
            overrides.set(id, IsolationTier::Database),
            Some(IsolationTier::Schema)
        );
    }
}
