//! Tenant resolution.
//!
//! [`TenantResolver`] composes the storefront repository, the two TTL
//! caches, the per-tenant connection registry and the migration rules. It is
//! shared behind an `Arc` by every request handler and the maintenance
//! tasks; all interior state tolerates concurrent access.
//!
//! Every operation that may wait on I/O takes a [`CancellationToken`] and
//! returns [`ResolverError::Canceled`] once it fires.

mod error;
mod index;
mod overrides;

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use shopgrid_core::{IsolationTier, Slug, Storefront, StorefrontId, TenantContext, TenantStats};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheMetrics, TenantCache, TtlCache, domain_key, id_key, slug_key};
use crate::config::{CacheSettings, ResolverSettings};
use crate::db::{RepositoryError, StorefrontRepository};
use crate::migration::{self, MigrationThresholds};
use crate::pool::{ConnectionRegistry, Connector, PoolSettings};

pub use error::ResolverError;
use index::KeyIndex;
pub use overrides::TierOverrides;

/// Storefront cache keyed by `storefront:`, `domain:` and `id:` prefixes.
pub type StorefrontCache = Arc<dyn TenantCache<String, Arc<Storefront>>>;
/// Stats cache keyed by storefront ID.
pub type StatsCache = Arc<dyn TenantCache<StorefrontId, TenantStats>>;

/// Result of a migration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationCheck {
    pub current_tier: IsolationTier,
    pub can_migrate: bool,
    /// Recommended tier; equals `current_tier` when no move is advised.
    pub target_tier: IsolationTier,
}

/// What one cache sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSweep {
    pub storefronts_expired: usize,
    pub stats_expired: usize,
    pub index_keys_pruned: usize,
}

/// Counters for both caches plus the registry size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolverMetrics {
    pub storefronts: CacheMetrics,
    pub stats: CacheMetrics,
    pub open_tenant_pools: usize,
    pub overrides: usize,
}

/// Resolves storefronts, isolation tiers and database handles.
pub struct TenantResolver<C: Connector> {
    repository: Arc<dyn StorefrontRepository>,
    storefronts: StorefrontCache,
    stats: StatsCache,
    index: KeyIndex,
    registry: ConnectionRegistry<C>,
    shared: C::Handle,
    overrides: RwLock<TierOverrides>,
    default_tier: IsolationTier,
    thresholds: MigrationThresholds,
    cache_settings: CacheSettings,
}

impl<C: Connector> TenantResolver<C> {
    /// Build a resolver with in-process TTL caches.
    ///
    /// `shared` is the already-open handle for the shared store; `connector`
    /// opens dedicated handles for database-tier tenants.
    #[must_use]
    pub fn new(
        settings: &ResolverSettings,
        repository: Arc<dyn StorefrontRepository>,
        connector: C,
        shared: C::Handle,
    ) -> Self {
        let cache_settings = settings.cache_settings;
        Self {
            repository,
            storefronts: Arc::new(TtlCache::new(cache_settings.max_cache_size)),
            stats: Arc::new(TtlCache::new(cache_settings.max_cache_size)),
            index: KeyIndex::default(),
            registry: ConnectionRegistry::new(
                connector,
                settings.tenant_database_pattern.clone(),
                PoolSettings::for_tenant(settings.max_connections_per_tenant),
            ),
            shared,
            overrides: RwLock::new(settings.tenant_overrides.clone()),
            default_tier: settings.default_tenant_type,
            thresholds: settings.migration_thresholds,
            cache_settings,
        }
    }

    /// Replace the storefront cache backend.
    #[must_use]
    pub fn with_storefront_cache(mut self, cache: StorefrontCache) -> Self {
        self.storefronts = cache;
        self
    }

    /// Replace the stats cache backend.
    #[must_use]
    pub fn with_stats_cache(mut self, cache: StatsCache) -> Self {
        self.stats = cache;
        self
    }

    #[must_use]
    pub const fn default_tier(&self) -> IsolationTier {
        self.default_tier
    }

    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry<C> {
        &self.registry
    }

    /// The handle for the shared store.
    #[must_use]
    pub const fn shared_handle(&self) -> &C::Handle {
        &self.shared
    }

    // =========================================================================
    // Storefront lookups
    // =========================================================================

    /// Look up a storefront by slug.
    ///
    /// # Errors
    ///
    /// `RepositoryUnavailable` on repository failure, `Canceled` if `cancel`
    /// fires first. An unknown slug is `Ok(None)`.
    #[instrument(skip(self, cancel), fields(slug = %slug))]
    pub async fn get_by_slug(
        &self,
        slug: &Slug,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Storefront>>, ResolverError> {
        let key = slug_key(slug.as_str());
        self.cached_or_fetch(&key, cancel, || self.repository.get_storefront_by_slug(slug))
            .await
    }

    /// Look up a storefront by custom domain.
    ///
    /// The host is matched case-insensitively. A hit is cached under both
    /// the domain key and the storefront's slug key.
    ///
    /// # Errors
    ///
    /// Same as [`TenantResolver::get_by_slug`].
    #[instrument(skip(self, cancel))]
    pub async fn get_by_domain(
        &self,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Storefront>>, ResolverError> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Ok(None);
        }
        let key = domain_key(&host);
        let found = self
            .cached_or_fetch(&key, cancel, || {
                self.repository.get_storefront_by_domain(&host)
            })
            .await?;
        if let Some(storefront) = &found {
            self.remember(&slug_key(storefront.slug.as_str()), storefront);
        }
        Ok(found)
    }

    /// Look up a storefront by ID.
    ///
    /// # Errors
    ///
    /// Same as [`TenantResolver::get_by_slug`].
    #[instrument(skip(self, cancel), fields(storefront_id = %id))]
    pub async fn get_by_id(
        &self,
        id: StorefrontId,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Storefront>>, ResolverError> {
        let key = id_key(id);
        self.cached_or_fetch(&key, cancel, || self.repository.get_storefront_by_id(id))
            .await
    }

    async fn cached_or_fetch<F, Fut>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<Option<Arc<Storefront>>, ResolverError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Storefront>, RepositoryError>>,
    {
        if let Some(storefront) = self.storefronts.get(&key.to_owned()) {
            debug!(key, "Storefront cache hit");
            return Ok(Some(storefront));
        }
        debug!(key, "Storefront cache miss");

        let Some(storefront) = cancellable(cancel, fetch()).await? else {
            return Ok(None);
        };
        let storefront = Arc::new(storefront);
        self.remember(key, &storefront);
        Ok(Some(storefront))
    }

    fn remember(&self, key: &str, storefront: &Arc<Storefront>) {
        // Index first so a concurrent invalidate_by_id can find the key.
        self.index.record(storefront.id, key);
        self.storefronts.set(
            key.to_owned(),
            Arc::clone(storefront),
            self.cache_settings.storefront_ttl,
        );
    }

    // =========================================================================
    // Stats and tiers
    // =========================================================================

    /// Usage statistics, served from the stats cache when fresh.
    ///
    /// # Errors
    ///
    /// `RepositoryUnavailable` or `Canceled`. Failures are not cached.
    #[instrument(skip(self, cancel), fields(storefront_id = %id))]
    pub async fn get_stats(
        &self,
        id: StorefrontId,
        cancel: &CancellationToken,
    ) -> Result<TenantStats, ResolverError> {
        if let Some(stats) = self.stats.get(&id) {
            return Ok(stats);
        }
        let stats = cancellable(cancel, self.repository.get_storefront_stats(id)).await?;
        self.stats.set(id, stats.clone(), self.cache_settings.stats_ttl);
        Ok(stats)
    }

    /// Effective isolation tier for a storefront ID.
    ///
    /// Overrides dominate; a slug override needs the storefront record to
    /// apply. Without an override the migration rules run on current stats,
    /// and a stats failure (cancellation included) degrades to the default
    /// tier.
    pub async fn get_tier(&self, id: StorefrontId, cancel: &CancellationToken) -> IsolationTier {
        let by_id = self.overrides.read().for_id(id);
        if let Some(tier) = by_id {
            return tier;
        }

        let has_slug_overrides = self.overrides.read().has_slug_overrides();
        if has_slug_overrides {
            match self.get_by_id(id, cancel).await {
                Ok(Some(storefront)) => {
                    let by_slug = self.overrides.read().for_slug(&storefront.slug);
                    if let Some(tier) = by_slug {
                        return tier;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(storefront_id = %id, error = %e, "Slug override lookup failed"),
            }
        }

        self.tier_from_stats(id, cancel).await
    }

    async fn tier_from_stats(&self, id: StorefrontId, cancel: &CancellationToken) -> IsolationTier {
        match self.get_stats(id, cancel).await {
            Ok(stats) => migration::recommend(&stats, &self.thresholds, self.default_tier),
            Err(e) => {
                warn!(
                    storefront_id = %id,
                    error = %e,
                    default_tier = %self.default_tier,
                    "Stats unavailable, using default tier"
                );
                self.default_tier
            }
        }
    }

    /// Pack a storefront and its effective tier into a request context.
    ///
    /// Never fails: tier errors degrade to the default tier.
    pub async fn build_context(
        &self,
        storefront: &Storefront,
        cancel: &CancellationToken,
    ) -> TenantContext {
        let overridden = self.overrides.read().for_storefront(storefront);
        let tier = match overridden {
            Some(tier) => tier,
            None => self.tier_from_stats(storefront.id, cancel).await,
        };
        TenantContext::new(storefront, tier)
    }

    // =========================================================================
    // Handles
    // =========================================================================

    /// Database handle for a storefront's effective tier.
    ///
    /// # Errors
    ///
    /// Registry errors for database-tier tenants, or `Canceled`.
    pub async fn get_handle(
        &self,
        id: StorefrontId,
        cancel: &CancellationToken,
    ) -> Result<C::Handle, ResolverError> {
        let tier = self.get_tier(id, cancel).await;
        if cancel.is_cancelled() {
            return Err(ResolverError::Canceled);
        }
        self.handle_for_tier(id, tier, cancel).await
    }

    /// Database handle for an already-built context, reusing its tier.
    ///
    /// # Errors
    ///
    /// Same as [`TenantResolver::get_handle`].
    pub async fn handle_for(
        &self,
        context: &TenantContext,
        cancel: &CancellationToken,
    ) -> Result<C::Handle, ResolverError> {
        self.handle_for_tier(context.storefront_id, context.isolation_tier, cancel)
            .await
    }

    async fn handle_for_tier(
        &self,
        id: StorefrontId,
        tier: IsolationTier,
        cancel: &CancellationToken,
    ) -> Result<C::Handle, ResolverError> {
        if tier.uses_shared_store() {
            return Ok(self.shared.clone());
        }
        Ok(self.registry.get_handle(id, cancel).await?)
    }

    /// Ping a handle through the connector.
    ///
    /// # Errors
    ///
    /// Returns the connector's failure message.
    pub async fn ping(&self, handle: &C::Handle) -> Result<(), String> {
        self.registry.connector().ping(handle).await
    }

    // =========================================================================
    // Migration
    // =========================================================================

    /// Whether the storefront should move to a stronger tier, and where.
    ///
    /// # Errors
    ///
    /// Stats failures surface here instead of degrading.
    #[instrument(skip(self, cancel), fields(storefront_id = %id))]
    pub async fn can_migrate(
        &self,
        id: StorefrontId,
        cancel: &CancellationToken,
    ) -> Result<MigrationCheck, ResolverError> {
        let current_tier = self.get_tier(id, cancel).await;
        let stats = self.get_stats(id, cancel).await?;
        let (can_migrate, target_tier) =
            migration::migration_target(current_tier, &stats, &self.thresholds);
        Ok(MigrationCheck {
            current_tier,
            can_migrate,
            target_tier,
        })
    }

    /// Route future requests for the storefront to `target`.
    ///
    /// Records an ID override and drops cached entries for the storefront.
    /// A dedicated pool is closed when the target is served from the shared
    /// store. No data is moved.
    #[instrument(skip(self), fields(storefront_id = %id, target = %target))]
    pub async fn migrate(&self, id: StorefrontId, target: IsolationTier) {
        let previous = self.overrides.write().set(id, target);
        self.invalidate_by_id(id);
        if target.uses_shared_store() && self.registry.remove(id).await {
            info!("Closed dedicated pool after migration");
        }
        info!(
            previous = previous.as_ref().map(IsolationTier::as_str),
            "Tenant tier override recorded"
        );
    }

    // =========================================================================
    // Invalidation and maintenance
    // =========================================================================

    /// Drop cached entries for a slug.
    ///
    /// When the slug's storefront is known, every key recorded for it goes
    /// too, including domain keys.
    pub fn invalidate_by_slug(&self, slug: &Slug) {
        let key = slug_key(slug.as_str());
        if let Some(id) = self.index.owner_of(&key) {
            self.invalidate_storefront_keys(id);
        }
        self.storefronts.invalidate(&key);
        debug!(%slug, "Invalidated storefront by slug");
    }

    /// Drop cached stats and every cached storefront entry for an ID.
    pub fn invalidate_by_id(&self, id: StorefrontId) {
        self.stats.invalidate(&id);
        self.invalidate_storefront_keys(id);
        debug!(storefront_id = %id, "Invalidated storefront by id");
    }

    fn invalidate_storefront_keys(&self, id: StorefrontId) {
        for key in self.index.take(id) {
            self.storefronts.invalidate(&key);
        }
        self.storefronts.invalidate(&id_key(id));
    }

    /// Remove expired cache entries and prune the key index.
    pub fn sweep_caches(&self) -> CacheSweep {
        let storefronts_expired = self.storefronts.purge_expired();
        let stats_expired = self.stats.purge_expired();
        let index_keys_pruned = self
            .index
            .prune(|key| self.storefronts.contains(&key.to_owned()));
        CacheSweep {
            storefronts_expired,
            stats_expired,
            index_keys_pruned,
        }
    }

    /// Probe every dedicated pool, closing the dead ones.
    pub async fn sweep_connections(&self) -> usize {
        self.registry.sweep().await
    }

    /// Point-in-time counters.
    pub async fn metrics(&self) -> ResolverMetrics {
        ResolverMetrics {
            storefronts: self.storefronts.metrics(),
            stats: self.stats.metrics(),
            open_tenant_pools: self.registry.len().await,
            overrides: self.overrides.read().len(),
        }
    }

    /// Close every dedicated pool.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, ResolverError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ResolverError::Canceled),
        result = fut => Ok(result?),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use shopgrid_core::SellerId;
    use uuid::Uuid;

    use super::*;
    use crate::testing::{FakeConnector, FakeHandle, InMemoryStorefrontRepository};

    const YAML: &str = "\
tenant_database_pattern: postgres://app@db/tenant_{id}
max_connections_per_tenant: 8
cache_settings:
  storefront_ttl: 300
  stats_ttl: 60
  max_cache_size: 64
  cleanup_interval: 60
";

    fn storefront(n: u128, slug: &str, domain: Option<&str>) -> Storefront {
        Storefront {
            id: StorefrontId::new(Uuid::from_u128(n)),
            slug: Slug::parse(slug).unwrap(),
            domain: domain.map(str::to_string),
            seller_id: SellerId::new(Uuid::from_u128(1000 + n)),
        }
    }

    fn resolver_with(
        yaml: &str,
        repo: &Arc<InMemoryStorefrontRepository>,
    ) -> TenantResolver<FakeConnector> {
        let settings = ResolverSettings::from_yaml_str(yaml).unwrap();
        TenantResolver::new(
            &settings,
            Arc::clone(repo) as Arc<dyn StorefrontRepository>,
            FakeConnector::new(),
            FakeHandle::shared(),
        )
    }

    fn setup() -> (Arc<InMemoryStorefrontRepository>, TenantResolver<FakeConnector>) {
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let resolver = resolver_with(YAML, &repo);
        (repo, resolver)
    }

    fn busy_stats(id: StorefrontId, customers: u64) -> TenantStats {
        TenantStats {
            customer_count: customers,
            ..TenantStats::empty(id)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slug_lookup_hits_cache_until_ttl() {
        let (repo, resolver) = setup();
        repo.insert(storefront(1, "acme", None));
        let cancel = CancellationToken::new();
        let slug = Slug::parse("acme").unwrap();

        let first = resolver.get_by_slug(&slug, &cancel).await.unwrap().unwrap();
        let second = resolver.get_by_slug(&slug, &cancel).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.slug_calls(), 1);

        tokio::time::advance(Duration::from_secs(300)).await;
        resolver.get_by_slug(&slug, &cancel).await.unwrap();
        assert_eq!(repo.slug_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_cached() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        let slug = Slug::parse("ghost").unwrap();

        assert!(resolver.get_by_slug(&slug, &cancel).await.unwrap().is_none());
        assert!(resolver.get_by_slug(&slug, &cancel).await.unwrap().is_none());
        assert_eq!(repo.slug_calls(), 2);
    }

    #[tokio::test]
    async fn test_domain_hit_populates_slug_key() {
        let (repo, resolver) = setup();
        repo.insert(storefront(1, "acme", Some("shop.acme.com")));
        let cancel = CancellationToken::new();

        let found = resolver
            .get_by_domain("Shop.Acme.com", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.slug.as_str(), "acme");

        resolver
            .get_by_slug(&Slug::parse("acme").unwrap(), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(repo.domain_calls(), 1);
        assert_eq!(repo.slug_calls(), 0);
    }

    #[tokio::test]
    async fn test_repository_failure_surfaces() {
        let (repo, resolver) = setup();
        repo.fail_lookups(true);
        let cancel = CancellationToken::new();

        let err = resolver
            .get_by_slug(&Slug::parse("acme").unwrap(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "repository_unavailable");
    }

    #[tokio::test]
    async fn test_canceled_lookup() {
        let (repo, resolver) = setup();
        repo.insert(storefront(1, "acme", None));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver
            .get_by_slug(&Slug::parse("acme").unwrap(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Canceled));
    }

    #[tokio::test]
    async fn test_tier_follows_rules_without_override() {
        let (repo, resolver) = setup();
        let sf = storefront(1, "acme", None);
        repo.insert(sf.clone());
        let cancel = CancellationToken::new();

        assert_eq!(resolver.get_tier(sf.id, &cancel).await, IsolationTier::Shared);

        resolver.invalidate_by_id(sf.id);
        repo.set_stats(busy_stats(sf.id, 1500));
        assert_eq!(resolver.get_tier(sf.id, &cancel).await, IsolationTier::Schema);

        resolver.invalidate_by_id(sf.id);
        repo.set_stats(busy_stats(sf.id, 15_000));
        assert_eq!(resolver.get_tier(sf.id, &cancel).await, IsolationTier::Database);
    }

    #[tokio::test]
    async fn test_stats_failure_degrades_to_default() {
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let resolver = resolver_with(&format!("default_tenant_type: schema\n{YAML}"), &repo);
        repo.fail_stats(true);
        let id = StorefrontId::new(Uuid::from_u128(7));
        let cancel = CancellationToken::new();

        assert_eq!(resolver.get_tier(id, &cancel).await, IsolationTier::Schema);
        assert!(resolver.get_stats(id, &cancel).await.is_err());
        assert!(resolver.can_migrate(id, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn test_overrides_dominate_stats() {
        let id = "0190a6b2-7c1e-7d3a-9f00-4b1c2d3e4f50";
        let yaml = format!("tenant_overrides:\n  {id}: shared\n  globex: database\n{YAML}");
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let resolver = resolver_with(&yaml, &repo);
        let cancel = CancellationToken::new();

        let pinned: StorefrontId = id.parse().unwrap();
        repo.set_stats(busy_stats(pinned, 50_000));
        assert_eq!(resolver.get_tier(pinned, &cancel).await, IsolationTier::Shared);
        assert_eq!(repo.stats_calls(), 0);

        let globex = storefront(2, "globex", None);
        repo.insert(globex.clone());
        assert_eq!(
            resolver.get_tier(globex.id, &cancel).await,
            IsolationTier::Database
        );
        let context = resolver.build_context(&globex, &cancel).await;
        assert_eq!(context.isolation_tier, IsolationTier::Database);
        assert_eq!(repo.stats_calls(), 0);
    }

    #[tokio::test]
    async fn test_build_context_never_fails() {
        let (repo, resolver) = setup();
        repo.fail_stats(true);
        let sf = storefront(1, "acme", None);
        let cancel = CancellationToken::new();

        let context = resolver.build_context(&sf, &cancel).await;
        assert_eq!(context.storefront_id, sf.id);
        assert_eq!(context.seller_id, sf.seller_id);
        assert_eq!(context.isolation_tier, IsolationTier::Shared);
    }

    #[tokio::test]
    async fn test_shared_and_schema_tiers_use_shared_handle() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        let schema = storefront(1, "acme", None);
        repo.set_stats(busy_stats(schema.id, 1500));

        let shared = resolver
            .get_handle(StorefrontId::new(Uuid::from_u128(2)), &cancel)
            .await
            .unwrap();
        let schema_handle = resolver.get_handle(schema.id, &cancel).await.unwrap();
        assert_eq!(shared, FakeHandle::shared());
        assert_eq!(schema_handle, FakeHandle::shared());
        assert_eq!(resolver.registry().connector().opens(), 0);
    }

    #[tokio::test]
    async fn test_database_tier_opens_dedicated_handle_once() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        let id = StorefrontId::new(Uuid::from_u128(3));
        repo.set_stats(busy_stats(id, 20_000));

        let first = resolver.get_handle(id, &cancel).await.unwrap();
        let second = resolver.get_handle(id, &cancel).await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, FakeHandle::shared());
        assert!(first.url.contains(&id.as_uuid().simple().to_string()));
        assert_eq!(resolver.registry().connector().opens(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_tenant_is_an_error() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        let id = StorefrontId::new(Uuid::from_u128(4));
        repo.set_stats(busy_stats(id, 20_000));
        resolver.registry().connector().set_unreachable(id, true);

        let err = resolver.get_handle(id, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), "tenant_unreachable");
        assert!(!resolver.registry().contains(id).await);
    }

    #[tokio::test]
    async fn test_misconfigured_pattern() {
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let mut settings = ResolverSettings::from_yaml_str(YAML).unwrap();
        settings.tenant_database_pattern = SecretString::from("not a url {id}");
        settings.default_tenant_type = IsolationTier::Database;
        let resolver = TenantResolver::new(
            &settings,
            Arc::clone(&repo) as Arc<dyn StorefrontRepository>,
            FakeConnector::new(),
            FakeHandle::shared(),
        );
        let cancel = CancellationToken::new();

        let err = resolver
            .get_handle(StorefrontId::new(Uuid::from_u128(5)), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "misconfigured_pattern");
    }

    #[tokio::test]
    async fn test_can_migrate_and_migrate() {
        let (repo, resolver) = setup();
        let sf = storefront(1, "acme", Some("acme.com"));
        repo.insert(sf.clone());
        repo.set_stats(busy_stats(sf.id, 15_000));
        let cancel = CancellationToken::new();

        // Pin to shared first so the check has somewhere to move from.
        resolver.migrate(sf.id, IsolationTier::Shared).await;
        let check = resolver.can_migrate(sf.id, &cancel).await.unwrap();
        assert_eq!(
            check,
            MigrationCheck {
                current_tier: IsolationTier::Shared,
                can_migrate: true,
                target_tier: IsolationTier::Database,
            }
        );

        resolver.migrate(sf.id, IsolationTier::Database).await;
        assert_eq!(resolver.get_tier(sf.id, &cancel).await, IsolationTier::Database);
        let check = resolver.can_migrate(sf.id, &cancel).await.unwrap();
        assert!(!check.can_migrate);
        assert_eq!(check.target_tier, IsolationTier::Database);
    }

    #[tokio::test]
    async fn test_migrate_invalidates_cached_entries() {
        let (repo, resolver) = setup();
        let sf = storefront(1, "acme", Some("acme.com"));
        repo.insert(sf.clone());
        let cancel = CancellationToken::new();

        resolver.get_by_domain("acme.com", &cancel).await.unwrap();
        resolver.get_stats(sf.id, &cancel).await.unwrap();
        assert_eq!(repo.stats_calls(), 1);

        resolver.migrate(sf.id, IsolationTier::Schema).await;

        resolver.get_by_domain("acme.com", &cancel).await.unwrap();
        resolver
            .get_by_slug(&Slug::parse("acme").unwrap(), &cancel)
            .await
            .unwrap();
        resolver.get_stats(sf.id, &cancel).await.unwrap();
        assert_eq!(repo.domain_calls(), 2);
        assert_eq!(repo.slug_calls(), 0);
        assert_eq!(repo.stats_calls(), 2);
    }

    #[tokio::test]
    async fn test_migrate_to_shared_closes_dedicated_pool() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        let id = StorefrontId::new(Uuid::from_u128(9));
        repo.set_stats(busy_stats(id, 20_000));

        resolver.get_handle(id, &cancel).await.unwrap();
        assert!(resolver.registry().contains(id).await);

        resolver.migrate(id, IsolationTier::Shared).await;
        assert!(!resolver.registry().contains(id).await);
        assert_eq!(resolver.registry().connector().closes(), 1);
        assert_eq!(
            resolver.get_handle(id, &cancel).await.unwrap(),
            FakeHandle::shared()
        );
    }

    #[tokio::test]
    async fn test_invalidate_by_slug_drops_domain_key_too() {
        let (repo, resolver) = setup();
        repo.insert(storefront(1, "acme", Some("acme.com")));
        let cancel = CancellationToken::new();

        resolver.get_by_domain("acme.com", &cancel).await.unwrap();
        resolver.invalidate_by_slug(&Slug::parse("acme").unwrap());
        resolver.get_by_domain("acme.com", &cancel).await.unwrap();
        assert_eq!(repo.domain_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_caches() {
        let (repo, resolver) = setup();
        let sf = storefront(1, "acme", Some("acme.com"));
        repo.insert(sf.clone());
        let cancel = CancellationToken::new();

        resolver.get_by_domain("acme.com", &cancel).await.unwrap();
        resolver.get_stats(sf.id, &cancel).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        let sweep = resolver.sweep_caches();
        assert_eq!(sweep.stats_expired, 1);
        assert_eq!(sweep.storefronts_expired, 0);

        tokio::time::advance(Duration::from_secs(240)).await;
        let sweep = resolver.sweep_caches();
        assert_eq!(sweep.storefronts_expired, 2);
        assert_eq!(sweep.index_keys_pruned, 2);

        let metrics = resolver.metrics().await;
        assert_eq!(metrics.storefronts.size, 0);
        assert_eq!(metrics.stats.size, 0);
    }

    #[tokio::test]
    async fn test_custom_cache_backend() {
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        repo.insert(storefront(1, "acme", None));
        let cache: StorefrontCache = Arc::new(TtlCache::new(1));
        let resolver = resolver_with(YAML, &repo).with_storefront_cache(Arc::clone(&cache));
        let cancel = CancellationToken::new();

        resolver
            .get_by_slug(&Slug::parse("acme").unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(cache.size(), 1);
    }

    #[tokio::test]
    async fn test_metrics_report_overrides() {
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let resolver = resolver_with(&format!("tenant_overrides:\n  acme: schema\n{YAML}"), &repo);
        resolver
            .migrate(StorefrontId::new(Uuid::from_u128(1)), IsolationTier::Schema)
            .await;
        let metrics = resolver.metrics().await;
        assert_eq!(metrics.overrides, 2);
        assert_eq!(metrics.open_tenant_pools, 0);
    }
}
