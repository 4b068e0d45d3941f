//! Background maintenance.
//!
//! Two supervised loops share the resolver: one sweeps expired cache entries
//! and one probes dedicated tenant pools. Both tick on `cleanup_interval`
//! and stop when the shared cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::pool::Connector;
use crate::resolver::TenantResolver;

/// Handles to the running maintenance loops.
pub struct Maintenance<C: Connector> {
    resolver: Arc<TenantResolver<C>>,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl<C: Connector> Maintenance<C> {
    /// Start both loops.
    ///
    /// `cancel` is typically a child of the server's shutdown token.
    #[must_use]
    pub fn spawn(
        resolver: Arc<TenantResolver<C>>,
        every: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let caches = tokio::spawn(cache_sweep_loop(
            Arc::clone(&resolver),
            every,
            cancel.clone(),
        ));
        let pools = tokio::spawn(pool_sweep_loop(
            Arc::clone(&resolver),
            every,
            cancel.clone(),
        ));
        info!(interval_secs = every.as_secs(), "Tenant maintenance started");

        Self {
            resolver,
            cancel,
            tasks: vec![("cache_sweep", caches), ("pool_sweep", pools)],
        }
    }

    /// Whether every loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tasks.iter().all(|(_, task)| !task.is_finished())
    }

    /// Stop both loops, wait for them, then close every dedicated pool.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "Maintenance task ended abnormally");
            }
        }
        self.resolver.shutdown().await;
        info!("Tenant maintenance stopped");
    }
}

async fn cache_sweep_loop<C: Connector>(
    resolver: Arc<TenantResolver<C>>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let sweep = resolver.sweep_caches();
                let metrics = resolver.metrics().await;
                debug!(
                    storefronts_expired = sweep.storefronts_expired,
                    stats_expired = sweep.stats_expired,
                    index_keys_pruned = sweep.index_keys_pruned,
                    storefront_cache_size = metrics.storefronts.size,
                    storefront_hit_rate = metrics.storefronts.hit_rate(),
                    storefront_evictions = metrics.storefronts.evictions,
                    stats_cache_size = metrics.stats.size,
                    stats_hit_rate = metrics.stats.hit_rate(),
                    open_tenant_pools = metrics.open_tenant_pools,
                    "Cache sweep"
                );
            }
        }
    }
    debug!("Cache sweep loop stopped");
}

async fn pool_sweep_loop<C: Connector>(
    resolver: Arc<TenantResolver<C>>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = resolver.sweep_connections().await;
                if evicted > 0 {
                    info!(evicted, "Evicted unreachable tenant pools");
                }
            }
        }
    }
    debug!("Pool sweep loop stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopgrid_core::{Slug, SellerId, Storefront, StorefrontId, TenantStats};
    use uuid::Uuid;

    use super::*;
    use crate::config::ResolverSettings;
    use crate::db::StorefrontRepository;
    use crate::testing::{FakeConnector, FakeHandle, InMemoryStorefrontRepository};

    const YAML: &str = "\
tenant_database_pattern: postgres://app@db/tenant_{id}
cache_settings:
  storefront_ttl: 30
  stats_ttl: 30
  cleanup_interval: 60
";

    fn setup() -> (Arc<InMemoryStorefrontRepository>, Arc<TenantResolver<FakeConnector>>) {
        let repo = Arc::new(InMemoryStorefrontRepository::new());
        let settings = ResolverSettings::from_yaml_str(YAML).unwrap();
        let resolver = TenantResolver::new(
            &settings,
            Arc::clone(&repo) as Arc<dyn StorefrontRepository>,
            FakeConnector::new(),
            FakeHandle::shared(),
        );
        (repo, Arc::new(resolver))
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_run_on_interval() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        repo.insert(Storefront {
            id: StorefrontId::new(Uuid::from_u128(1)),
            slug: Slug::parse("acme").unwrap(),
            domain: None,
            seller_id: SellerId::new(Uuid::from_u128(2)),
        });
        let dedicated = StorefrontId::new(Uuid::from_u128(3));
        repo.set_stats(TenantStats {
            order_count: 500_000,
            ..TenantStats::empty(dedicated)
        });

        resolver
            .get_by_slug(&Slug::parse("acme").unwrap(), &cancel)
            .await
            .unwrap();
        resolver.get_handle(dedicated, &cancel).await.unwrap();
        resolver.registry().connector().set_unreachable(dedicated, true);

        let maintenance = Maintenance::spawn(Arc::clone(&resolver), Duration::from_secs(60), cancel);
        settle().await;
        assert_eq!(resolver.metrics().await.storefronts.size, 1);
        assert!(resolver.registry().contains(dedicated).await);

        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        let metrics = resolver.metrics().await;
        assert_eq!(metrics.storefronts.size, 0);
        assert_eq!(metrics.stats.size, 0);
        assert!(!resolver.registry().contains(dedicated).await);
        assert!(maintenance.is_running());

        maintenance.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_loops_and_closes_pools() {
        let (repo, resolver) = setup();
        let cancel = CancellationToken::new();
        let dedicated = StorefrontId::new(Uuid::from_u128(3));
        repo.set_stats(TenantStats {
            order_count: 500_000,
            ..TenantStats::empty(dedicated)
        });
        resolver.get_handle(dedicated, &cancel).await.unwrap();

        let maintenance =
            Maintenance::spawn(Arc::clone(&resolver), Duration::from_secs(60), cancel.clone());
        maintenance.shutdown().await;

        assert!(cancel.is_cancelled());
        assert!(resolver.registry().is_empty().await);
        assert_eq!(resolver.registry().connector().closes(), 1);
    }
}
