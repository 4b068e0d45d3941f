//! In-memory fakes for the repository and connector ports.
//!
//! Compiled for unit tests and, behind the `testing` feature, for the
//! integration test crate.

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use shopgrid_core::{Slug, Storefront, StorefrontId, TenantStats};

use crate::db::{RepositoryError, StorefrontRepository};
use crate::pool::{Connector, PoolSettings};

// =============================================================================
// InMemoryStorefrontRepository
// =============================================================================

/// Repository backed by in-process maps, with per-operation call counters.
#[derive(Default)]
pub struct InMemoryStorefrontRepository {
    storefronts: Mutex<Vec<Storefront>>,
    stats: Mutex<HashMap<StorefrontId, TenantStats>>,
    stats_unavailable: AtomicBool,
    lookups_unavailable: AtomicBool,
    slug_calls: AtomicUsize,
    domain_calls: AtomicUsize,
    id_calls: AtomicUsize,
    stats_calls: AtomicUsize,
}

impl InMemoryStorefrontRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a storefront (matched by ID).
    pub fn insert(&self, storefront: Storefront) {
        let mut storefronts = self.storefronts.lock();
        storefronts.retain(|s| s.id != storefront.id);
        storefronts.push(storefront);
    }

    pub fn set_stats(&self, stats: TenantStats) {
        self.stats.lock().insert(stats.storefront_id, stats);
    }

    /// Make `get_storefront_stats` fail.
    pub fn fail_stats(&self, fail: bool) {
        self.stats_unavailable.store(fail, Ordering::SeqCst);
    }

    /// Make every storefront lookup fail.
    pub fn fail_lookups(&self, fail: bool) {
        self.lookups_unavailable.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn slug_calls(&self) -> usize {
        self.slug_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn domain_calls(&self) -> usize {
        self.domain_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn id_calls(&self) -> usize {
        self.id_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    fn lookup(
        &self,
        counter: &AtomicUsize,
        matches: impl Fn(&Storefront) -> bool,
    ) -> Result<Option<Storefront>, RepositoryError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.lookups_unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("storefront store offline".into()));
        }
        Ok(self.storefronts.lock().iter().find(|s| matches(s)).cloned())
    }
}

#[async_trait]
impl StorefrontRepository for InMemoryStorefrontRepository {
    async fn get_storefront_by_slug(
        &self,
        slug: &Slug,
    ) -> Result<Option<Storefront>, RepositoryError> {
        self.lookup(&self.slug_calls, |s| s.slug == *slug)
    }

    async fn get_storefront_by_domain(
        &self,
        host: &str,
    ) -> Result<Option<Storefront>, RepositoryError> {
        self.lookup(&self.domain_calls, |s| {
            s.domain
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(host))
        })
    }

    async fn get_storefront_by_id(
        &self,
        id: StorefrontId,
    ) -> Result<Option<Storefront>, RepositoryError> {
        self.lookup(&self.id_calls, |s| s.id == id)
    }

    async fn get_storefront_stats(&self, id: StorefrontId) -> Result<TenantStats, RepositoryError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if self.stats_unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("stats store offline".into()));
        }
        Ok(self
            .stats
            .lock()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| TenantStats::empty(id)))
    }
}

// =============================================================================
// FakeConnector
// =============================================================================

/// Handle produced by [`FakeConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeHandle {
    /// Unique per `open` call.
    pub serial: u64,
    pub url: String,
    pub settings: PoolSettings,
}

impl FakeHandle {
    /// A stand-in handle for the shared store.
    #[must_use]
    pub fn shared() -> Self {
        Self {
            serial: 0,
            url: "postgres://shared".to_string(),
            settings: PoolSettings::for_tenant(10),
        }
    }
}

/// Connector that records opens/closes and fails on demand.
#[derive(Default)]
pub struct FakeConnector {
    next_serial: AtomicU64,
    opens: AtomicUsize,
    closes: AtomicUsize,
    fail_opens: AtomicBool,
    unreachable: Mutex<HashSet<String>>,
    open_delay: Duration,
    ping_delay: Duration,
}

impl FakeConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_serial: AtomicU64::new(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    #[must_use]
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = delay;
        self
    }

    pub fn fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Make pings for this storefront's handles fail (or succeed again).
    pub fn set_unreachable(&self, storefront_id: StorefrontId, unreachable: bool) {
        let marker = storefront_id.as_uuid().simple().to_string();
        let mut set = self.unreachable.lock();
        if unreachable {
            set.insert(marker);
        } else {
            set.remove(&marker);
        }
    }

    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Handle = FakeHandle;

    async fn open(&self, url: &SecretString, settings: PoolSettings) -> Result<FakeHandle, String> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err("connection refused".to_string());
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            serial: self.next_serial.fetch_add(1, Ordering::SeqCst),
            url: url.expose_secret().to_string(),
            settings,
        })
    }

    async fn ping(&self, handle: &FakeHandle) -> Result<(), String> {
        if !self.ping_delay.is_zero() {
            tokio::time::sleep(self.ping_delay).await;
        }
        let down = self
            .unreachable
            .lock()
            .iter()
            .any(|marker| handle.url.contains(marker.as_str()));
        if down {
            Err("ping timed out".to_string())
        } else {
            Ok(())
        }
    }

    async fn close(&self, _handle: FakeHandle) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
