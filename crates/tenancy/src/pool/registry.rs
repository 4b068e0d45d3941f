//! Registry of open per-tenant handles.

use std::collections::HashMap;

use secrecy::SecretString;
use shopgrid_core::StorefrontId;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{Connector, PoolError, PoolSettings, format_connection_string};

/// At most one open handle per storefront.
///
/// Creation is single-flight: the read path returns an existing handle, and
/// the write path re-checks before opening, holding the exclusive lock
/// across open and ping. Unrelated tenants wait while a handle is being
/// opened; the liveness sweep can never observe a half-built entry.
pub struct ConnectionRegistry<C: Connector> {
    connector: C,
    pattern: SecretString,
    settings: PoolSettings,
    handles: RwLock<HashMap<StorefrontId, C::Handle>>,
}

impl<C: Connector> ConnectionRegistry<C> {
    /// Create an empty registry.
    #[must_use]
    pub fn new(connector: C, pattern: SecretString, settings: PoolSettings) -> Self {
        Self {
            connector,
            pattern,
            settings,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// The connector used to open and close handles.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Get the tenant's handle, opening it on first use.
    ///
    /// # Errors
    ///
    /// - `MisconfiguredPattern` if the connection string cannot be formatted
    /// - `ConnectFailed` if the pool cannot be opened
    /// - `TenantUnreachable` if the new pool fails its ping (it is closed)
    /// - `Canceled` if `cancel` fires; any handle opened so far is closed
    #[instrument(skip(self, cancel), fields(storefront_id = %storefront_id))]
    pub async fn get_handle(
        &self,
        storefront_id: StorefrontId,
        cancel: &CancellationToken,
    ) -> Result<C::Handle, PoolError> {
        {
            let handles = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PoolError::Canceled),
                guard = self.handles.read() => guard,
            };
            if let Some(handle) = handles.get(&storefront_id) {
                return Ok(handle.clone());
            }
        }

        let mut handles = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PoolError::Canceled),
            guard = self.handles.write() => guard,
        };
        if let Some(handle) = handles.get(&storefront_id) {
            return Ok(handle.clone());
        }

        let url = format_connection_string(&self.pattern, storefront_id)?;

        let handle = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PoolError::Canceled),
            opened = self.connector.open(&url, self.settings) => {
                opened.map_err(|message| PoolError::ConnectFailed { storefront_id, message })?
            }
        };

        let probe = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            pinged = self.connector.ping(&handle) => Some(pinged),
        };

        match probe {
            Some(Ok(())) => {
                handles.insert(storefront_id, handle.clone());
                info!(open_handles = handles.len(), "Opened tenant database pool");
                Ok(handle)
            }
            Some(Err(message)) => {
                self.connector.close(handle).await;
                warn!(%message, "New tenant pool failed liveness probe");
                Err(PoolError::TenantUnreachable {
                    storefront_id,
                    message,
                })
            }
            None => {
                self.connector.close(handle).await;
                debug!("Canceled while probing new tenant pool");
                Err(PoolError::Canceled)
            }
        }
    }

    /// Probe every open handle and drop the ones that fail.
    ///
    /// Holds the exclusive lock for the whole pass. Returns how many handles
    /// were evicted.
    pub async fn sweep(&self) -> usize {
        let mut handles = self.handles.write().await;

        let mut dead = Vec::new();
        for (storefront_id, handle) in handles.iter() {
            if let Err(message) = self.connector.ping(handle).await {
                warn!(%storefront_id, %message, "Tenant pool failed liveness probe, evicting");
                dead.push(*storefront_id);
            }
        }

        for storefront_id in &dead {
            if let Some(handle) = handles.remove(storefront_id) {
                self.connector.close(handle).await;
            }
        }
        dead.len()
    }

    /// Close and remove one storefront's handle. Returns whether one was open.
    pub async fn remove(&self, storefront_id: StorefrontId) -> bool {
        let removed = self.handles.write().await.remove(&storefront_id);
        match removed {
            Some(handle) => {
                self.connector.close(handle).await;
                true
            }
            None => false,
        }
    }

    /// Close and remove every handle.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.handles.write().await.drain().collect();
        let count = drained.len();
        for (_, handle) in drained {
            self.connector.close(handle).await;
        }
        info!(closed = count, "Closed tenant database pools");
    }

    /// Number of open handles.
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Whether no handles are open.
    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    /// Whether a handle is open for this storefront.
    pub async fn contains(&self, storefront_id: StorefrontId) -> bool {
        self.handles.read().await.contains_key(&storefront_id)
    }
}
