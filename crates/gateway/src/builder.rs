use std::sync::Arc;

use contacts_blob::BlobStore;
use contacts_store::{ContactStore, DistributedLock};
use tokio_util::task::TaskTracker;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::leaks::LeakLedger;
use crate::metrics::GatewayMetrics;

/// Fluent builder for constructing a [`Gateway`] instance.
///
/// A [`ContactStore`], a [`BlobStore`] and a [`DistributedLock`] must be
/// supplied. The configuration defaults to [`GatewayConfig::default`].
pub struct GatewayBuilder {
    contacts: Option<Arc<dyn ContactStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    lock: Option<Arc<dyn DistributedLock>>,
    config: GatewayConfig,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            contacts: None,
            blobs: None,
            lock: None,
            config: GatewayConfig::default(),
            metrics: None,
        }
    }

    /// Set the metadata store implementation.
    #[must_use]
    pub fn contacts(mut self, store: Arc<dyn ContactStore>) -> Self {
        self.contacts = Some(store);
        self
    }

    /// Set the photo store implementation.
    #[must_use]
    pub fn blobs(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(store);
        self
    }

    /// Set the distributed lock implementation.
    #[must_use]
    pub fn lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing metrics instance instead of creating a new one.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Consume the builder and produce a configured [`Gateway`].
    ///
    /// Returns a [`GatewayError::Configuration`] if a required component has
    /// not been set, or if the lock TTL could expire while a flow still holds
    /// the lock.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let contacts = self
            .contacts
            .ok_or_else(|| GatewayError::Configuration("contact store is required".into()))?;

        let blobs = self
            .blobs
            .ok_or_else(|| GatewayError::Configuration("blob store is required".into()))?;

        let lock = self
            .lock
            .ok_or_else(|| GatewayError::Configuration("distributed lock is required".into()))?;

        let longest_flow = self.config.longest_flow();
        if self.config.lock_ttl < longest_flow {
            return Err(GatewayError::Configuration(format!(
                "lock_ttl ({:?}) is shorter than the longest flow ({longest_flow:?})",
                self.config.lock_ttl
            )));
        }

        let leaks = Arc::new(LeakLedger::new(self.config.leak_ledger_capacity));

        Ok(Gateway {
            contacts,
            blobs,
            lock,
            config: Arc::new(self.config),
            metrics: self.metrics.unwrap_or_default(),
            leaks,
            flows: TaskTracker::new(),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
