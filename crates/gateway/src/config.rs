use std::time::Duration;

use contacts_core::PhotoPolicy;

/// Timeouts, lock settings and photo policy applied to every flow.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bound on each metadata store call.
    pub metadata_timeout: Duration,
    /// Bound on a single photo upload.
    pub blob_put_timeout: Duration,
    /// Bound on a single photo delete.
    pub blob_delete_timeout: Duration,
    /// TTL of a per-contact lock; covers a crashed holder. Must be at least
    /// [`longest_flow`](Self::longest_flow) or a slow flow can lose its lock.
    pub lock_ttl: Duration,
    /// How long a flow waits for a per-contact lock.
    pub lock_wait: Duration,
    /// Entries kept in the leak ledger before the oldest are evicted.
    pub leak_ledger_capacity: usize,
    pub photo_policy: PhotoPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(5),
            blob_put_timeout: Duration::from_secs(30),
            blob_delete_timeout: Duration::from_secs(10),
            lock_ttl: Duration::from_secs(60),
            lock_wait: Duration::from_secs(10),
            leak_ledger_capacity: 1024,
            photo_policy: PhotoPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Upper bound on the store time of one flow: an update's get, upload,
    /// row write and old-photo delete, each at its timeout.
    pub fn longest_flow(&self) -> Duration {
        self.metadata_timeout
            .saturating_mul(2)
            .saturating_add(self.blob_put_timeout)
            .saturating_add(self.blob_delete_timeout)
    }
}
