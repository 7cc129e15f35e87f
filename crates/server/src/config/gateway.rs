use std::time::Duration;

use serde::Deserialize;

use contacts_core::PhotoPolicy;
use contacts_gateway::GatewayConfig;

/// Flow timeouts and lock settings, in milliseconds.
#[derive(Debug, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_ms: u64,
    #[serde(default = "default_blob_put_timeout")]
    pub blob_put_timeout_ms: u64,
    #[serde(default = "default_blob_delete_timeout")]
    pub blob_delete_timeout_ms: u64,
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_ms: u64,
    #[serde(default = "default_lock_wait")]
    pub lock_wait_ms: u64,
    /// Possibly orphaned blobs remembered for `/admin/leaked-blobs`.
    #[serde(default = "default_leak_ledger_capacity")]
    pub leak_ledger_capacity: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            metadata_timeout_ms: default_metadata_timeout(),
            blob_put_timeout_ms: default_blob_put_timeout(),
            blob_delete_timeout_ms: default_blob_delete_timeout(),
            lock_ttl_ms: default_lock_ttl(),
            lock_wait_ms: default_lock_wait(),
            leak_ledger_capacity: default_leak_ledger_capacity(),
        }
    }
}

impl GatewaySettings {
    /// Build the gateway's runtime configuration.
    pub fn to_gateway_config(&self, photos: &PhotoPolicy) -> GatewayConfig {
        GatewayConfig {
            metadata_timeout: Duration::from_millis(self.metadata_timeout_ms),
            blob_put_timeout: Duration::from_millis(self.blob_put_timeout_ms),
            blob_delete_timeout: Duration::from_millis(self.blob_delete_timeout_ms),
            lock_ttl: Duration::from_millis(self.lock_ttl_ms),
            lock_wait: Duration::from_millis(self.lock_wait_ms),
            leak_ledger_capacity: self.leak_ledger_capacity,
            photo_policy: photos.clone(),
        }
    }

    /// Milliseconds one flow can spend in store calls: an update's lookup,
    /// upload, row write and old-photo delete, each at its timeout.
    pub fn longest_flow_ms(&self) -> u64 {
        self.metadata_timeout_ms
            .saturating_mul(2)
            .saturating_add(self.blob_put_timeout_ms)
            .saturating_add(self.blob_delete_timeout_ms)
    }

    pub(crate) fn zero_timeouts(&self) -> Vec<&'static str> {
        [
            ("gateway.metadata_timeout_ms", self.metadata_timeout_ms),
            ("gateway.blob_put_timeout_ms", self.blob_put_timeout_ms),
            ("gateway.blob_delete_timeout_ms", self.blob_delete_timeout_ms),
            ("gateway.lock_ttl_ms", self.lock_ttl_ms),
            ("gateway.lock_wait_ms", self.lock_wait_ms),
        ]
        .into_iter()
        .filter(|(_, ms)| *ms == 0)
        .map(|(key, _)| key)
        .collect()
    }
}

fn default_metadata_timeout() -> u64 {
    5_000
}

fn default_blob_put_timeout() -> u64 {
    30_000
}

fn default_blob_delete_timeout() -> u64 {
    10_000
}

fn default_lock_ttl() -> u64 {
    60_000
}

fn default_lock_wait() -> u64 {
    10_000
}

fn default_leak_ledger_capacity() -> usize {
    1024
}
