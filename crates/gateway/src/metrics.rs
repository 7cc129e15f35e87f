use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking flow outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Contacts created.
    pub created: AtomicU64,
    /// Contacts updated.
    pub updated: AtomicU64,
    /// Contacts deleted.
    pub deleted: AtomicU64,
    /// Requests rejected by field or photo validation.
    pub validation_rejected: AtomicU64,
    /// Photo uploads that failed or timed out.
    pub upload_failures: AtomicU64,
    /// Compensating deletes attempted after a failed row write.
    pub compensations: AtomicU64,
    /// Compensating deletes that failed.
    pub compensation_failures: AtomicU64,
    /// Old photos removed after an update committed.
    pub blobs_replaced: AtomicU64,
    /// Photos removed after a delete committed.
    pub blobs_removed: AtomicU64,
    /// Blobs recorded in the leak ledger.
    pub leaked_blobs: AtomicU64,
    /// Per-contact locks not acquired in time.
    pub lock_failures: AtomicU64,
}

impl GatewayMetrics {
    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_validation_rejected(&self) {
        self.validation_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upload_failures(&self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_compensations(&self) {
        self.compensations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_compensation_failures(&self) {
        self.compensation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blobs_replaced(&self) {
        self.blobs_replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blobs_removed(&self) {
        self.blobs_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_leaked_blobs(&self) {
        self.leaked_blobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lock_failures(&self) {
        self.lock_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            validation_rejected: self.validation_rejected.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            compensations: self.compensations.load(Ordering::Relaxed),
            compensation_failures: self.compensation_failures.load(Ordering::Relaxed),
            blobs_replaced: self.blobs_replaced.load(Ordering::Relaxed),
            blobs_removed: self.blobs_removed.load(Ordering::Relaxed),
            leaked_blobs: self.leaked_blobs.load(Ordering::Relaxed),
            lock_failures: self.lock_failures.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`GatewayMetrics`] at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub validation_rejected: u64,
    pub upload_failures: u64,
    pub compensations: u64,
    pub compensation_failures: u64,
    pub blobs_replaced: u64,
    pub blobs_removed: u64,
    pub leaked_blobs: u64,
    pub lock_failures: u64,
}
