use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Lock name serializing mutations of one contact.
pub fn contact_lock_name(id: i64) -> String {
    format!("contact:{id}")
}

/// Lock name serializing creates that claim the same email.
pub fn email_lock_name(email: &str) -> String {
    format!("contact-email:{}", email.to_lowercase())
}

/// A held distributed lock. A guard dropped without `release` keeps the lock
/// until its TTL runs out.
#[async_trait]
pub trait LockGuard: Send + Sync {
    /// Explicitly release the lock.
    async fn release(self: Box<Self>) -> Result<(), StoreError>;

    /// Check if the lock is still held by this guard.
    async fn is_held(&self) -> Result<bool, StoreError>;
}

/// Trait for acquiring named locks shared by every server instance that
/// talks to the same backend.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to acquire a lock with the given name and TTL.
    /// Returns `None` if the lock is already held by another owner.
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StoreError>;

    /// Acquire a lock, waiting up to `timeout` for it to become available.
    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StoreError>;
}
