use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use contacts_store::error::StoreError;
use contacts_store::lock::{DistributedLock, LockGuard};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
struct Holder {
    owner: u64,
    expires_at: Instant,
}

/// Process-local [`DistributedLock`].
///
/// Each name maps to its current holder. A holder past `expires_at` is
/// replaced by the next acquirer; nothing sweeps expired holders otherwise.
#[derive(Debug, Clone, Default)]
pub struct MemoryDistributedLock {
    holders: Arc<DashMap<String, Holder>>,
    next_owner: Arc<AtomicU64>,
}

impl MemoryDistributedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names with a holder recorded, expired holders included.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

#[async_trait]
impl DistributedLock for MemoryDistributedLock {
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StoreError> {
        let now = Instant::now();
        let holder = Holder {
            owner: self.next_owner.fetch_add(1, Ordering::Relaxed),
            expires_at: now + ttl,
        };

        match self.holders.entry(name.to_owned()) {
            Entry::Occupied(held) if held.get().expires_at > now => return Ok(None),
            Entry::Occupied(mut stale) => {
                stale.insert(holder);
            }
            Entry::Vacant(free) => {
                free.insert(holder);
            }
        }

        Ok(Some(Box::new(MemoryLockGuard {
            holders: Arc::clone(&self.holders),
            name: name.to_owned(),
            owner: holder.owner,
        })))
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_acquire(name, ttl).await? {
                return Ok(guard);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::Timeout(timeout));
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[derive(Debug)]
pub struct MemoryLockGuard {
    holders: Arc<DashMap<String, Holder>>,
    name: String,
    owner: u64,
}

#[async_trait]
impl LockGuard for MemoryLockGuard {
    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        // Leave the entry alone if another owner took it over after expiry.
        self.holders
            .remove_if(&self.name, |_, holder| holder.owner == self.owner);
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, StoreError> {
        Ok(self
            .holders
            .get(&self.name)
            .is_some_and(|holder| holder.owner == self.owner && holder.expires_at > Instant::now()))
    }
}
