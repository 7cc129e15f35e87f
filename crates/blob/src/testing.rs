//! Fault injection for exercising failure paths against any [`BlobStore`].

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;
use crate::store::BlobStore;

/// Wraps another [`BlobStore`] and fails or stalls calls on demand.
///
/// Every call is counted, including the ones made to fail, and the locators
/// passed to `delete` are recorded in call order.
pub struct FailingBlobStore {
    inner: Arc<dyn BlobStore>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    put_delay_ms: AtomicU64,
    delete_delay_ms: AtomicU64,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl std::fmt::Debug for FailingBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingBlobStore")
            .field("inner", &self.inner.name())
            .field("put_calls", &self.put_calls())
            .field("delete_calls", &self.delete_calls())
            .finish_non_exhaustive()
    }
}

impl FailingBlobStore {
    /// Wrap `inner`; all calls pass through until a failure is switched on.
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            put_delay_ms: AtomicU64::new(0),
            delete_delay_ms: AtomicU64::new(0),
            put_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent `put` fail with [`BlobError::UploadFailure`].
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail with [`BlobError::DeleteFailure`].
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long before forwarding each `put`.
    pub fn delay_puts(&self, delay: Duration) {
        self.put_delay_ms.store(millis(delay), Ordering::SeqCst);
    }

    /// Sleep this long before forwarding each `delete`.
    pub fn delay_deletes(&self, delay: Duration) {
        self.delete_delay_ms.store(millis(delay), Ordering::SeqCst);
    }

    /// Number of `put` calls received.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls received.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Locators passed to `delete`, in call order.
    pub fn deleted_locators(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

async fn stall(delay_ms: &AtomicU64) {
    let delay = delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn put(
        &self,
        data: Bytes,
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        stall(&self.put_delay_ms).await;

        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::UploadFailure("injected upload fault".into()));
        }
        self.inner.put(data, suggested_name, content_type).await
    }

    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(locator.to_owned());

        stall(&self.delete_delay_ms).await;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::DeleteFailure("injected delete fault".into()));
        }
        self.inner.delete(locator).await
    }

    async fn exists(&self, locator: &str) -> Result<bool, BlobError> {
        self.inner.exists(locator).await
    }
}
