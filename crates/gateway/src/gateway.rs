use std::future::Future;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, instrument, warn};

use contacts_blob::{BlobError, BlobStore};
use contacts_core::{
    Contact, ContactDraft, ContactFields, ContactOrder, ContactRecord, PhotoUpload,
};
use contacts_store::lock::{contact_lock_name, email_lock_name};
use contacts_store::{ContactStore, DistributedLock, LockGuard, StoreError};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::leaks::{Flow, LeakLedger, LeakedBlob};
use crate::metrics::GatewayMetrics;

/// A metadata write that did not succeed. `unconfirmed` is set when the call
/// timed out: the write may still have been applied.
struct WriteFailure {
    error: GatewayError,
    unconfirmed: bool,
}

/// Sequences contact mutations across the metadata and blob stores.
///
/// Mutating flows run on an internal [`TaskTracker`]: once started, a flow
/// runs to completion (compensation included) even if the caller's future is
/// dropped. Mutations of the same contact are serialized through the
/// [`DistributedLock`]. Reads go straight to the metadata store.
///
/// Cloning is cheap; clones share stores, metrics and in-flight flows.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) contacts: Arc<dyn ContactStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) lock: Arc<dyn DistributedLock>,
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) metrics: Arc<GatewayMetrics>,
    pub(crate) leaks: Arc<LeakLedger>,
    pub(crate) flows: TaskTracker,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("blob_store", &self.blobs.name())
            .field("config", &self.config)
            .field("in_flight", &self.flows.len())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Validate and store a new contact, uploading `photo` first when given.
    ///
    /// Returns the new contact id.
    #[instrument(name = "contact.create", skip_all, fields(has_photo = photo.is_some()))]
    pub async fn create(
        &self,
        draft: &ContactDraft,
        photo: Option<PhotoUpload>,
    ) -> Result<i64, GatewayError> {
        let fields = self.validate(draft, photo.as_ref())?;
        let gateway = self.clone();
        self.spawn_flow(Flow::Create, async move {
            gateway.create_flow(fields, photo).await
        })
        .await
    }

    /// Replace the fields of contact `id`, and its photo when one is given.
    ///
    /// Without a photo the stored `photo_ref` is kept as is.
    #[instrument(name = "contact.update", skip_all, fields(contact.id = id, has_photo = photo.is_some()))]
    pub async fn update(
        &self,
        id: i64,
        draft: &ContactDraft,
        photo: Option<PhotoUpload>,
    ) -> Result<(), GatewayError> {
        let fields = self.validate(draft, photo.as_ref())?;
        let gateway = self.clone();
        self.spawn_flow(Flow::Update, async move {
            gateway.update_flow(id, fields, photo).await
        })
        .await
    }

    /// Delete contact `id` and then its photo.
    #[instrument(name = "contact.delete", skip_all, fields(contact.id = id))]
    pub async fn delete(&self, id: i64) -> Result<(), GatewayError> {
        let gateway = self.clone();
        self.spawn_flow(Flow::Delete, async move { gateway.delete_flow(id).await })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Contact, GatewayError> {
        self.read("get", self.contacts.get(id)).await
    }

    pub async fn list(&self, order: ContactOrder) -> Result<Vec<Contact>, GatewayError> {
        self.read("list", self.contacts.list(order)).await
    }

    /// Contacts whose surname contains `pattern` (case-insensitive). A blank
    /// pattern lists everyone.
    pub async fn search(&self, pattern: &str) -> Result<Vec<Contact>, GatewayError> {
        self.read("search", self.contacts.search_by_last_name(pattern.trim()))
            .await
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Blobs that may have been orphaned, oldest first.
    pub fn leaked_blobs(&self) -> Vec<LeakedBlob> {
        self.leaks.entries()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn blob_store_name(&self) -> &str {
        self.blobs.name()
    }

    /// Number of mutating flows currently running.
    pub fn in_flight(&self) -> usize {
        self.flows.len()
    }

    /// Close the flow tracker and wait for every in-flight flow to finish, so
    /// none is cut off between its store calls.
    pub async fn shutdown(&self) {
        self.flows.close();
        self.flows.wait().await;
        info!("gateway shutdown complete");
    }

    fn validate(
        &self,
        draft: &ContactDraft,
        photo: Option<&PhotoUpload>,
    ) -> Result<ContactFields, GatewayError> {
        let checked = draft.validate().and_then(|fields| {
            if let Some(photo) = photo {
                photo.validate(&self.config.photo_policy)?;
            }
            Ok(fields)
        });

        checked.map_err(|e| {
            self.metrics.increment_validation_rejected();
            debug!(error = %e, "input rejected");
            GatewayError::Validation(e)
        })
    }

    async fn spawn_flow<T, F>(&self, flow: Flow, task: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, GatewayError>> + Send + 'static,
    {
        self.flows
            .spawn(task.in_current_span())
            .await
            .map_err(|e| {
                error!(%flow, error = %e, "flow task did not complete");
                GatewayError::Internal(format!("{flow} flow task failed: {e}"))
            })?
    }

    // -- flows ---------------------------------------------------------------

    async fn create_flow(
        &self,
        fields: ContactFields,
        photo: Option<PhotoUpload>,
    ) -> Result<i64, GatewayError> {
        // No id exists yet; creates claiming the same email are serialized.
        let lock_name = email_lock_name(&fields.email);
        let guard = self.acquire(&lock_name).await?;
        let result = self.create_locked(fields, photo).await;
        self.release(guard, &lock_name).await;
        result
    }

    async fn create_locked(
        &self,
        fields: ContactFields,
        photo: Option<PhotoUpload>,
    ) -> Result<i64, GatewayError> {
        let photo_ref = match &photo {
            Some(photo) => Some(self.upload(photo).await?),
            None => None,
        };

        let record = ContactRecord::new(fields, photo_ref.clone());
        match self.write("create", self.contacts.create(&record)).await {
            Ok(id) => {
                self.metrics.increment_created();
                info!(contact.id = id, has_photo = photo_ref.is_some(), "contact created");
                Ok(id)
            }
            Err(failure) => {
                warn!(error = %failure.error, "contact insert failed");
                if let Some(locator) = &photo_ref {
                    self.undo_upload(locator, Flow::Create, None, &failure)
                        .await;
                }
                Err(failure.error)
            }
        }
    }

    async fn update_flow(
        &self,
        id: i64,
        fields: ContactFields,
        photo: Option<PhotoUpload>,
    ) -> Result<(), GatewayError> {
        let lock_name = contact_lock_name(id);
        let guard = self.acquire(&lock_name).await?;
        let result = self.update_locked(id, fields, photo).await;
        self.release(guard, &lock_name).await;
        result
    }

    async fn update_locked(
        &self,
        id: i64,
        fields: ContactFields,
        photo: Option<PhotoUpload>,
    ) -> Result<(), GatewayError> {
        let current = self.read("get", self.contacts.get(id)).await?;

        // The new photo goes up before the old one or the row is touched.
        let new_ref = match &photo {
            Some(photo) => Some(self.upload(photo).await?),
            None => None,
        };

        let photo_ref = new_ref.clone().or_else(|| current.photo_ref.clone());
        let record = ContactRecord::new(fields, photo_ref);
        if let Err(failure) = self.write("update", self.contacts.update(id, &record)).await {
            warn!(contact.id = id, error = %failure.error, "contact update failed");
            if let Some(locator) = &new_ref {
                self.undo_upload(locator, Flow::Update, Some(id), &failure)
                    .await;
            }
            return Err(failure.error);
        }

        self.metrics.increment_updated();
        info!(contact.id = id, photo_replaced = new_ref.is_some(), "contact updated");

        if let (Some(new), Some(old)) = (&new_ref, &current.photo_ref)
            && new != old
        {
            self.remove_committed(old, Flow::Update, id).await;
        }
        Ok(())
    }

    async fn delete_flow(&self, id: i64) -> Result<(), GatewayError> {
        let lock_name = contact_lock_name(id);
        let guard = self.acquire(&lock_name).await?;
        let result = self.delete_locked(id).await;
        self.release(guard, &lock_name).await;
        result
    }

    async fn delete_locked(&self, id: i64) -> Result<(), GatewayError> {
        let current = self.read("get", self.contacts.get(id)).await?;

        if let Err(failure) = self.write("delete", self.contacts.delete(id)).await {
            warn!(contact.id = id, error = %failure.error, "contact delete failed; photo left in place");
            return Err(failure.error);
        }

        self.metrics.increment_deleted();
        info!(contact.id = id, "contact deleted");

        if let Some(locator) = &current.photo_ref {
            self.remove_committed(locator, Flow::Delete, id).await;
        }
        Ok(())
    }

    // -- store calls ---------------------------------------------------------

    async fn read<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, GatewayError> {
        let limit = self.config.metadata_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => {
                warn!(op, timeout = ?limit, "metadata store call timed out");
                Err(GatewayError::StoreUnavailable(format!(
                    "{op} timed out after {limit:?}"
                )))
            }
        }
    }

    async fn write<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, WriteFailure> {
        let limit = self.config.metadata_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(|e| WriteFailure {
                error: e.into(),
                unconfirmed: false,
            }),
            Err(_) => {
                warn!(op, timeout = ?limit, "metadata store write timed out");
                Err(WriteFailure {
                    error: GatewayError::StoreUnavailable(format!(
                        "{op} timed out after {limit:?}"
                    )),
                    unconfirmed: true,
                })
            }
        }
    }

    async fn upload(&self, photo: &PhotoUpload) -> Result<String, GatewayError> {
        let limit = self.config.blob_put_timeout;
        let call = self
            .blobs
            .put(photo.data.clone(), &photo.file_name, &photo.content_type);
        let result = match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => Err(GatewayError::UploadFailure(format!(
                "upload timed out after {limit:?}"
            ))),
        };

        match result {
            Ok(locator) => {
                debug!(locator = %locator, size = photo.size(), "photo uploaded");
                Ok(locator)
            }
            Err(e) => {
                self.metrics.increment_upload_failures();
                warn!(error = %e, file_name = %photo.file_name, "photo upload failed");
                Err(e)
            }
        }
    }

    async fn remove_blob(&self, locator: &str) -> Result<(), BlobError> {
        let limit = self.config.blob_delete_timeout;
        match tokio::time::timeout(limit, self.blobs.delete(locator)).await {
            Ok(result) => result,
            Err(_) => Err(BlobError::DeleteFailure(format!(
                "delete timed out after {limit:?}"
            ))),
        }
    }

    /// Clean up a blob uploaded by a flow whose row write failed. When the
    /// write outcome is unknown the blob may be referenced, so it is kept and
    /// only recorded.
    async fn undo_upload(
        &self,
        locator: &str,
        flow: Flow,
        contact_id: Option<i64>,
        failure: &WriteFailure,
    ) {
        if failure.unconfirmed {
            warn!(locator, %flow, "row write outcome unknown; keeping uploaded photo");
            self.record_leak(
                locator,
                flow,
                contact_id,
                format!("kept after unconfirmed write: {}", failure.error),
            );
            return;
        }

        self.metrics.increment_compensations();
        match self.remove_blob(locator).await {
            Ok(()) => info!(locator, %flow, "compensating delete removed uploaded photo"),
            Err(e) => {
                self.metrics.increment_compensation_failures();
                error!(locator, %flow, error = %e, "compensating delete failed; photo orphaned");
                self.record_leak(locator, flow, contact_id, e.to_string());
            }
        }
    }

    /// Delete a photo whose row change is already committed. Failure is
    /// recorded but never returned.
    async fn remove_committed(&self, locator: &str, flow: Flow, contact_id: i64) {
        match self.remove_blob(locator).await {
            Ok(()) => {
                match flow {
                    Flow::Update => self.metrics.increment_blobs_replaced(),
                    Flow::Create | Flow::Delete => self.metrics.increment_blobs_removed(),
                }
                debug!(locator, %flow, contact.id = contact_id, "previous photo removed");
            }
            Err(e) => {
                error!(locator, %flow, contact.id = contact_id, error = %e, "photo delete after commit failed; photo orphaned");
                self.record_leak(locator, flow, Some(contact_id), e.to_string());
            }
        }
    }

    fn record_leak(&self, locator: &str, flow: Flow, contact_id: Option<i64>, reason: String) {
        self.metrics.increment_leaked_blobs();
        self.leaks.record(locator, flow, contact_id, reason);
    }

    // -- locking -------------------------------------------------------------

    async fn acquire(&self, name: &str) -> Result<Box<dyn LockGuard>, GatewayError> {
        self.lock
            .acquire(name, self.config.lock_ttl, self.config.lock_wait)
            .await
            .map_err(|e| {
                self.metrics.increment_lock_failures();
                warn!(lock = name, error = %e, "lock not acquired");
                GatewayError::LockFailed(e.to_string())
            })
    }

    async fn release(&self, guard: Box<dyn LockGuard>, name: &str) {
        if let Err(e) = guard.release().await {
            warn!(lock = name, error = %e, "lock release failed; it will expire after its TTL");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use contacts_blob::MemoryBlobStore;
    use contacts_blob::testing::FailingBlobStore;
    use contacts_core::ValidationError;
    use contacts_store::testing::FailingContactStore;
    use contacts_store_memory::{MemoryContactStore, MemoryDistributedLock};

    use super::*;
    use crate::builder::GatewayBuilder;

    struct Harness {
        gateway: Gateway,
        contacts: Arc<MemoryContactStore>,
        faulty_contacts: Arc<FailingContactStore>,
        blobs: Arc<MemoryBlobStore>,
        faulty_blobs: Arc<FailingBlobStore>,
        lock: Arc<MemoryDistributedLock>,
    }

    fn harness() -> Harness {
        harness_with(GatewayConfig::default())
    }

    fn harness_with(config: GatewayConfig) -> Harness {
        let contacts = Arc::new(MemoryContactStore::new());
        let faulty_contacts = Arc::new(FailingContactStore::new(contacts.clone()));
        let blobs = Arc::new(MemoryBlobStore::new());
        let faulty_blobs = Arc::new(FailingBlobStore::new(blobs.clone()));
        let lock = Arc::new(MemoryDistributedLock::new());
        let gateway = GatewayBuilder::new()
            .contacts(faulty_contacts.clone())
            .blobs(faulty_blobs.clone())
            .lock(lock.clone())
            .config(config)
            .build()
            .unwrap();
        Harness {
            gateway,
            contacts,
            faulty_contacts,
            blobs,
            faulty_blobs,
            lock,
        }
    }

    fn ana(email: &str) -> ContactDraft {
        ContactDraft::new("Ana", "Lopez", email, "1990-01-01")
    }

    fn png(name: &str) -> PhotoUpload {
        PhotoUpload::new(name, "image/png", Bytes::from_static(b"\x89PNG\r\n\x1a\nfake"))
    }

    // -- create --------------------------------------------------------------

    #[tokio::test]
    async fn create_without_photo_has_no_photo_ref() {
        let h = harness();
        let id = h.gateway.create(&ana("ana@x.com"), None).await.unwrap();

        let contact = h.gateway.get(id).await.unwrap();
        assert_eq!(contact.display_name(), "Lopez, Ana");
        assert!(contact.photo_ref.is_none());
        assert_eq!(h.faulty_blobs.put_calls(), 0);
        assert!(h.blobs.is_empty());
        assert_eq!(h.gateway.metrics().snapshot().created, 1);
    }

    #[tokio::test]
    async fn create_with_photo_stores_blob_and_reference() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap();

        let locator = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        assert!(locator.starts_with("memory://contactos/"));
        assert!(locator.ends_with("_ana.png"));
        let stored = h.blobs.get(&locator).expect("blob should exist");
        assert_eq!(stored.content_type, "image/png");
    }

    #[tokio::test]
    async fn create_validation_failure_makes_no_store_calls() {
        let h = harness();
        let err = h
            .gateway
            .create(&ana("not-an-email"), Some(png("ana.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation(ValidationError::InvalidEmail(_))));
        assert_eq!(h.faulty_blobs.put_calls(), 0);
        assert_eq!(h.faulty_contacts.create_calls(), 0);
        assert_eq!(h.gateway.metrics().snapshot().validation_rejected, 1);
    }

    #[tokio::test]
    async fn create_rejects_unsupported_photo_before_upload() {
        let h = harness();
        let bmp = PhotoUpload::new("ana.bmp", "image/bmp", Bytes::from_static(b"BM"));
        let err = h
            .gateway
            .create(&ana("ana@x.com"), Some(bmp))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Validation(ValidationError::UnsupportedPhotoType(_))
        ));
        assert_eq!(h.faulty_blobs.put_calls(), 0);
        assert!(h.contacts.is_empty());
    }

    #[tokio::test]
    async fn create_upload_failure_writes_nothing() {
        let h = harness();
        h.faulty_blobs.fail_puts(true);

        let err = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UploadFailure(_)));
        assert_eq!(h.faulty_contacts.create_calls(), 0);
        assert!(h.contacts.is_empty());
        assert_eq!(h.gateway.metrics().snapshot().upload_failures, 1);
    }

    #[tokio::test]
    async fn duplicate_email_removes_the_attempts_blob() {
        let h = harness();
        h.gateway.create(&ana("ana@x.com"), None).await.unwrap();

        let err = h
            .gateway
            .create(
                &ContactDraft::new("Otra", "Ana", "ana@x.com", "1991-02-03"),
                Some(png("otra.png")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::DuplicateEmail(ref email) if email == "ana@x.com"));
        assert!(h.blobs.is_empty(), "the attempt's blob must be gone");
        assert_eq!(h.faulty_blobs.delete_calls(), 1);
        assert_eq!(h.contacts.len(), 1);
        let snap = h.gateway.metrics().snapshot();
        assert_eq!(snap.compensations, 1);
        assert_eq!(snap.compensation_failures, 0);
        assert!(h.gateway.leaked_blobs().is_empty());
    }

    #[tokio::test]
    async fn email_differing_only_in_case_is_a_duplicate() {
        let h = harness();
        let id = h.gateway.create(&ana("Ana@X.com"), None).await.unwrap();
        assert_eq!(h.gateway.get(id).await.unwrap().email, "ana@x.com");

        let err = h
            .gateway
            .create(&ana("ANA@x.COM"), Some(png("dup.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::DuplicateEmail(_)));
        assert_eq!(h.contacts.len(), 1);
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_is_recorded_as_leak() {
        let h = harness();
        h.faulty_contacts.fail_creates(true);
        h.faulty_blobs.fail_deletes(true);

        let err = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::StoreUnavailable(_)));
        assert_eq!(h.blobs.len(), 1, "undeletable blob stays behind");
        let leaks = h.gateway.leaked_blobs();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].flow, Flow::Create);
        assert_eq!(leaks[0].contact_id, None);
        assert_eq!(leaks[0].locator, h.blobs.locators()[0]);
        let snap = h.gateway.metrics().snapshot();
        assert_eq!(snap.compensation_failures, 1);
        assert_eq!(snap.leaked_blobs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn create_timeout_keeps_blob_that_may_be_referenced() {
        let h = harness_with(GatewayConfig {
            metadata_timeout: Duration::from_millis(50),
            ..GatewayConfig::default()
        });
        h.faulty_contacts.delay_mutations(Duration::from_millis(500));

        let err = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::StoreUnavailable(_)));
        assert_eq!(h.faulty_blobs.delete_calls(), 0, "no compensation on unknown outcome");
        assert_eq!(h.gateway.leaked_blobs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_timeout_is_upload_failure_and_writes_no_row() {
        let h = harness_with(GatewayConfig {
            blob_put_timeout: Duration::from_millis(50),
            ..GatewayConfig::default()
        });
        h.faulty_blobs.delay_puts(Duration::from_millis(500));

        let err = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UploadFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(h.faulty_contacts.create_calls(), 0);
        assert!(h.contacts.is_empty());
        assert_eq!(h.gateway.metrics().snapshot().upload_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_timeout_is_store_unavailable_without_blob_calls() {
        let h = harness_with(GatewayConfig {
            metadata_timeout: Duration::from_millis(50),
            ..GatewayConfig::default()
        });
        let id = h.gateway.create(&ana("ana@x.com"), None).await.unwrap();
        h.faulty_contacts.delay_reads(Duration::from_millis(500));

        let err = h
            .gateway
            .update(id, &ana("ana@x.com"), Some(png("new.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::StoreUnavailable(_)));

        let err = h.gateway.delete(id).await.unwrap_err();
        assert!(matches!(err, GatewayError::StoreUnavailable(_)));

        assert_eq!(h.faulty_blobs.put_calls(), 0);
        assert_eq!(h.faulty_blobs.delete_calls(), 0);
        assert_eq!(h.faulty_contacts.update_calls(), 0);
        assert_eq!(h.faulty_contacts.delete_calls(), 0);
        assert_eq!(h.contacts.len(), 1);
    }

    // -- update --------------------------------------------------------------

    #[tokio::test]
    async fn update_without_photo_keeps_reference_and_blob() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap();
        let before = h.gateway.get(id).await.unwrap().photo_ref;

        h.gateway
            .update(id, &ContactDraft::new("Ana Maria", "Lopez", "ana@x.com", "1990-01-01"), None)
            .await
            .unwrap();

        let after = h.gateway.get(id).await.unwrap();
        assert_eq!(after.first_name, "Ana Maria");
        assert_eq!(after.photo_ref, before);
        assert!(h.blobs.exists(before.as_deref().unwrap()).await.unwrap());
        assert_eq!(h.faulty_blobs.put_calls(), 1);
        assert_eq!(h.faulty_blobs.delete_calls(), 0);
    }

    #[tokio::test]
    async fn update_with_photo_replaces_old_blob() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("old.png")))
            .await
            .unwrap();
        let old = h.gateway.get(id).await.unwrap().photo_ref.unwrap();

        h.gateway
            .update(id, &ana("ana@x.com"), Some(png("new.png")))
            .await
            .unwrap();

        let new = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        assert_ne!(new, old);
        assert!(!h.blobs.exists(&old).await.unwrap(), "old blob must be gone");
        assert!(h.blobs.exists(&new).await.unwrap(), "new blob must be reachable");
        assert_eq!(h.gateway.metrics().snapshot().blobs_replaced, 1);
    }

    #[tokio::test]
    async fn update_adds_photo_to_contact_without_one() {
        let h = harness();
        let id = h.gateway.create(&ana("ana@x.com"), None).await.unwrap();

        h.gateway
            .update(id, &ana("ana@x.com"), Some(png("first.png")))
            .await
            .unwrap();

        let locator = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        assert_eq!(h.blobs.locators(), vec![locator]);
        assert_eq!(h.faulty_blobs.delete_calls(), 0);
    }

    #[tokio::test]
    async fn update_upload_failure_leaves_row_and_old_blob() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("old.png")))
            .await
            .unwrap();
        let before = h.gateway.get(id).await.unwrap();
        h.faulty_blobs.fail_puts(true);

        let err = h
            .gateway
            .update(
                id,
                &ContactDraft::new("Changed", "Name", "ana@x.com", "1990-01-01"),
                Some(png("new.png")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UploadFailure(_)));
        assert_eq!(h.faulty_contacts.update_calls(), 0);
        assert_eq!(h.gateway.get(id).await.unwrap(), before);
        assert!(h.blobs.exists(before.photo_ref.as_deref().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn update_row_failure_compensates_new_blob() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("old.png")))
            .await
            .unwrap();
        let old = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        h.faulty_contacts.fail_updates(true);

        let err = h
            .gateway
            .update(id, &ana("ana@x.com"), Some(png("new.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::StoreUnavailable(_)));
        assert_eq!(h.blobs.locators(), vec![old.clone()]);
        assert_eq!(h.gateway.get(id).await.unwrap().photo_ref, Some(old));
        assert_eq!(h.gateway.metrics().snapshot().compensations, 1);
    }

    #[tokio::test]
    async fn update_to_taken_email_compensates_new_blob() {
        let h = harness();
        h.gateway.create(&ana("ana@x.com"), None).await.unwrap();
        let id = h
            .gateway
            .create(&ContactDraft::new("Luis", "Perez", "luis@x.com", "1985-05-05"), None)
            .await
            .unwrap();

        let err = h
            .gateway
            .update(
                id,
                &ContactDraft::new("Luis", "Perez", "ana@x.com", "1985-05-05"),
                Some(png("luis.png")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::DuplicateEmail(_)));
        assert!(h.blobs.is_empty());
        assert_eq!(h.gateway.get(id).await.unwrap().email, "luis@x.com");
    }

    #[tokio::test]
    async fn update_missing_contact_has_no_side_effects() {
        let h = harness();
        let err = h
            .gateway
            .update(404, &ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NotFound(404)));
        assert_eq!(h.faulty_blobs.put_calls(), 0);
        assert_eq!(h.faulty_contacts.update_calls(), 0);
    }

    #[tokio::test]
    async fn update_validates_before_lookup() {
        let h = harness();
        let err = h
            .gateway
            .update(404, &ContactDraft::new("", "Lopez", "ana@x.com", "1990-01-01"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Validation(ValidationError::EmptyField("nombre"))
        ));
    }

    #[tokio::test]
    async fn post_commit_delete_failure_is_not_surfaced() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("old.png")))
            .await
            .unwrap();
        let old = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        h.faulty_blobs.fail_deletes(true);

        h.gateway
            .update(id, &ana("ana@x.com"), Some(png("new.png")))
            .await
            .expect("post-commit delete failure must not fail the update");

        let new = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        assert_ne!(new, old);
        assert!(h.blobs.exists(&new).await.unwrap());
        let leaks = h.gateway.leaked_blobs();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].locator, old);
        assert_eq!(leaks[0].flow, Flow::Update);
        assert_eq!(leaks[0].contact_id, Some(id));
        let snap = h.gateway.metrics().snapshot();
        assert_eq!(snap.leaked_blobs, 1);
        assert_eq!(snap.blobs_replaced, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn post_commit_delete_timeout_is_recorded_not_surfaced() {
        let h = harness_with(GatewayConfig {
            blob_delete_timeout: Duration::from_millis(50),
            ..GatewayConfig::default()
        });
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("old.png")))
            .await
            .unwrap();
        let old = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        h.faulty_blobs.delay_deletes(Duration::from_millis(500));

        h.gateway
            .update(id, &ana("ana@x.com"), Some(png("new.png")))
            .await
            .expect("a slow delete of the old photo must not fail the update");

        let new = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        assert_ne!(new, old);
        let leaks = h.gateway.leaked_blobs();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].locator, old);
        assert_eq!(leaks[0].flow, Flow::Update);
        assert!(leaks[0].error.contains("timed out"), "error: {}", leaks[0].error);
        assert_eq!(h.gateway.metrics().snapshot().blobs_replaced, 0);
    }

    // -- delete --------------------------------------------------------------

    #[tokio::test]
    async fn delete_with_photo_removes_row_and_blob() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap();
        let locator = h.gateway.get(id).await.unwrap().photo_ref.unwrap();

        h.gateway.delete(id).await.unwrap();

        assert!(matches!(h.gateway.get(id).await, Err(GatewayError::NotFound(_))));
        assert!(h.blobs.is_empty());
        assert_eq!(h.faulty_blobs.deleted_locators(), vec![locator]);
        let snap = h.gateway.metrics().snapshot();
        assert_eq!(snap.deleted, 1);
        assert_eq!(snap.blobs_removed, 1);
    }

    #[tokio::test]
    async fn delete_without_photo_makes_no_blob_calls() {
        let h = harness();
        let id = h.gateway.create(&ana("ana@x.com"), None).await.unwrap();

        h.gateway.delete(id).await.unwrap();

        assert!(h.contacts.is_empty());
        assert_eq!(h.faulty_blobs.delete_calls(), 0);
    }

    #[tokio::test]
    async fn delete_missing_contact_is_not_found() {
        let h = harness();
        let err = h.gateway.delete(7).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(7)));
        assert_eq!(h.faulty_contacts.delete_calls(), 0);
    }

    #[tokio::test]
    async fn delete_row_failure_leaves_blob_untouched() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap();
        h.faulty_contacts.fail_deletes(true);

        let err = h.gateway.delete(id).await.unwrap_err();

        assert!(matches!(err, GatewayError::StoreUnavailable(_)));
        assert!(h.gateway.get(id).await.is_ok());
        assert_eq!(h.blobs.len(), 1);
        assert_eq!(h.faulty_blobs.delete_calls(), 0);
    }

    #[tokio::test]
    async fn delete_blob_failure_is_not_surfaced() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("ana.png")))
            .await
            .unwrap();
        h.faulty_blobs.fail_deletes(true);

        h.gateway.delete(id).await.unwrap();

        assert!(h.contacts.is_empty());
        let leaks = h.gateway.leaked_blobs();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].flow, Flow::Delete);
    }

    // -- concurrency ---------------------------------------------------------

    #[tokio::test]
    async fn concurrent_updates_leave_exactly_one_referenced_blob() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("original.png")))
            .await
            .unwrap();
        h.faulty_blobs.delay_puts(Duration::from_millis(20));

        let first = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move {
                gateway
                    .update(id, &ana("ana@x.com"), Some(png("first.png")))
                    .await
            })
        };
        let second = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move {
                gateway
                    .update(id, &ana("ana@x.com"), Some(png("second.png")))
                    .await
            })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let row = h.gateway.get(id).await.unwrap();
        assert_eq!(h.blobs.locators(), vec![row.photo_ref.unwrap()]);
        assert_eq!(h.gateway.metrics().snapshot().blobs_replaced, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shortest_valid_lock_ttl_still_serializes_slow_updates() {
        let mut config = GatewayConfig {
            metadata_timeout: Duration::from_millis(10),
            blob_put_timeout: Duration::from_millis(150),
            blob_delete_timeout: Duration::from_millis(10),
            ..GatewayConfig::default()
        };
        config.lock_ttl = config.longest_flow();
        let h = harness_with(config);
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("original.png")))
            .await
            .unwrap();
        h.faulty_blobs.delay_puts(Duration::from_millis(100));

        let (input_a, input_b) = (ana("ana@x.com"), ana("ana@x.com"));
        let (a, b) = tokio::join!(
            h.gateway.update(id, &input_a, Some(png("a.png"))),
            h.gateway.update(id, &input_b, Some(png("b.png"))),
        );
        a.unwrap();
        b.unwrap();

        let row = h.gateway.get(id).await.unwrap();
        assert_eq!(h.blobs.locators(), vec![row.photo_ref.unwrap()]);
        assert!(h.gateway.leaked_blobs().is_empty());
    }

    #[tokio::test]
    async fn concurrent_creates_with_same_email_leave_no_orphans() {
        let h = harness();
        h.faulty_blobs.delay_puts(Duration::from_millis(10));

        let attempts: Vec<_> = (0..3)
            .map(|i| {
                let gateway = h.gateway.clone();
                tokio::spawn(async move {
                    gateway
                        .create(&ana("ana@x.com"), Some(png(&format!("ana{i}.png"))))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, GatewayError::DuplicateEmail(_)), "got {e:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(h.blobs.len(), 1);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_interrupt_flow() {
        let h = harness();
        let id = h
            .gateway
            .create(&ana("ana@x.com"), Some(png("old.png")))
            .await
            .unwrap();
        let old = h.gateway.get(id).await.unwrap().photo_ref.unwrap();
        h.faulty_blobs.delay_puts(Duration::from_millis(100));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            h.gateway.update(id, &ana("ana@x.com"), Some(png("new.png"))),
        )
        .await;
        assert!(abandoned.is_err(), "caller should give up before the upload ends");

        h.gateway.shutdown().await;

        let row = h.gateway.get(id).await.unwrap();
        let new = row.photo_ref.unwrap();
        assert_ne!(new, old);
        assert_eq!(h.blobs.locators(), vec![new]);
        assert_eq!(h.gateway.in_flight(), 0);
    }

    #[tokio::test]
    async fn lock_timeout_yields_lock_failed() {
        let h = harness_with(GatewayConfig {
            lock_wait: Duration::from_millis(50),
            ..GatewayConfig::default()
        });
        let id = h.gateway.create(&ana("ana@x.com"), None).await.unwrap();
        let held = h
            .lock
            .try_acquire(&contact_lock_name(id), Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();

        let err = h.gateway.delete(id).await.unwrap_err();

        assert!(matches!(err, GatewayError::LockFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(h.gateway.metrics().snapshot().lock_failures, 1);
        assert_eq!(h.faulty_contacts.delete_calls(), 0);
        held.release().await.unwrap();
        h.gateway.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn locks_are_released_after_every_flow() {
        let h = harness();
        let id = h.gateway.create(&ana("ana@x.com"), None).await.unwrap();
        h.faulty_contacts.fail_updates(true);
        let _ = h.gateway.update(id, &ana("ana@x.com"), None).await;
        let _ = h.gateway.delete(999).await;
        assert!(h.lock.is_empty());
    }

    // -- reads ---------------------------------------------------------------

    #[tokio::test]
    async fn list_and_search_pass_through() {
        let h = harness();
        h.gateway
            .create(&ContactDraft::new("Zoe", "Alvarez", "zoe@x.com", "1992-03-04"), None)
            .await
            .unwrap();
        h.gateway.create(&ana("ana@x.com"), None).await.unwrap();

        let names: Vec<String> = h
            .gateway
            .list(ContactOrder::Name)
            .await
            .unwrap()
            .iter()
            .map(Contact::display_name)
            .collect();
        assert_eq!(names, vec!["Alvarez, Zoe", "Lopez, Ana"]);

        let hits = h.gateway.search("  lop ").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].email, "ana@x.com");
        assert_eq!(h.gateway.search("").await.unwrap().len(), 2);
    }
}
