//! Conformance suites shared by every backend, and a fault-injecting
//! [`ContactStore`] wrapper for exercising failure paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use contacts_core::{Contact, ContactFields, ContactOrder, ContactRecord};

use crate::error::StoreError;
use crate::lock::DistributedLock;
use crate::store::ContactStore;

fn record(first: &str, last: &str, email: &str, photo: Option<&str>) -> ContactRecord {
    ContactRecord::new(
        ContactFields {
            first_name: first.to_owned(),
            last_name: last.to_owned(),
            email: email.to_owned(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        },
        photo.map(str::to_owned),
    )
}

/// Run the full contact store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if a store call fails unexpectedly. Assertion failures
/// panic.
pub async fn run_store_conformance_tests(store: &dyn ContactStore) -> Result<(), StoreError> {
    test_get_missing(store).await?;
    test_create_and_get(store).await?;
    test_duplicate_email(store).await?;
    test_update(store).await?;
    test_update_missing(store).await?;
    test_update_to_taken_email(store).await?;
    test_delete(store).await?;
    test_list_order(store).await?;
    test_search(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn ContactStore) -> Result<(), StoreError> {
    let err = store.get(i64::MAX).await.unwrap_err();
    assert!(
        matches!(err, StoreError::NotFound(id) if id == i64::MAX),
        "get on missing id should be NotFound, got {err:?}"
    );
    Ok(())
}

async fn test_create_and_get(store: &dyn ContactStore) -> Result<(), StoreError> {
    let id = store
        .create(&record("Ana", "Lopez", "conf-create@x.com", Some("memory://contactos/1_a.png")))
        .await?;
    let contact = store.get(id).await?;
    assert_eq!(contact.id, id);
    assert_eq!(contact.first_name, "Ana");
    assert_eq!(contact.last_name, "Lopez");
    assert_eq!(contact.email, "conf-create@x.com");
    assert_eq!(contact.birth_date, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
    assert_eq!(contact.photo_ref.as_deref(), Some("memory://contactos/1_a.png"));
    assert!(contact.updated_at >= contact.created_at);

    let other = store
        .create(&record("Luis", "Perez", "conf-create-2@x.com", None))
        .await?;
    assert_ne!(other, id, "ids must be unique");
    assert!(store.get(other).await?.photo_ref.is_none());
    Ok(())
}

async fn test_duplicate_email(store: &dyn ContactStore) -> Result<(), StoreError> {
    store
        .create(&record("Eva", "Diaz", "conf-dup@x.com", None))
        .await?;
    let err = store
        .create(&record("Otra", "Persona", "conf-dup@x.com", None))
        .await
        .unwrap_err();
    assert!(
        matches!(err, StoreError::DuplicateEmail(ref email) if email == "conf-dup@x.com"),
        "second insert with the same email should be DuplicateEmail, got {err:?}"
    );
    Ok(())
}

async fn test_update(store: &dyn ContactStore) -> Result<(), StoreError> {
    let id = store
        .create(&record("Old", "Name", "conf-update@x.com", Some("memory://contactos/1_old.png")))
        .await?;
    let before = store.get(id).await?;

    store
        .update(
            id,
            &record("New", "Surname", "conf-update-new@x.com", Some("memory://contactos/2_new.png")),
        )
        .await?;
    let after = store.get(id).await?;
    assert_eq!(after.first_name, "New");
    assert_eq!(after.last_name, "Surname");
    assert_eq!(after.email, "conf-update-new@x.com");
    assert_eq!(after.photo_ref.as_deref(), Some("memory://contactos/2_new.png"));
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);

    store
        .update(id, &record("New", "Surname", "conf-update-new@x.com", None))
        .await?;
    assert!(store.get(id).await?.photo_ref.is_none(), "update should clear photo_ref");
    Ok(())
}

async fn test_update_missing(store: &dyn ContactStore) -> Result<(), StoreError> {
    let err = store
        .update(i64::MAX, &record("No", "One", "conf-nobody@x.com", None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "got {err:?}");
    Ok(())
}

async fn test_update_to_taken_email(store: &dyn ContactStore) -> Result<(), StoreError> {
    store
        .create(&record("Uno", "Primero", "conf-taken-1@x.com", None))
        .await?;
    let id = store
        .create(&record("Dos", "Segundo", "conf-taken-2@x.com", None))
        .await?;
    let err = store
        .update(id, &record("Dos", "Segundo", "conf-taken-1@x.com", None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEmail(_)), "got {err:?}");
    assert_eq!(store.get(id).await?.email, "conf-taken-2@x.com");

    // Re-saving a row with its own email is not a conflict.
    store
        .update(id, &record("Dos", "Segundo", "conf-taken-2@x.com", None))
        .await?;
    Ok(())
}

async fn test_delete(store: &dyn ContactStore) -> Result<(), StoreError> {
    let id = store
        .create(&record("Bye", "Bye", "conf-delete@x.com", None))
        .await?;
    store.delete(id).await?;
    assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
    assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));

    // The email is free again once the row is gone.
    store
        .create(&record("Bye", "Again", "conf-delete@x.com", None))
        .await?;
    Ok(())
}

fn position(contacts: &[Contact], id: i64) -> usize {
    contacts
        .iter()
        .position(|c| c.id == id)
        .unwrap_or_else(|| panic!("contact {id} missing from listing"))
}

async fn test_list_order(store: &dyn ContactStore) -> Result<(), StoreError> {
    let beta = store
        .create(&record("Carla", "Conformidad Beta", "conf-list-1@x.com", None))
        .await?;
    let alfa_b = store
        .create(&record("Bruno", "Conformidad Alfa", "conf-list-2@x.com", None))
        .await?;
    let alfa_a = store
        .create(&record("Andrea", "Conformidad Alfa", "conf-list-3@x.com", None))
        .await?;

    let by_name = store.list(ContactOrder::Name).await?;
    assert!(position(&by_name, alfa_a) < position(&by_name, alfa_b));
    assert!(position(&by_name, alfa_b) < position(&by_name, beta));

    let newest = store.list(ContactOrder::Newest).await?;
    assert_eq!(newest.len(), by_name.len());
    assert!(position(&newest, alfa_a) < position(&newest, alfa_b));
    assert!(position(&newest, alfa_b) < position(&newest, beta));
    Ok(())
}

async fn test_search(store: &dyn ContactStore) -> Result<(), StoreError> {
    let garcia = store
        .create(&record("Marta", "Busqueda Garcia", "conf-search-1@x.com", None))
        .await?;
    let garcilaso = store
        .create(&record("Pedro", "Busqueda Garcilaso", "conf-search-2@x.com", None))
        .await?;
    store
        .create(&record("Rosa", "Busqueda Ruiz", "conf-search-3@x.com", None))
        .await?;

    let hits = store.search_by_last_name("GARCI").await?;
    let ids: Vec<i64> = hits.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![garcia, garcilaso], "case-insensitive substring, surname order");

    let all = store.search_by_last_name("").await?;
    assert_eq!(all.len(), store.list(ContactOrder::Name).await?.len());

    let literal = store.search_by_last_name("Busq%Ruiz").await?;
    assert!(literal.is_empty(), "% must not act as a wildcard");
    let literal = store.search_by_last_name("B_squeda").await?;
    assert!(literal.is_empty(), "_ must not act as a wildcard");
    Ok(())
}

/// Run the full distributed lock conformance test suite.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_lock_conformance_tests(lock: &dyn DistributedLock) -> Result<(), StoreError> {
    test_try_acquire_and_release(lock).await?;
    test_try_acquire_contention(lock).await?;
    test_lock_is_held(lock).await?;
    test_acquire_times_out(lock).await?;
    Ok(())
}

async fn test_try_acquire_and_release(lock: &dyn DistributedLock) -> Result<(), StoreError> {
    let guard = lock
        .try_acquire("contact:9001", Duration::from_secs(10))
        .await?;
    assert!(guard.is_some(), "should acquire uncontested lock");
    let guard = guard.unwrap();
    guard.release().await?;

    let again = lock
        .try_acquire("contact:9001", Duration::from_secs(10))
        .await?;
    assert!(again.is_some(), "released lock should be acquirable");
    again.unwrap().release().await?;
    Ok(())
}

async fn test_try_acquire_contention(lock: &dyn DistributedLock) -> Result<(), StoreError> {
    let guard = lock
        .try_acquire("contact:9002", Duration::from_secs(10))
        .await?;
    assert!(guard.is_some());
    let held = guard.unwrap();

    let second = lock
        .try_acquire("contact:9002", Duration::from_secs(10))
        .await?;
    assert!(
        second.is_none(),
        "second acquire should fail while lock is held"
    );

    held.release().await?;
    Ok(())
}

async fn test_lock_is_held(lock: &dyn DistributedLock) -> Result<(), StoreError> {
    let guard = lock
        .try_acquire("contact-email:conf@x.com", Duration::from_secs(10))
        .await?
        .expect("should acquire lock");

    assert!(guard.is_held().await?, "lock should be held");
    guard.release().await?;
    Ok(())
}

async fn test_acquire_times_out(lock: &dyn DistributedLock) -> Result<(), StoreError> {
    let held = lock
        .try_acquire("contact:9004", Duration::from_secs(10))
        .await?
        .expect("should acquire lock");

    let result = lock
        .acquire("contact:9004", Duration::from_secs(10), Duration::from_millis(120))
        .await;
    assert!(
        matches!(result, Err(StoreError::Timeout(_))),
        "contended acquire should time out"
    );

    held.release().await?;
    let guard = lock
        .acquire("contact:9004", Duration::from_secs(10), Duration::from_millis(120))
        .await?;
    guard.release().await?;
    Ok(())
}

/// Wraps another [`ContactStore`] and fails or stalls mutations on demand.
///
/// Injected failures are reported as [`StoreError::Connection`]. Reads never
/// fail but can be stalled.
pub struct FailingContactStore {
    inner: Arc<dyn ContactStore>,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    delay_ms: AtomicU64,
    read_delay_ms: AtomicU64,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl std::fmt::Debug for FailingContactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingContactStore")
            .field("create_calls", &self.create_calls())
            .field("update_calls", &self.update_calls())
            .field("delete_calls", &self.delete_calls())
            .finish_non_exhaustive()
    }
}

impl FailingContactStore {
    /// Wrap `inner`; all calls pass through until a failure is switched on.
    pub fn new(inner: Arc<dyn ContactStore>) -> Self {
        Self {
            inner,
            fail_creates: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            read_delay_ms: AtomicU64::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long before forwarding each mutation.
    pub fn delay_mutations(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Sleep this long before forwarding each read.
    pub fn delay_reads(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.read_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    async fn before_read(&self) {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    async fn before_mutation(&self, fail: &AtomicBool) -> Result<(), StoreError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if fail.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected store fault".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContactStore for FailingContactStore {
    async fn create(&self, record: &ContactRecord) -> Result<i64, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.before_mutation(&self.fail_creates).await?;
        self.inner.create(record).await
    }

    async fn get(&self, id: i64) -> Result<Contact, StoreError> {
        self.before_read().await;
        self.inner.get(id).await
    }

    async fn list(&self, order: ContactOrder) -> Result<Vec<Contact>, StoreError> {
        self.before_read().await;
        self.inner.list(order).await
    }

    async fn search_by_last_name(&self, pattern: &str) -> Result<Vec<Contact>, StoreError> {
        self.before_read().await;
        self.inner.search_by_last_name(pattern).await
    }

    async fn update(&self, id: i64, record: &ContactRecord) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.before_mutation(&self.fail_updates).await?;
        self.inner.update(id, record).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.before_mutation(&self.fail_deletes).await?;
        self.inner.delete(id).await
    }
}
