use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use contacts_core::{Contact, ContactOrder, ContactRecord};
use contacts_store::error::StoreError;
use contacts_store::store::ContactStore;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, Contact>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|c| c.email == email && Some(c.id) != except)
    }
}

fn sort_by_name(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// In-memory [`ContactStore`].
///
/// Ids are assigned from a counter starting at 1 and never reused. Clones
/// share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryContactStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn create(&self, record: &ContactRecord) -> Result<i64, StoreError> {
        let mut inner = self.inner.write();
        if inner.email_taken(&record.fields.email, None) {
            return Err(StoreError::DuplicateEmail(record.fields.email.clone()));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        let fields = record.fields.clone();
        inner.rows.insert(
            id,
            Contact {
                id,
                first_name: fields.first_name,
                last_name: fields.last_name,
                email: fields.email,
                birth_date: fields.birth_date,
                photo_ref: record.photo_ref.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Contact, StoreError> {
        self.inner
            .read()
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, order: ContactOrder) -> Result<Vec<Contact>, StoreError> {
        let mut contacts: Vec<Contact> = self.inner.read().rows.values().cloned().collect();
        match order {
            ContactOrder::Name => sort_by_name(&mut contacts),
            ContactOrder::Newest => contacts.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            }),
        }
        Ok(contacts)
    }

    async fn search_by_last_name(&self, pattern: &str) -> Result<Vec<Contact>, StoreError> {
        let needle = pattern.to_lowercase();
        let mut contacts: Vec<Contact> = self
            .inner
            .read()
            .rows
            .values()
            .filter(|c| c.last_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        sort_by_name(&mut contacts);
        Ok(contacts)
    }

    async fn update(&self, id: i64, record: &ContactRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.rows.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if inner.email_taken(&record.fields.email, Some(id)) {
            return Err(StoreError::DuplicateEmail(record.fields.email.clone()));
        }

        let row = inner.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let fields = record.fields.clone();
        row.first_name = fields.first_name;
        row.last_name = fields.last_name;
        row.email = fields.email;
        row.birth_date = fields.birth_date;
        row.photo_ref.clone_from(&record.photo_ref);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use contacts_core::ContactFields;
    use contacts_store::testing::run_store_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryContactStore::new();
        run_store_conformance_tests(&store)
            .await
            .expect("store conformance tests should pass");
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let store = MemoryContactStore::new();
        let fields = ContactFields {
            first_name: "Ana".into(),
            last_name: "Lopez".into(),
            email: "ana@x.com".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        };
        let first = store
            .create(&ContactRecord::new(fields.clone(), None))
            .await
            .unwrap();
        store.delete(first).await.unwrap();
        let second = store
            .create(&ContactRecord::new(fields, None))
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.len(), 1);
    }
}
