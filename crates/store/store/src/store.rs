use async_trait::async_trait;

use contacts_core::{Contact, ContactOrder, ContactRecord};

use crate::error::StoreError;

/// Typed CRUD over contact rows.
///
/// Implementations own email uniqueness and existence checks; they never
/// touch blob storage.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Insert a new row and return its generated id.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn create(&self, record: &ContactRecord) -> Result<i64, StoreError>;

    /// Fetch one row, or [`StoreError::NotFound`].
    async fn get(&self, id: i64) -> Result<Contact, StoreError>;

    /// All rows in the requested order.
    async fn list(&self, order: ContactOrder) -> Result<Vec<Contact>, StoreError>;

    /// Rows whose surname contains `pattern`, ignoring case, ordered by
    /// surname then name. An empty pattern matches every row. `%` and `_`
    /// are matched literally.
    async fn search_by_last_name(&self, pattern: &str) -> Result<Vec<Contact>, StoreError>;

    /// Overwrite every field of an existing row, including `photo_ref`.
    async fn update(&self, id: i64, record: &ContactRecord) -> Result<(), StoreError>;

    /// Remove a row, or [`StoreError::NotFound`].
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}
