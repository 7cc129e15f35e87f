use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;

/// Pluggable blob storage backend for contact photos.
///
/// Implementors generate the object key themselves (see
/// [`KeyGenerator`](crate::KeyGenerator)) and hand back a locator string that
/// is stored verbatim in the contact row.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name used in logs (e.g. `"s3"`, `"memory"`).
    fn name(&self) -> &str;

    /// Store `data` and return its locator.
    ///
    /// Either a complete, retrievable object exists afterwards or none does.
    async fn put(
        &self,
        data: Bytes,
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError>;

    /// Remove the object behind `locator`.
    ///
    /// Deleting an object that does not exist succeeds.
    async fn delete(&self, locator: &str) -> Result<(), BlobError>;

    /// Whether an object currently exists behind `locator`.
    async fn exists(&self, locator: &str) -> Result<bool, BlobError>;
}
