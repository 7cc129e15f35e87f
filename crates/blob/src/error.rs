use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    /// The object could not be written. Nothing was stored.
    #[error("blob upload failed: {0}")]
    UploadFailure(String),

    /// The object exists (or may exist) but could not be removed.
    #[error("blob delete failed: {0}")]
    DeleteFailure(String),

    /// The store could not answer a read such as an existence check.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    /// The locator does not point into this store.
    #[error("locator not managed by this blob store: {0}")]
    InvalidLocator(String),
}

impl BlobError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidLocator(_))
    }
}
