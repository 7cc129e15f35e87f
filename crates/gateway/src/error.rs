use contacts_blob::BlobError;
use contacts_core::ValidationError;
use contacts_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the contact flows.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Field or photo input was rejected before any store call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No contact with this id.
    #[error("contact not found: {0}")]
    NotFound(i64),

    /// Another contact already uses this email.
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    /// The photo could not be stored.
    #[error("photo upload failed: {0}")]
    UploadFailure(String),

    /// A photo could not be removed.
    #[error("photo delete failed: {0}")]
    DeleteFailure(String),

    /// The metadata store could not be reached or timed out.
    #[error("metadata store unavailable: {0}")]
    StoreUnavailable(String),

    /// Failed to acquire the per-contact lock in time.
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),

    /// The gateway was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected backend failure or a flow task that panicked.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UploadFailure(_) | Self::StoreUnavailable(_) | Self::LockFailed(_)
        )
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            StoreError::Connection(_) | StoreError::Timeout(_) => {
                Self::StoreUnavailable(err.to_string())
            }
            StoreError::Backend(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<BlobError> for GatewayError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::UploadFailure(msg) => Self::UploadFailure(msg),
            BlobError::DeleteFailure(msg) => Self::DeleteFailure(msg),
            BlobError::InvalidLocator(_) => Self::DeleteFailure(err.to_string()),
            BlobError::Unavailable(_) => Self::Internal(err.to_string()),
        }
    }
}
