use thiserror::Error;

/// Errors from metadata store and distributed lock operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("contact not found: {0}")]
    NotFound(i64),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl StoreError {
    /// Whether the failure is transient (pool, network or timeout) rather
    /// than a statement about the data.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}
