use contacts_blob::BlobError;
use thiserror::Error;

/// Classified failure of an S3 request.
#[derive(Debug, Error)]
pub enum AwsBlobError {
    /// The AWS SDK returned an error from the service.
    #[error("AWS service error: {0}")]
    ServiceError(String),

    /// The request was throttled by the AWS service.
    #[error("AWS request throttled")]
    Throttled,

    /// A network or connection error occurred communicating with AWS.
    #[error("AWS connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("AWS request timed out")]
    Timeout,

    /// Credentials were rejected or could not be resolved.
    #[error("AWS credential error: {0}")]
    Credentials(String),
}

impl AwsBlobError {
    /// Map to the blob-store contract for an upload.
    pub fn into_upload_failure(self) -> BlobError {
        BlobError::UploadFailure(self.to_string())
    }

    /// Map to the blob-store contract for a delete.
    pub fn into_delete_failure(self) -> BlobError {
        BlobError::DeleteFailure(self.to_string())
    }

    /// Map to the blob-store contract for a read-only lookup.
    pub fn into_unavailable(self) -> BlobError {
        BlobError::Unavailable(self.to_string())
    }
}

/// Classify an AWS SDK error string into the appropriate [`AwsBlobError`].
///
/// Inspects the message for common patterns (throttling, timeout, connection,
/// credentials) and falls back to a generic service error.
pub fn classify_sdk_error(error_str: &str) -> AwsBlobError {
    let lower = error_str.to_lowercase();
    if lower.contains("throttl") || lower.contains("slowdown") || lower.contains("too many") {
        AwsBlobError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        AwsBlobError::Timeout
    } else if lower.contains("accessdenied")
        || lower.contains("access denied")
        || lower.contains("invalidaccesskeyid")
        || lower.contains("signaturedoesnotmatch")
        || lower.contains("credential")
    {
        AwsBlobError::Credentials(error_str.to_owned())
    } else if lower.contains("connection")
        || lower.contains("connect")
        || lower.contains("dns")
        || lower.contains("network")
        || lower.contains("dispatch failure")
    {
        AwsBlobError::Connection(error_str.to_owned())
    } else {
        AwsBlobError::ServiceError(error_str.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_throttled() {
        let err = classify_sdk_error("SlowDown: Please reduce your request rate");
        assert!(matches!(err, AwsBlobError::Throttled));
    }

    #[test]
    fn classify_timeout() {
        let err = classify_sdk_error("Request timed out after 30s");
        assert!(matches!(err, AwsBlobError::Timeout));
    }

    #[test]
    fn classify_credentials() {
        let err = classify_sdk_error("AccessDenied: Access Denied");
        assert!(matches!(err, AwsBlobError::Credentials(_)));
        let err = classify_sdk_error("InvalidAccessKeyId: The key does not exist");
        assert!(matches!(err, AwsBlobError::Credentials(_)));
    }

    #[test]
    fn classify_connection() {
        let err = classify_sdk_error("dispatch failure: Connection refused: localhost:4566");
        assert!(matches!(err, AwsBlobError::Connection(_)));
    }

    #[test]
    fn classify_generic_service_error() {
        let err = classify_sdk_error("EntityTooLarge: Your proposed upload exceeds the maximum");
        assert!(matches!(err, AwsBlobError::ServiceError(_)));
    }

    #[test]
    fn blob_contract_mapping() {
        assert!(matches!(
            AwsBlobError::Throttled.into_upload_failure(),
            BlobError::UploadFailure(msg) if msg == "AWS request throttled"
        ));
        assert!(matches!(
            AwsBlobError::Timeout.into_delete_failure(),
            BlobError::DeleteFailure(msg) if msg == "AWS request timed out"
        ));
        assert!(matches!(
            AwsBlobError::Connection("refused".into()).into_unavailable(),
            BlobError::Unavailable(msg) if msg.contains("refused")
        ));
    }
}
