use thiserror::Error;

/// Input rejected before any store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("field '{0}' is required")]
    EmptyField(&'static str),

    /// A field exceeded its maximum length.
    #[error("field '{field}' exceeds {max} characters")]
    TooLong {
        /// Field name as it appears in the form.
        field: &'static str,
        /// Maximum allowed length in characters.
        max: usize,
    },

    /// The email address is not well formed.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// The birth date is not a `YYYY-MM-DD` date.
    #[error("invalid birth date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// The uploaded photo has no content.
    #[error("photo '{0}' is empty")]
    EmptyPhoto(String),

    /// The uploaded photo exceeds the size limit.
    #[error("photo too large: {size} bytes exceeds limit of {limit} bytes")]
    PhotoTooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed size.
        limit: u64,
    },

    /// The photo's content type or file extension is not an allowed image type.
    #[error("unsupported photo type '{0}' (allowed: jpeg, jpg, png, gif)")]
    UnsupportedPhotoType(String),
}
