pub mod contact;
pub mod error;
pub mod photo;

pub use contact::{Contact, ContactDraft, ContactFields, ContactOrder, ContactRecord};
pub use error::ValidationError;
pub use photo::{DEFAULT_MAX_PHOTO_BYTES, PhotoPolicy, PhotoUpload};
