pub mod error;
pub mod key;
pub mod memory;
pub mod store;
pub mod testing;

pub use error::BlobError;
pub use key::{DEFAULT_KEY_PREFIX, KeyGenerator, sanitize_file_name};
pub use memory::MemoryBlobStore;
pub use store::BlobStore;
