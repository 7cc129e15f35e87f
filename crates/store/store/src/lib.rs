pub mod error;
pub mod lock;
pub mod store;
pub mod testing;

pub use error::StoreError;
pub use lock::{DistributedLock, LockGuard};
pub use store::ContactStore;
