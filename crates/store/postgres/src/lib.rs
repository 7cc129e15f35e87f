pub mod config;
pub mod lock;
pub mod migrations;
pub mod store;

pub use config::PostgresConfig;
pub use lock::{PostgresDistributedLock, PostgresLockGuard};
pub use migrations::run_migrations;
pub use store::PostgresContactStore;
