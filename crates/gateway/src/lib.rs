//! Orchestration of contact mutations across the metadata store and the
//! photo blob store.
//!
//! The two stores share no transaction, so every flow orders its calls so
//! that a failure can only leave an orphaned blob, never a row pointing at a
//! missing one:
//!
//! - **create** uploads first, inserts second, and deletes the upload if the
//!   insert fails;
//! - **update** uploads the new photo before touching anything else and
//!   deletes the old photo only after the row is committed;
//! - **delete** removes the row first and the photo second.
//!
//! Blobs that could not be cleaned up are logged, counted in
//! [`GatewayMetrics`] and kept in a bounded [`LeakLedger`].

pub mod builder;
pub mod config;
pub mod error;
pub mod gateway;
pub mod leaks;
pub mod metrics;

pub use builder::GatewayBuilder;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use leaks::{Flow, LeakLedger, LeakedBlob};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
