use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use contacts_core::Contact;
use contacts_gateway::{LeakedBlob, MetricsSnapshot};

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status indicator.
    #[schema(example = "ok")]
    pub status: String,
    /// Name of the configured photo store backend.
    #[schema(example = "s3")]
    pub blob_store: String,
    /// Contact flows currently running.
    #[schema(example = 0)]
    pub in_flight_flows: usize,
    /// Current flow counters.
    pub metrics: MetricsResponse,
}

/// Contact flow counters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    /// Contacts created.
    #[schema(example = 42)]
    pub created: u64,
    /// Contacts updated.
    #[schema(example = 17)]
    pub updated: u64,
    /// Contacts deleted.
    #[schema(example = 3)]
    pub deleted: u64,
    /// Requests rejected by input validation.
    #[schema(example = 2)]
    pub validation_rejected: u64,
    /// Photo uploads that failed or timed out.
    #[schema(example = 0)]
    pub upload_failures: u64,
    /// Uploaded photos deleted because the row write failed.
    #[schema(example = 1)]
    pub compensations: u64,
    /// Compensating deletes that failed.
    #[schema(example = 0)]
    pub compensation_failures: u64,
    /// Previous photos removed after an update.
    #[schema(example = 5)]
    pub blobs_replaced: u64,
    /// Photos removed after a delete.
    #[schema(example = 2)]
    pub blobs_removed: u64,
    /// Photos that may have been orphaned.
    #[schema(example = 0)]
    pub leaked_blobs: u64,
    /// Per-contact locks not acquired in time.
    #[schema(example = 0)]
    pub lock_failures: u64,
}

impl From<MetricsSnapshot> for MetricsResponse {
    fn from(snap: MetricsSnapshot) -> Self {
        Self {
            created: snap.created,
            updated: snap.updated,
            deleted: snap.deleted,
            validation_rejected: snap.validation_rejected,
            upload_failures: snap.upload_failures,
            compensations: snap.compensations,
            compensation_failures: snap.compensation_failures,
            blobs_replaced: snap.blobs_replaced,
            blobs_removed: snap.blobs_removed,
            leaked_blobs: snap.leaked_blobs,
            lock_failures: snap.lock_failures,
        }
    }
}

/// Contacts returned by the JSON listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContactListResponse {
    pub contacts: Vec<Contact>,
    #[schema(example = 2)]
    pub total: usize,
}

/// A photo that may have been left behind in the blob store.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeakedBlobResponse {
    #[schema(example = "https://fotos.s3.us-east-1.amazonaws.com/contactos/1718900000000_ana.png")]
    pub locator: String,
    /// Flow that left the photo behind: `create`, `update` or `delete`.
    #[schema(example = "update")]
    pub flow: String,
    #[schema(example = 12)]
    pub contact_id: Option<i64>,
    #[schema(example = "photo delete failed: timeout")]
    pub error: String,
    #[schema(example = "2024-06-20T16:53:20Z")]
    pub recorded_at: String,
}

impl From<LeakedBlob> for LeakedBlobResponse {
    fn from(leak: LeakedBlob) -> Self {
        Self {
            locator: leak.locator,
            flow: leak.flow.to_string(),
            contact_id: leak.contact_id,
            error: leak.error,
            recorded_at: leak.recorded_at.to_rfc3339(),
        }
    }
}

/// Response for the leaked blob listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeakedBlobsResponse {
    pub blobs: Vec<LeakedBlobResponse>,
    #[schema(example = 0)]
    pub total: usize,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    #[schema(example = "contact not found: 12")]
    pub error: String,
}
