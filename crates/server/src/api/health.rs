use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::schemas::{HealthResponse, LeakedBlobResponse, LeakedBlobsResponse, MetricsResponse};

/// `GET /health` -- returns service status together with a metrics snapshot.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    description = "Returns service status, the photo backend and a snapshot of flow metrics.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let gw = &state.gateway;
    let body = HealthResponse {
        status: "ok".into(),
        blob_store: gw.blob_store_name().to_owned(),
        in_flight_flows: gw.in_flight(),
        metrics: gw.metrics().snapshot().into(),
    };

    (StatusCode::OK, Json(body))
}

/// `GET /metrics` -- returns flow metrics as JSON.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    summary = "Flow metrics",
    description = "Returns current create/update/delete, compensation and leak counters.",
    responses(
        (status = 200, description = "Current metric counters", body = MetricsResponse)
    )
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body: MetricsResponse = state.gateway.metrics().snapshot().into();
    (StatusCode::OK, Json(body))
}

/// `GET /admin/leaked-blobs` -- photos that may have been orphaned.
#[utoipa::path(
    get,
    path = "/admin/leaked-blobs",
    tag = "Admin",
    summary = "Leaked photos",
    description = "Lists photos whose deletion failed or whose row write had an unknown outcome, oldest first. Entries are kept in memory only.",
    responses(
        (status = 200, description = "Recorded photos", body = LeakedBlobsResponse)
    )
)]
pub async fn leaked_blobs(State(state): State<AppState>) -> impl IntoResponse {
    let blobs: Vec<LeakedBlobResponse> = state
        .gateway
        .leaked_blobs()
        .into_iter()
        .map(LeakedBlobResponse::from)
        .collect();
    let total = blobs.len();
    (StatusCode::OK, Json(LeakedBlobsResponse { blobs, total }))
}
