use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use contacts_gateway::GatewayError;

/// Errors that can occur when running the contacts server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A gateway-level error surfaced through the API.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The request body could not be read as a contact form.
    #[error("{message}")]
    Form {
        /// Status reported by the multipart extractor (400 or 413).
        status: StatusCode,
        message: String,
    },

    /// A view failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Gateway(e) => gateway_status(e),
            Self::Form { status, .. } => *status,
            Self::Config(_) | Self::Io(_) | Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::DuplicateEmail(_) => StatusCode::CONFLICT,
        GatewayError::UploadFailure(_) | GatewayError::DeleteFailure(_) => StatusCode::BAD_GATEWAY,
        GatewayError::StoreUnavailable(_) | GatewayError::LockFailed(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        GatewayError::Configuration(_) | GatewayError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Form {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        Self::Form {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
