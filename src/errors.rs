use crate::services::DriveError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<DriveError> for AppError {
    fn from(err: DriveError) -> Self {
        let status = match &err {
            DriveError::NotFound
            | DriveError::ParentNotFound
            | DriveError::FolderNotFound
            | DriveError::FileNotFound => StatusCode::NOT_FOUND,
            DriveError::DuplicateName(_) => StatusCode::CONFLICT,
            DriveError::InvalidName(_)
            | DriveError::InvalidMime(_)
            | DriveError::InvalidChecksum(_)
            | DriveError::InvalidSize
            | DriveError::InvalidSearchTerm
            | DriveError::InvalidPartNumber
            | DriveError::NoPartsSupplied => StatusCode::BAD_REQUEST,
            DriveError::SizeLimitExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DriveError::BucketNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            DriveError::UploadInitFailed(_)
            | DriveError::UploadFinalizeFailed(_)
            | DriveError::ObjectDeleteFailed(_)
            | DriveError::DownloadSignFailed(_) => StatusCode::BAD_GATEWAY,
            DriveError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        // database details stay in the log
        let message = match &err {
            DriveError::Sqlx(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        AppError::new(status, message)
    }
}
