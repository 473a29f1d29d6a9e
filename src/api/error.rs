//! API error handling.
//!
//! Every failure of a convert request ends up here. Clients only ever see
//! one of three fixed messages; the full error chain goes to the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::converter::ConvertError;
use crate::task::TaskError;
use crate::upload::UploadError;

pub const INVALID_UPLOAD_MESSAGE: &str = "Missing or invalid FBX file.";
pub const TOO_LARGE_MESSAGE: &str = "Uploaded file is too large.";
pub const INTERNAL_MESSAGE: &str = "Sorry, something went wrong.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Upload rejected: {0}")]
    TooLarge(String),

    #[error(transparent)]
    Workspace(#[from] TaskError),

    #[error("Failed to store upload: {0}")]
    Storage(#[source] UploadError),

    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("Failed to remove upload {path}: {source}")]
    Cleanup {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Workspace(_) | Self::Storage(_) | Self::Convert(_) | Self::Cleanup { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn client_message(&self) -> &'static str {
        match self {
            Self::InvalidUpload(_) => INVALID_UPLOAD_MESSAGE,
            Self::TooLarge(_) => TOO_LARGE_MESSAGE,
            _ => INTERNAL_MESSAGE,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidFilename(_) | UploadError::Stream(_) => {
                ApiError::InvalidUpload(err.to_string())
            }
            UploadError::TooLarge { .. } => ApiError::TooLarge(err.to_string()),
            UploadError::Io { .. } => ApiError::Storage(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Convert request failed: {}", error_chain(&self));
        } else {
            tracing::warn!("Convert request rejected: {}", self);
        }

        let body = Json(json!({
            "ok": false,
            "error": self.client_message(),
        }));
        (status, body).into_response()
    }
}

/// Render an error and all of its sources on one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !out.contains(&cause_text) {
            out.push_str(": ");
            out.push_str(&cause_text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_upload_response() {
        let response = ApiError::InvalidUpload("no file".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "ok": false, "error": "Missing or invalid FBX file." })
        );
    }

    #[tokio::test]
    async fn test_conversion_failure_hides_details() {
        let response = ApiError::from(ConvertError::ExitCode(1)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({ "ok": false, "error": "Sorry, something went wrong." })
        );
        assert!(!body.to_string().contains("code"));
    }

    #[test]
    fn test_upload_error_mapping() {
        let invalid = ApiError::from(UploadError::InvalidFilename("../evil.fbx".into()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let too_large = ApiError::from(UploadError::TooLarge { limit: 10 });
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.client_message(), TOO_LARGE_MESSAGE);

        let io = ApiError::from(UploadError::Io {
            path: "data/tasks/task-1/a.fbx".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        });
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.client_message(), INTERNAL_MESSAGE);
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = ApiError::Cleanup {
            path: "data/tasks/task-1/a.fbx".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let rendered = error_chain(&err);
        assert!(rendered.contains("data/tasks/task-1/a.fbx"));
        assert!(rendered.contains("denied"));
    }
}
