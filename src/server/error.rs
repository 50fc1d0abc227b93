//! Errors returned by the HTTP handlers.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tirescan_core::core::ClassifierError;

/// Handler failure, rendered as `{"error": "<message>"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request carried no `image` files.
    #[error("No files uploaded")]
    NoFilesUploaded,

    /// Every uploaded file had an empty filename.
    #[error("No valid images processed")]
    NoValidImages,

    /// The multipart body could not be read.
    #[error("{0}")]
    Multipart(#[from] MultipartError),

    /// Classification failed, including the model-not-loaded case.
    #[error("{0}")]
    Classifier(#[from] ClassifierError),

    /// The blocking inference task did not complete.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFilesUploaded | ApiError::NoValidImages => StatusCode::BAD_REQUEST,
            ApiError::Multipart(_) | ApiError::Classifier(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NoFilesUploaded.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NoValidImages.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(ClassifierError::ModelNotLoaded).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_are_passed_through() {
        assert_eq!(ApiError::NoFilesUploaded.to_string(), "No files uploaded");
        assert_eq!(
            ApiError::from(ClassifierError::ModelNotLoaded).to_string(),
            "MobileNet model not loaded"
        );
    }
}
