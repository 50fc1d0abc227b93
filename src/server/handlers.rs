//! Route handlers.

use super::{AppState, ApiError};
use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use serde::Serialize;
use tirescan_core::core::MODEL_DISPLAY_NAME;
use tirescan_core::domain::Classification;
use tracing::{debug, error};

/// Multipart field that carries the images.
pub const IMAGE_FIELD: &str = "image";

/// Plain-text body of `GET /`.
pub const USAGE_TEXT: &str =
    "TiresOnHighways MobileNet API - Use /classify for predictions, /health for status";

/// Message reported by `GET /health`.
pub const HEALTH_MESSAGE: &str = "TiresOnHighways MobileNet API is running!";

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: &'static str,
    pub model_status: &'static str,
    pub message: &'static str,
}

/// An uploaded file.
struct Upload {
    filename: String,
    bytes: Bytes,
}

/// `POST /classify`
///
/// Classifies every file uploaded under the `image` field and returns the
/// results in upload order. Files with an empty filename are skipped; any
/// other failure abandons the whole batch.
pub async fn classify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<Classification>>, ApiError> {
    classify_uploads(state, multipart).await.map_err(|e| {
        if e.status().is_server_error() {
            error!(error = %e, "classification request failed");
        }
        e
    })
}

async fn classify_uploads(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<Classification>>, ApiError> {
    let Ok(multipart) = multipart else {
        return Err(ApiError::NoFilesUploaded);
    };
    let uploads = read_uploads(multipart).await?;
    if uploads.is_empty() {
        return Err(ApiError::NoFilesUploaded);
    }

    let classifier = state.classifier();
    if !classifier.is_loaded() {
        return Err(tirescan_core::core::ClassifierError::ModelNotLoaded.into());
    }

    let images: Vec<Bytes> = uploads
        .into_iter()
        .filter(|upload| !upload.filename.is_empty())
        .map(|upload| upload.bytes)
        .collect();
    if images.is_empty() {
        return Err(ApiError::NoValidImages);
    }

    debug!(count = images.len(), "classifying uploaded images");
    let results = tokio::task::spawn_blocking(move || classifier.classify_all(&images))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(results))
}

/// Collects the files sent under [`IMAGE_FIELD`]. A part is a file when it
/// has a `filename` parameter, even an empty one.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, ApiError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        uploads.push(Upload { filename, bytes });
    }
    Ok(uploads)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_status = if state.classifier().is_loaded() {
        "loaded"
    } else {
        "not loaded"
    };
    Json(HealthResponse {
        status: "healthy",
        model: MODEL_DISPLAY_NAME,
        model_status,
        message: HEALTH_MESSAGE,
    })
}

/// `GET /`
pub async fn root() -> &'static str {
    USAGE_TEXT
}
