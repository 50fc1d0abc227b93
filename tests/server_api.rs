//! Integration tests for the HTTP endpoints.
//!
//! The router is driven in-process with a stub predictor that scores an image
//! by its mean pixel value, so white images come out `Normal` and black ones
//! `Cracked`.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use image::{Rgb, RgbImage};
use std::sync::Arc;
use tirescan::core::ServerConfig;
use tirescan::server::{AppState, router};
use tirescan::tirescan_core::core::{ClassifierResult, ScorePredictor, Tensor4D};
use tirescan::tirescan_core::processors::ImagePreprocessor;
use tirescan::tirescan_core::utils::encode_png;
use tirescan::TireClassifier;
use tower::ServiceExt;

const BOUNDARY: &str = "tirescan-test-boundary";

struct MeanScore;

impl ScorePredictor for MeanScore {
    fn predict(&self, input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
        Ok(input
            .outer_iter()
            .map(|img| img.mean().unwrap_or(0.0))
            .collect())
    }
}

fn loaded_app() -> Router {
    let classifier = TireClassifier::new(ImagePreprocessor::default(), Arc::new(MeanScore));
    router(AppState::new(classifier), &ServerConfig::default()).unwrap()
}

fn unloaded_app() -> Router {
    let classifier = TireClassifier::unloaded(ImagePreprocessor::default());
    router(AppState::new(classifier), &ServerConfig::default()).unwrap()
}

fn png(value: u8) -> Vec<u8> {
    encode_png(&RgbImage::from_pixel(40, 30, Rgb([value, value, value]))).unwrap()
}

/// A multipart part: field name, optional filename, content.
struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    data: Vec<u8>,
}

fn file(filename: &str, data: Vec<u8>) -> Part<'_> {
    Part {
        name: "image",
        filename: Some(filename),
        data,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn classify_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/classify")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = ServiceExt::<Request<Body>>::oneshot(app, request)
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// --- GET / ---

#[tokio::test]
async fn test_root_returns_usage_text() {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(unloaded_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "TiresOnHighways MobileNet API - Use /classify for predictions, /health for status"
    );
}

// --- GET /health ---

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model"], "MobileNet");
    assert_eq!(json["model_status"], "loaded");
    assert_eq!(json["message"], "TiresOnHighways MobileNet API is running!");
}

#[tokio::test]
async fn test_health_without_model_still_succeeds() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, json) = send_json(unloaded_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_status"], "not loaded");
}

// --- POST /classify ---

#[tokio::test]
async fn test_classify_preserves_upload_order() {
    let request = classify_request(&[
        file("white.png", png(255)),
        file("black.png", png(0)),
        file("white2.png", png(255)),
    ]);
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["class"], "Normal");
    assert_eq!(results[1]["class"], "Cracked");
    assert_eq!(results[2]["class"], "Normal");
    assert_eq!(results[0]["confidence"], 1.0);
    assert_eq!(results[1]["confidence"], 1.0);
}

#[tokio::test]
async fn test_classify_without_files() {
    let request = classify_request(&[Part {
        name: "note",
        filename: None,
        data: b"hello".to_vec(),
    }]);
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, serde_json::json!({"error": "No files uploaded"}));
}

#[tokio::test]
async fn test_classify_ignores_other_fields() {
    let request = classify_request(&[Part {
        name: "file",
        filename: Some("white.png"),
        data: png(255),
    }]);
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No files uploaded");
}

#[tokio::test]
async fn test_classify_non_multipart_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/classify")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No files uploaded");
}

#[tokio::test]
async fn test_classify_without_model() {
    let request = classify_request(&[file("white.png", png(255))]);
    let (status, json) = send_json(unloaded_app(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, serde_json::json!({"error": "MobileNet model not loaded"}));
}

#[tokio::test]
async fn test_model_check_precedes_empty_filename_check() {
    let request = classify_request(&[file("", png(255))]);
    let (status, json) = send_json(unloaded_app(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, serde_json::json!({"error": "MobileNet model not loaded"}));
}

#[tokio::test]
async fn test_classify_only_empty_filenames() {
    let request = classify_request(&[file("", png(255))]);
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, serde_json::json!({"error": "No valid images processed"}));
}

#[tokio::test]
async fn test_classify_skips_empty_filename() {
    let request = classify_request(&[file("", png(255)), file("black.png", png(0))]);
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["class"], "Cracked");
}

#[tokio::test]
async fn test_classify_bad_image_aborts_batch() {
    let request = classify_request(&[
        file("white.png", png(255)),
        file("broken.png", b"definitely not an image".to_vec()),
    ]);
    let (status, json) = send_json(loaded_app(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = json["error"].as_str().unwrap();
    assert!(message.starts_with("cannot identify image file"), "{message}");
}
