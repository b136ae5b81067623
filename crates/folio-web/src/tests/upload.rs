use axum::{
    body::Body,
    http::{Request, StatusCode},
};

use folio_core::FolioConfig;

use crate::dto::UploadResponse;

use super::harness::{TestHarness, decode_json};

const BOUNDARY: &str = "folio-test-boundary";

fn multipart_request(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/_upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("multipart request")
}

#[tokio::test]
async fn upload_stores_file_under_images() {
    let harness = TestHarness::with_files(&[]).await;
    let response = harness
        .send(multipart_request("file", "cat.png", b"meow"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: UploadResponse = decode_json(response).await;
    assert_eq!(payload.path, "/images/cat.png");
    assert_eq!(
        std::fs::read(harness.root().join("images/cat.png")).expect("stored"),
        b"meow"
    );
}

#[tokio::test]
async fn upload_collision_keeps_both_files() {
    let harness = TestHarness::setup().await;
    let response = harness
        .send(multipart_request("file", "logo.png", b"second"))
        .await;
    let payload: UploadResponse = decode_json(response).await;
    assert_ne!(payload.path, "/images/logo.png");
    assert!(payload.path.starts_with("/images/logo-"));
    assert_eq!(
        std::fs::read(harness.root().join("images/logo.png")).expect("original"),
        b"PNGBYTES"
    );
}

#[tokio::test]
async fn upload_name_cannot_escape_images_dir() {
    let harness = TestHarness::with_files(&[]).await;
    let response = harness
        .send(multipart_request("file", "../../evil.md", b"x"))
        .await;
    let payload: UploadResponse = decode_json(response).await;
    assert_eq!(payload.path, "/images/evil.md");
    assert!(!harness.root().join("evil.md").exists());
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let harness = TestHarness::with_files(&[]).await;
    let response = harness
        .send(multipart_request("other", "cat.png", b"meow"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload: serde_json::Value = decode_json(response).await;
    assert_eq!(payload["code"], "VALIDATION_FAILED");
    assert_eq!(payload["operation"], "upload");
    assert!(payload["trace_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn upload_over_limit_is_rejected() {
    let config = FolioConfig {
        upload_limit_bytes: 64,
        ..FolioConfig::default()
    };
    let harness = TestHarness::with_config(&[], config).await;
    let response = harness
        .send(multipart_request("file", "big.png", &[7_u8; 4096]))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!harness.root().join("images/big.png").exists());
}
