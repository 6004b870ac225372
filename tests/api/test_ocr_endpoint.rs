// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR endpoint tests
//!
//! Drive the router end to end with a stub recognizer:
//! - Upload page restricts file types
//! - HELLO WORLD page yields one line over JSON and HTML
//! - Blank pages yield empty text
//! - Unsupported types are rejected before decoding or model load
//! - Missing models surface as 503 without a text area
//! - Failing recognition surfaces as 500 without partial text

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use image::ImageFormat;
use lineocr_node::api::create_router;
use lineocr_node::config::ServerConfig;
use tower::ServiceExt; // for `oneshot`

use crate::common::{
    blank_page, encode, failing_recognizer_state, missing_model_state, multipart_file,
    multipart_text, png_bytes, stub_state, stub_state_with_config, text_line_page,
};

async fn post_multipart(app: Router, uri: &str, multipart: (String, Vec<u8>)) -> (StatusCode, String) {
    let (content_type, body) = multipart;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[cfg(test)]
mod ocr_endpoint_tests {
    use super::*;

    /// Test 1: Upload page offers only the accepted file types
    #[tokio::test]
    async fn test_index_page() {
        let (state, _) = stub_state("HELLO WORLD");
        let (status, body) = get(create_router(state), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"accept=".jpg,.jpeg,.png,.tif""#));
        assert!(body.contains(r#"enctype="multipart/form-data""#));
    }

    /// Test 2: HELLO WORLD over the JSON API
    #[tokio::test]
    async fn test_hello_world_json() {
        let (state, loader) = stub_state("HELLO WORLD");
        let app = create_router(state);

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        let (status, body) = post_multipart(app, "/v1/ocr", upload).await;

        assert_eq!(status, StatusCode::OK, "body: {}", body);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["text"], "HELLO WORLD");
        assert_eq!(json["lineCount"], 1);
        assert_eq!(json["lines"].as_array().unwrap().len(), 1);
        assert_eq!(json["imageWidth"], 400);
        assert_eq!(json["imageHeight"], 120);
        assert_eq!(json["model"], "default");
        assert_eq!(loader.loads(), 1);
    }

    /// Test 3: HELLO WORLD over the form shows preview, notice and text area
    #[tokio::test]
    async fn test_hello_world_page() {
        let (state, _) = stub_state("HELLO WORLD");
        let app = create_router(state);

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        let (status, body) = post_multipart(app, "/ocr", upload).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("data:image/png;base64,"));
        assert!(body.contains("Processing complete!"));
        assert!(body.contains("<textarea id=\"text\" name=\"text\">\nHELLO WORLD</textarea>"));
        assert!(body.contains("Download Text"));
    }

    /// Test 4: Blank page gives empty text, not an error
    #[tokio::test]
    async fn test_blank_page() {
        let (state, _) = stub_state("HELLO WORLD");
        let app = create_router(state);

        let upload = multipart_file("file", "blank.png", &png_bytes(&blank_page()));
        let (status, body) = post_multipart(app, "/v1/ocr", upload).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["text"], "");
        assert_eq!(json["lineCount"], 0);
    }

    /// Test 5: TIFF and JPEG uploads are accepted
    #[tokio::test]
    async fn test_tif_and_jpeg_uploads() {
        let (state, _) = stub_state("HELLO WORLD");

        for (name, format) in [("scan.tif", ImageFormat::Tiff), ("scan.JPEG", ImageFormat::Jpeg)] {
            let upload = multipart_file("file", name, &encode(&text_line_page(), format));
            let (status, body) = post_multipart(create_router(state.clone()), "/v1/ocr", upload).await;
            assert_eq!(status, StatusCode::OK, "{}: {}", name, body);
        }
    }

    /// Test 6: Unsupported extension is rejected before decode and model load
    #[tokio::test]
    async fn test_unsupported_extension() {
        let (state, loader) = stub_state("HELLO WORLD");

        for name in ["hello.gif", "hello.bmp", "hello.tiff", "hello"] {
            let upload = multipart_file("file", name, &png_bytes(&text_line_page()));
            let (status, body) = post_multipart(create_router(state.clone()), "/v1/ocr", upload).await;

            assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE, "{}", name);
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["error_type"], "unsupported_file_type");
            assert!(json["request_id"].is_string());
        }
        assert_eq!(loader.attempts(), 0);
    }

    /// Test 7: Bytes that are not an image fail to decode
    #[tokio::test]
    async fn test_undecodable_upload() {
        let (state, loader) = stub_state("HELLO WORLD");
        let mut bytes = png_bytes(&text_line_page());
        bytes.truncate(40);

        let upload = multipart_file("file", "broken.png", &bytes);
        let (status, body) = post_multipart(create_router(state), "/v1/ocr", upload).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error_type"], "decode_failed");
        assert_eq!(loader.attempts(), 0);
    }

    /// Test 8: Content that does not match an accepted format
    #[tokio::test]
    async fn test_mislabelled_upload() {
        let (state, _) = stub_state("HELLO WORLD");
        let upload = multipart_file("file", "notes.png", b"just some text, not an image");
        let (status, _) = post_multipart(create_router(state), "/v1/ocr", upload).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    /// Test 9: Missing model artifact gives 503 over JSON
    #[tokio::test]
    async fn test_missing_model_json() {
        let models_dir = tempfile::tempdir().unwrap();
        let app = create_router(missing_model_state(models_dir.path()));

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        let (status, body) = post_multipart(app, "/v1/ocr", upload).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error_type"], "model_load_failed");
        assert_eq!(json["details"]["model"], "absent");
        assert!(json.get("text").is_none());
    }

    /// Test 10: Missing model artifact gives an error page without a text area
    #[tokio::test]
    async fn test_missing_model_page() {
        let models_dir = tempfile::tempdir().unwrap();
        let app = create_router(missing_model_state(models_dir.path()));

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        let (status, body) = post_multipart(app, "/ocr", upload).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("model_load_failed"));
        assert!(!body.contains("<textarea"));
        assert!(!body.contains("Processing complete!"));
    }

    /// Test 11: No file selected
    #[tokio::test]
    async fn test_no_file() {
        let (state, loader) = stub_state("HELLO WORLD");

        // JSON API requires a file
        let (status, body) =
            post_multipart(create_router(state.clone()), "/v1/ocr", multipart_text("note", "hi")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error_type"], "invalid_request");

        // Form with an empty file control shows the upload page again
        let (status, body) =
            post_multipart(create_router(state), "/ocr", multipart_file("file", "", b"")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"accept=".jpg,.jpeg,.png,.tif""#));
        assert!(!body.contains("<textarea"));

        assert_eq!(loader.attempts(), 0);
    }

    /// Test 12: Upload and pixel limits
    #[tokio::test]
    async fn test_upload_limits() {
        let bytes = png_bytes(&text_line_page());

        let mut config = ServerConfig::default();
        config.limits.max_upload_bytes = bytes.len() - 1;
        let (state, _) = stub_state_with_config("HELLO WORLD", config);
        let upload = multipart_file("file", "hello.png", &bytes);
        let (status, body) = post_multipart(create_router(state), "/v1/ocr", upload).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body.contains("payload_too_large"));

        let mut config = ServerConfig::default();
        config.limits.max_pixels = 400 * 120 - 1;
        let (state, _) = stub_state_with_config("HELLO WORLD", config);
        let upload = multipart_file("file", "hello.png", &bytes);
        let (status, _) = post_multipart(create_router(state), "/v1/ocr", upload).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    /// Test 13: Health reports the model state
    #[tokio::test]
    async fn test_health() {
        let (state, _) = stub_state("HELLO WORLD");

        let (status, body) = get(create_router(state.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["modelLoaded"], false);
        assert_eq!(json["model"], "default");
        assert_eq!(json["version"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["version"]["features"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f == "json-api"));

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        post_multipart(create_router(state.clone()), "/v1/ocr", upload).await;

        let (_, body) = get(create_router(state), "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["modelLoaded"], true);
    }

    /// Test 14: Model is loaded once across requests
    #[tokio::test]
    async fn test_model_loaded_once_across_requests() {
        let (state, loader) = stub_state("HELLO WORLD");

        for _ in 0..3 {
            let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
            let (status, _) = post_multipart(create_router(state.clone()), "/v1/ocr", upload).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(loader.loads(), 1);
    }

    /// Test 15: A failing recognition stage yields no partial text
    #[tokio::test]
    async fn test_recognition_failure() {
        let state = failing_recognizer_state();

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        let (status, body) = post_multipart(create_router(state.clone()), "/ocr", upload).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("pipeline_failed"));
        assert!(!body.contains("<textarea"));
        assert!(!body.contains("Processing complete!"));

        let upload = multipart_file("file", "hello.png", &png_bytes(&text_line_page()));
        let (status, body) = post_multipart(create_router(state), "/v1/ocr", upload).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error_type"], "pipeline_failed");
        assert_eq!(json["details"]["stage"], "recognition");
        assert!(json.get("text").is_none());
    }
}
