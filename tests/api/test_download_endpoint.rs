// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text download tests
//!
//! POST /download must hand back exactly the submitted text as
//! `ocr_output.txt`, including when it is empty.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use lineocr_node::api::create_router;
use tower::ServiceExt; // for `oneshot`

use crate::common::{blank_page, multipart_file, png_bytes, stub_state, text_line_page};

fn form_encode(text: &str) -> String {
    let mut encoded = String::from("text=");
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

async fn download(app: Router, form_body: String) -> (StatusCode, header::HeaderMap, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn ocr_text(app: Router, png: Vec<u8>) -> String {
    let (content_type, body) = multipart_file("file", "page.png", &png);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/ocr")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["text"].as_str().unwrap().to_string()
}

#[cfg(test)]
mod download_endpoint_tests {
    use super::*;

    /// Test 1: Text comes back as an attachment named ocr_output.txt
    #[tokio::test]
    async fn test_download_headers() {
        let (state, _) = stub_state("unused");
        let (status, headers, body) =
            download(create_router(state), form_encode("HELLO WORLD")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"ocr_output.txt\""
        );
        assert_eq!(body, "HELLO WORLD");
    }

    /// Test 2: Empty text downloads as an empty file
    #[tokio::test]
    async fn test_download_empty_text() {
        let (state, _) = stub_state("unused");

        let (status, _, body) = download(create_router(state.clone()), form_encode("")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");

        let (status, _, body) = download(create_router(state), String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
    }

    /// Test 3: Newlines and non-ASCII text are preserved
    #[tokio::test]
    async fn test_download_preserves_text() {
        let (state, _) = stub_state("unused");
        let text = "first line\nsecond: café & <tags>\n\nlast";

        let (_, _, body) = download(create_router(state), form_encode(text)).await;
        assert_eq!(body, text);
    }

    /// Test 4: Recognized text round-trips through the download unchanged
    #[tokio::test]
    async fn test_download_matches_extracted_text() {
        let (state, _) = stub_state("HELLO WORLD");

        let text = ocr_text(create_router(state.clone()), png_bytes(&text_line_page())).await;
        assert_eq!(text, "HELLO WORLD");

        let (_, _, body) = download(create_router(state), form_encode(&text)).await;
        assert_eq!(body, text);
    }

    /// Test 5: Blank page downloads as an empty file
    #[tokio::test]
    async fn test_blank_page_download() {
        let (state, _) = stub_state("HELLO WORLD");

        let text = ocr_text(create_router(state.clone()), png_bytes(&blank_page())).await;
        assert_eq!(text, "");

        let (status, headers, body) = download(create_router(state), form_encode(&text)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"ocr_output.txt\""
        );
        assert_eq!(body, "");
    }

    /// Test 6: Browser CRLF line breaks download as the extracted newlines
    #[tokio::test]
    async fn test_download_normalizes_crlf() {
        let (state, _) = stub_state("unused");

        let (status, _, body) =
            download(create_router(state.clone()), "text=HELLO%0D%0AWORLD".to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "HELLO\nWORLD");

        let (_, _, body) =
            download(create_router(state), form_encode("one\r\ntwo\r\n\r\nfour")).await;
        assert_eq!(body, "one\ntwo\n\nfour");
    }
}
