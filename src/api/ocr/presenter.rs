// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTML pages and the text download

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::api::errors::ApiError;
use crate::vision::ocr::RecognitionRecord;
use crate::vision::SUPPORTED_EXTENSIONS;

/// File name offered for the extracted text
pub const DOWNLOAD_FILE_NAME: &str = "ocr_output.txt";

const PAGE_TITLE: &str = "OCR Text Extraction";

/// Join record texts in order, one per line
pub fn extract_text(records: &[RecognitionRecord]) -> String {
    records
        .iter()
        .map(|record| record.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn accept_attribute() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",")
}

fn layout(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }}
.notice {{ padding: .75rem 1rem; border-radius: 4px; margin: 1rem 0; }}
.success {{ background: #e6f4ea; color: #1e4620; }}
.error {{ background: #fdecea; color: #611a15; }}
#progress {{ display: none; }}
img.preview {{ max-width: 100%; border: 1px solid #ccc; }}
textarea {{ width: 100%; height: 300px; font-family: monospace; }}
</style>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = PAGE_TITLE,
        body = body
    )
}

fn upload_form() -> String {
    format!(
        r#"<form action="/ocr" method="post" enctype="multipart/form-data" onsubmit="document.getElementById('progress').style.display='block'">
<label for="file">Upload an image</label>
<input type="file" id="file" name="file" accept="{accept}">
<button type="submit">Extract Text</button>
</form>
<p id="progress">Processing image...</p>"#,
        accept = accept_attribute()
    )
}

/// GET / page
pub fn render_index_page() -> Html<String> {
    Html(layout(&upload_form()))
}

/// Everything the result page shows
#[derive(Debug, Clone)]
pub struct ResultView<'a> {
    pub file_name: &'a str,
    pub preview_data_uri: &'a str,
    pub text: &'a str,
    pub line_count: usize,
    pub processing_time_ms: u64,
}

/// Result page: preview, notice, editable text and the download form
pub fn render_result_page(view: &ResultView<'_>) -> Html<String> {
    let body = format!(
        r#"<img class="preview" src="{preview}" alt="Uploaded Image: {file_name}">
<p class="caption">Uploaded Image</p>
<div class="notice success">Processing complete! {line_count} line(s) in {elapsed}ms.</div>
<form action="/download" method="post">
<label for="text">Extracted Text</label>
<textarea id="text" name="text">
{text}</textarea>
<button type="submit">Download Text</button>
</form>
<hr>
{upload}"#,
        preview = view.preview_data_uri,
        file_name = escape_html(view.file_name),
        line_count = view.line_count,
        elapsed = view.processing_time_ms,
        text = escape_html(view.text),
        upload = upload_form()
    );
    Html(layout(&body))
}

/// Error page; never carries a text area
pub fn render_error_page(error: &ApiError) -> Html<String> {
    let body = format!(
        r#"<div class="notice error"><strong>{error_type}</strong>: {message}</div>
{upload}"#,
        error_type = error.error_type(),
        message = escape_html(&error.to_string()),
        upload = upload_form()
    );
    Html(layout(&body))
}

/// [`ApiError`] rendered as an HTML page with the matching status
#[derive(Debug)]
pub struct HtmlError(pub ApiError);

impl From<ApiError> for HtmlError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        (self.0.status(), render_error_page(&self.0)).into_response()
    }
}

/// Undo the CRLF line breaks browsers apply to submitted text areas
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Serve `text` as the `ocr_output.txt` attachment
pub fn download_response(text: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
            ),
        ],
        text,
    )
        .into_response()
}
