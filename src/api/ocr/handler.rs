// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handlers

use std::time::Instant;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::presenter::{
    download_response, extract_text, normalize_newlines, render_index_page, render_result_page,
    HtmlError, ResultView,
};
use super::request::{accept_upload, DownloadForm, UploadedFile};
use super::response::OcrResponse;
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::vision::encode_preview_data_uri;
use crate::vision::ocr::RecognitionRecord;

/// Outcome of one upload run through the pipeline
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    pub file_name: String,
    pub image_width: u32,
    pub image_height: u32,
    pub records: Vec<RecognitionRecord>,
    pub model: String,
    /// PNG data URI of the uploaded image, when requested
    pub preview: Option<String>,
    pub processing_time_ms: u64,
}

fn worker_failed(err: tokio::task::JoinError) -> ApiError {
    ApiError::PipelineFailed {
        stage: "worker".to_string(),
        message: err.to_string(),
    }
}

/// Decode an accepted upload and run the OCR pipeline on it
///
/// Decoding and the pipeline run on the blocking pool.
pub async fn process_upload(
    state: &AppState,
    upload: UploadedFile,
    with_preview: bool,
) -> Result<ProcessedUpload, ApiError> {
    let start = Instant::now();

    // 1. Decode image
    let limits = state.config.limits.clone();
    let file_name = upload.file_name.clone();
    let (image, image_info) = tokio::task::spawn_blocking(move || upload.decode(&limits))
        .await
        .map_err(worker_failed)??;

    debug!(
        "Decoded '{}': {}x{} {:?}, {} bytes",
        file_name, image_info.width, image_info.height, image_info.format, image_info.size_bytes
    );

    // 2. Get model (loaded once per process)
    let model = state.model_provider.get_model().await?;

    // 3. Run pipeline
    let pipeline = state.pipeline.clone();
    let preview_max_side = state.config.server.preview_max_side;
    let model_name = model.name().to_string();
    let (records, preview) = tokio::task::spawn_blocking(move || {
        let records = pipeline.run(&image, model.as_ref())?;
        let preview = if with_preview {
            Some(encode_preview_data_uri(&image, preview_max_side)?)
        } else {
            None
        };
        Ok::<(Vec<RecognitionRecord>, Option<String>), ApiError>((records, preview))
    })
    .await
    .map_err(worker_failed)??;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    info!(
        "OCR complete for '{}': {} lines, {}ms",
        file_name,
        records.len(),
        processing_time_ms
    );

    Ok(ProcessedUpload {
        file_name,
        image_width: image_info.width,
        image_height: image_info.height,
        records,
        model: model_name,
        preview,
        processing_time_ms,
    })
}

async fn process_required_upload(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<ProcessedUpload, ApiError> {
    let upload = accept_upload(multipart, &state.config.limits)
        .await?
        .ok_or_else(|| ApiError::InvalidRequest("No file uploaded".to_string()))?;
    process_upload(state, upload, false).await
}

/// POST /v1/ocr - Extract text from an uploaded image
///
/// # Request
/// Multipart form with a `file` part (.jpg, .jpeg, .png or .tif).
///
/// # Response
/// - `text`: Lines joined with newlines
/// - `lines`: Per-line text, confidence and bounding box
/// - `lineCount`, `imageWidth`, `imageHeight`, `processingTimeMs`, `model`
///
/// # Errors
/// - 400 Bad Request: no file, malformed form, undecodable image
/// - 413 Payload Too Large: upload or pixel limit exceeded
/// - 415 Unsupported Media Type: extension or format not accepted
/// - 503 Service Unavailable: recognition model failed to load
/// - 500 Internal Server Error: a pipeline stage failed
pub async fn ocr_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    debug!("OCR request {} received", request_id);

    match process_required_upload(&state, &mut multipart).await {
        Ok(processed) => Ok(Json(OcrResponse::new(
            processed.records,
            processed.image_width,
            processed.image_height,
            processed.processing_time_ms,
            &processed.model,
        ))),
        Err(e) => {
            warn!("OCR request {} failed: {}", request_id, e);
            Err(e.with_request_id(request_id))
        }
    }
}

/// POST /ocr - Form upload returning the HTML result page
///
/// Submitting the form without a file shows the upload page again.
pub async fn ocr_page_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, HtmlError> {
    let upload = match accept_upload(&mut multipart, &state.config.limits).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return Ok(render_index_page().into_response()),
        Err(e) => {
            warn!("Upload rejected: {}", e);
            return Err(e.into());
        }
    };

    let processed = process_upload(&state, upload, true).await.map_err(|e| {
        warn!("OCR failed: {}", e);
        HtmlError(e)
    })?;

    let text = extract_text(&processed.records);
    let preview = processed.preview.unwrap_or_default();
    let page: Html<String> = render_result_page(&ResultView {
        file_name: &processed.file_name,
        preview_data_uri: &preview,
        text: &text,
        line_count: processed.records.len(),
        processing_time_ms: processed.processing_time_ms,
    });

    Ok(page.into_response())
}

/// POST /download - Return the submitted text as `ocr_output.txt`
pub async fn download_handler(Form(form): Form<DownloadForm>) -> Response {
    debug!("Download of {} bytes", form.text.len());
    download_response(normalize_newlines(&form.text))
}
