// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload handling for OCR requests

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use image::DynamicImage;
use serde::Deserialize;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::config::LimitsConfig;
use crate::vision::{decode_image_bytes, validate_extension, ImageInfo};

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// One uploaded image, extension already checked
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Decode into an in-memory image (blocking)
    pub fn decode(&self, limits: &LimitsConfig) -> Result<(DynamicImage, ImageInfo), ApiError> {
        Ok(decode_image_bytes(&self.bytes, limits)?)
    }
}

/// Form body of POST /download
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub text: String,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::InvalidRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// Read the `file` part of an upload form
///
/// Returns `Ok(None)` when no file was chosen. The extension and byte size
/// are checked here; decoding happens later.
pub async fn accept_upload(
    multipart: &mut Multipart,
    limits: &LimitsConfig,
) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if file_name.is_empty() && bytes.is_empty() {
            debug!("Upload form submitted without a file");
            return Ok(None);
        }

        let extension = validate_extension(&file_name)?;

        if bytes.len() > limits.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "{} is {} bytes (max: {} bytes)",
                file_name,
                bytes.len(),
                limits.max_upload_bytes
            )));
        }

        debug!(
            "Accepted {} upload '{}' ({} bytes)",
            extension,
            file_name,
            bytes.len()
        );
        return Ok(Some(UploadedFile { file_name, bytes }));
    }

    Ok(None)
}
