// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload decoding and preview encoding

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;

use crate::config::LimitsConfig;

/// File extensions accepted by the upload form
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "tif"];

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Image has too many pixels: {width}x{height} (max: {max} pixels)")]
    TooManyPixels { width: u32, height: u32, max: u64 },

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Unsupported file type '{0}' (accepted: jpg, jpeg, png, tif)")]
    UnsupportedExtension(String),

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Failed to encode preview: {0}")]
    EncodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Check an uploaded file name against [`SUPPORTED_EXTENSIONS`]
///
/// Matching ignores case. Returns the lowercased extension.
pub fn validate_extension(file_name: &str) -> Result<String, ImageError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ImageError::UnsupportedExtension(file_name.to_string()))
    }
}

/// Decode raw image bytes (for multipart uploads)
///
/// Checks, in order: byte size, magic bytes, declared dimensions, decoding.
/// The pixel cap is enforced from the header so oversized pages are never
/// decoded.
///
/// # Returns
/// * `Ok((DynamicImage, ImageInfo))` - The decoded image and metadata
/// * `Err(ImageError)` - If any check fails
pub fn decode_image_bytes(
    bytes: &[u8],
    limits: &LimitsConfig,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.len() > limits.max_upload_bytes {
        return Err(ImageError::TooLarge(bytes.len(), limits.max_upload_bytes));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(ImageError::DecodeFailed(format!(
            "image has zero size ({}x{})",
            width, height
        )));
    }
    if width as u64 * height as u64 > limits.max_pixels {
        return Err(ImageError::TooManyPixels {
            width,
            height,
            max: limits.max_pixels,
        });
    }

    let img = ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;
    let (width, height) = (img.width(), img.height());

    let info = ImageInfo {
        width,
        height,
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
///
/// Only the formats the upload form accepts are recognized.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Encode an image as a `data:image/png;base64,...` URI for display
///
/// Images larger than `max_side` on either axis are downscaled first.
pub fn encode_preview_data_uri(image: &DynamicImage, max_side: u32) -> Result<String, ImageError> {
    let preview = if image.width() > max_side || image.height() > max_side {
        image.thumbnail(max_side, max_side)
    } else {
        image.clone()
    };

    let mut buffer = Cursor::new(Vec::new());
    preview
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;

    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(buffer.into_inner())
    ))
}
