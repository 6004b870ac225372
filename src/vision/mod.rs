// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based line OCR
//!
//! This module provides:
//! - Upload decoding and preview encoding
//! - The cached recognition model provider
//! - The OCR pipeline

pub mod image_utils;
pub mod model_provider;
pub mod ocr;

pub use image_utils::{
    decode_image_bytes, detect_format, encode_preview_data_uri, validate_extension, ImageError,
    ImageInfo, SUPPORTED_EXTENSIONS,
};
pub use model_provider::{ModelConfig, ModelLoadError, ModelLoader, ModelProvider, OnnxModelLoader};
