// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::Serialize;

use crate::vision::ocr::RecognitionRecord;

use super::presenter::extract_text;

/// Response from OCR processing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    /// Full extracted text, one line per record
    pub text: String,
    /// Average line confidence (0.0-1.0), 0 when no lines were found
    pub confidence: f32,
    /// Recognized lines in reading order
    pub lines: Vec<RecognitionRecord>,
    pub line_count: usize,
    pub image_width: u32,
    pub image_height: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Model used for recognition
    pub model: String,
}

impl OcrResponse {
    pub fn new(
        lines: Vec<RecognitionRecord>,
        image_width: u32,
        image_height: u32,
        processing_time_ms: u64,
        model: &str,
    ) -> Self {
        let confidence = if lines.is_empty() {
            0.0
        } else {
            lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len() as f32
        };

        Self {
            text: extract_text(&lines),
            confidence,
            line_count: lines.len(),
            lines,
            image_width,
            image_height,
            processing_time_ms,
            model: model.to_string(),
        }
    }
}

/// Response from GET /health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model: String,
    /// Version, build tag and feature list
    pub version: serde_json::Value,
}
