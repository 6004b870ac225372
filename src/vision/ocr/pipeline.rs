// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Three-stage OCR pipeline: binarize, segment, recognize

use std::time::Instant;

use image::{imageops, DynamicImage};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::binarization::{nlbin, BinarizationConfig, BinarizationError, BinarizedImage};
use super::recognition::{RecognitionError, Recognizer};
use super::segmentation::{segment, LineBox, Segmentation, SegmentationConfig, SegmentationError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Binarization failed: {0}")]
    Binarization(#[from] BinarizationError),

    #[error("Segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("Recognition failed on line {line}: {source}")]
    Recognition {
        line: usize,
        #[source]
        source: RecognitionError,
    },
}

impl PipelineError {
    /// Name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Binarization(_) => "binarization",
            PipelineError::Segmentation(_) => "segmentation",
            PipelineError::Recognition { .. } => "recognition",
        }
    }
}

/// Text recognized on one segmented line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionRecord {
    pub text: String,
    pub confidence: f32,
    pub char_confidences: Vec<f32>,
    pub bounding_box: LineBox,
}

/// Runs binarization, segmentation and recognition in order
#[derive(Debug, Clone, Default)]
pub struct OcrPipeline {
    binarization: BinarizationConfig,
    segmentation: SegmentationConfig,
}

impl OcrPipeline {
    pub fn new(binarization: BinarizationConfig, segmentation: SegmentationConfig) -> Self {
        Self {
            binarization,
            segmentation,
        }
    }

    pub fn binarize(&self, image: &DynamicImage) -> Result<BinarizedImage, PipelineError> {
        Ok(nlbin(image, &self.binarization)?)
    }

    pub fn segment(&self, binary: &BinarizedImage) -> Result<Segmentation, PipelineError> {
        Ok(segment(binary, &self.segmentation)?)
    }

    /// Recognize every segmented line, one record per line
    pub fn recognize(
        &self,
        binary: &BinarizedImage,
        segmentation: &Segmentation,
        model: &dyn Recognizer,
    ) -> Result<Vec<RecognitionRecord>, PipelineError> {
        let mut records = Vec::with_capacity(segmentation.lines.len());

        for (index, line) in segmentation.lines.iter().enumerate() {
            let crop = imageops::crop_imm(binary, line.x, line.y, line.width, line.height).to_image();

            let recognized = model
                .recognize_line(&crop)
                .map_err(|source| PipelineError::Recognition { line: index, source })?;

            debug!(
                "Line {} at ({}, {}) {}x{}: '{}' ({:.2})",
                index, line.x, line.y, line.width, line.height, recognized.text, recognized.confidence
            );

            records.push(RecognitionRecord {
                text: recognized.text,
                confidence: recognized.confidence,
                char_confidences: recognized.char_confidences,
                bounding_box: *line,
            });
        }

        Ok(records)
    }

    /// Run all three stages on a decoded image
    ///
    /// Any stage failure aborts with no partial records. A page with no
    /// text lines yields an empty vector.
    pub fn run(
        &self,
        image: &DynamicImage,
        model: &dyn Recognizer,
    ) -> Result<Vec<RecognitionRecord>, PipelineError> {
        let start = Instant::now();

        // 1. Binarize
        let binary = self.binarize(image)?;
        let binarize_ms = start.elapsed().as_millis();

        // 2. Segment
        let segmentation = self.segment(&binary)?;
        let segment_ms = start.elapsed().as_millis() - binarize_ms;

        if segmentation.is_empty() {
            info!(
                "No text lines found in {}x{} image ({}ms)",
                image.width(),
                image.height(),
                start.elapsed().as_millis()
            );
            return Ok(Vec::new());
        }

        // 3. Recognize
        let records = self.recognize(&binary, &segmentation, model)?;

        info!(
            "OCR pipeline: {} lines with '{}' (binarize {}ms, segment {}ms, total {}ms)",
            records.len(),
            model.name(),
            binarize_ms,
            segment_ms,
            start.elapsed().as_millis()
        );

        Ok(records)
    }
}
