// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line OCR for uploaded page images
//!
//! This module provides CPU-based OCR in three stages.
//!
//! Components:
//! - `binarization` - Background-normalizing page binarizer
//! - `segmentation` - Connected-component line segmenter
//! - `recognition` - CTC line recognition via ONNX Runtime
//! - `preprocessing` - Line image preprocessing for the recognizer
//! - `pipeline` - The three stages run in order

pub mod binarization;
pub mod pipeline;
pub mod preprocessing;
pub mod recognition;
pub mod segmentation;

pub use binarization::{nlbin, BinarizationConfig, BinarizationError, BinarizedImage};
pub use pipeline::{OcrPipeline, PipelineError, RecognitionRecord};
pub use recognition::{
    ctc_greedy_decode, load_dictionary, ModelManifest, OnnxLineRecognizer, RecognitionError,
    RecognizedText, Recognizer,
};
pub use segmentation::{segment, LineBox, Segmentation, SegmentationConfig, SegmentationError, TextDirection};
