// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line image preprocessing for the recognition model

use image::{imageops::FilterType, GrayImage};
use ndarray::Array4;

use super::recognition::ModelManifest;

/// Minimum width of a recognition input
pub const REC_MIN_WIDTH: u32 = 4;

/// Normalization mean, applied per channel: (pixel/255 - MEAN) / STD
pub const MEAN: f32 = 0.5;

/// Normalization std
pub const STD: f32 = 0.5;

/// Width a line of `width x height` pixels takes at the model's input height
pub fn scaled_width(width: u32, height: u32, manifest: &ModelManifest) -> u32 {
    if height == 0 {
        return REC_MIN_WIDTH;
    }
    let scale = manifest.input_height as f32 / height as f32;
    ((width as f32 * scale).round() as u32).clamp(REC_MIN_WIDTH, manifest.max_width.max(REC_MIN_WIDTH))
}

/// Preprocess a cropped line for recognition
///
/// Steps:
/// 1. Resize to the model's input height, dynamic width (aspect ratio kept,
///    clamped to `max_width`)
/// 2. Normalize: (pixel / 255 - 0.5) / 0.5
/// 3. Replicate into `channels` planes, NCHW tensor [1, C, H, W]
pub fn preprocess_line(line: &GrayImage, manifest: &ModelManifest) -> Array4<f32> {
    let (orig_w, orig_h) = line.dimensions();
    let height = manifest.input_height;
    let width = scaled_width(orig_w, orig_h, manifest);

    let resized = image::imageops::resize(line, width, height, FilterType::Triangle);

    let channels = manifest.channels as usize;
    let mut tensor = Array4::zeros((1, channels, height as usize, width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let normalized = (pixel[0] as f32 / 255.0 - MEAN) / STD;
        for c in 0..channels {
            tensor[[0, c, y as usize, x as usize]] = normalized;
        }
    }

    tensor
}
