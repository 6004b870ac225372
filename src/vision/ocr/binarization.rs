// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Non-local page binarization
//!
//! Converts a colour or greyscale page into a two-level image (ink = 0,
//! paper = 255) that tolerates uneven illumination:
//!
//! 1. Greyscale conversion and min/max normalization
//! 2. Background estimation with a separable percentile filter on a
//!    zoomed-down copy, scaled back to full resolution
//! 3. Flattening (`image - background + 1`) to remove shading
//! 4. Contrast stretch between low/high percentiles measured around
//!    text-bearing areas
//! 5. Global threshold on the stretched page

use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Ink value in binarized output
pub const INK: u8 = 0;

/// Paper value in binarized output
pub const PAPER: u8 = 255;

/// Two-level page: every pixel is [`INK`] or [`PAPER`]
pub type BinarizedImage = GrayImage;

#[derive(Debug, Error)]
pub enum BinarizationError {
    #[error("Image has zero size ({0}x{1})")]
    EmptyImage(u32, u32),

    #[error("Invalid binarization parameter: {0}")]
    InvalidParameter(String),
}

/// Tuning for the binarizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizationConfig {
    /// Zoom factor for background estimation (0 < zoom <= 1)
    pub zoom: f32,
    /// Percentile used to estimate the background (0-100)
    pub percentile: f32,
    /// Window length of the percentile filter, in zoomed pixels
    pub range: u32,
    /// Low percentile for contrast stretching
    pub low_percentile: f32,
    /// High percentile for contrast stretching
    pub high_percentile: f32,
    /// Threshold on the stretched page (0-1)
    pub threshold: f32,
    /// Scale of the text-area mask blur, in multiples of 20 px
    pub escale: f32,
}

impl Default for BinarizationConfig {
    fn default() -> Self {
        Self {
            zoom: 0.5,
            percentile: 80.0,
            range: 20,
            low_percentile: 5.0,
            high_percentile: 90.0,
            threshold: 0.5,
            escale: 1.0,
        }
    }
}

impl BinarizationConfig {
    pub fn validate(&self) -> Result<(), BinarizationError> {
        if !(self.zoom > 0.0 && self.zoom <= 1.0) {
            return Err(BinarizationError::InvalidParameter(format!(
                "zoom must be in (0, 1], got {}",
                self.zoom
            )));
        }
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(BinarizationError::InvalidParameter(format!(
                "percentile must be in [0, 100], got {}",
                self.percentile
            )));
        }
        if self.range == 0 {
            return Err(BinarizationError::InvalidParameter(
                "range must be at least 1".to_string(),
            ));
        }
        if !(0.0 <= self.low_percentile
            && self.low_percentile < self.high_percentile
            && self.high_percentile <= 100.0)
        {
            return Err(BinarizationError::InvalidParameter(format!(
                "expected 0 <= low_percentile < high_percentile <= 100, got {} / {}",
                self.low_percentile, self.high_percentile
            )));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(BinarizationError::InvalidParameter(format!(
                "threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if self.escale <= 0.0 {
            return Err(BinarizationError::InvalidParameter(format!(
                "escale must be positive, got {}",
                self.escale
            )));
        }
        Ok(())
    }
}

/// Binarize a page image
///
/// A page without any contrast binarizes to plain paper rather than failing,
/// so that blank uploads flow through segmentation as an empty page.
pub fn nlbin(image: &DynamicImage, config: &BinarizationConfig) -> Result<BinarizedImage, BinarizationError> {
    config.validate()?;

    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(BinarizationError::EmptyImage(width, height));
    }

    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if min == max {
        debug!("Flat page ({}), nothing to binarize", min);
        return Ok(GrayImage::from_pixel(width, height, Luma([PAPER])));
    }

    let span = (max - min) as u32;
    let raw = GrayImage::from_fn(width, height, |x, y| {
        let v = (gray.get_pixel(x, y)[0] - min) as u32;
        Luma([(v * 255 / span) as u8])
    });

    let background = estimate_background(&raw, config);

    // image - background + 1, clipped
    let flat = GrayImage::from_fn(width, height, |x, y| {
        let v = raw.get_pixel(x, y)[0] as u32 + 255 - background.get_pixel(x, y)[0] as u32;
        Luma([v.min(255) as u8])
    });

    let histogram = text_area_histogram(&flat, config.escale);
    let lo = histogram_percentile(&histogram, config.low_percentile);
    let hi = histogram_percentile(&histogram, config.high_percentile);
    debug!(
        "Binarization stretch: lo={}, hi={} ({}x{})",
        lo, hi, width, height
    );

    if hi <= lo {
        return Ok(GrayImage::from_pixel(width, height, Luma([PAPER])));
    }

    let cut = lo as f32 + config.threshold * (hi - lo) as f32;
    Ok(GrayImage::from_fn(width, height, |x, y| {
        if flat.get_pixel(x, y)[0] as f32 > cut {
            Luma([PAPER])
        } else {
            Luma([INK])
        }
    }))
}

/// Estimate the page background at full resolution
fn estimate_background(raw: &GrayImage, config: &BinarizationConfig) -> GrayImage {
    let (width, height) = raw.dimensions();
    let zoomed_w = ((width as f32 * config.zoom).round() as u32).max(1);
    let zoomed_h = ((height as f32 * config.zoom).round() as u32).max(1);

    let small = imageops::resize(raw, zoomed_w, zoomed_h, imageops::FilterType::Triangle);
    let small = percentile_filter(&small, config.percentile, config.range, Axis::Horizontal);
    let small = percentile_filter(&small, config.percentile, config.range, Axis::Vertical);

    imageops::resize(&small, width, height, imageops::FilterType::Triangle)
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// One-dimensional sliding percentile filter along `axis`
fn percentile_filter(image: &GrayImage, percentile: f32, range: u32, axis: Axis) -> GrayImage {
    let (width, height) = image.dimensions();
    let before = (range / 2) as i64;
    let after = (range as i64 - 1 - before).max(0);
    let mut window: Vec<u8> = Vec::with_capacity(range as usize);

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            window.clear();
            let (pos, len) = match axis {
                Axis::Horizontal => (x as i64, width as i64),
                Axis::Vertical => (y as i64, height as i64),
            };
            let start = (pos - before).max(0);
            let end = (pos + after).min(len - 1);
            for i in start..=end {
                let v = match axis {
                    Axis::Horizontal => image.get_pixel(i as u32, y)[0],
                    Axis::Vertical => image.get_pixel(x, i as u32)[0],
                };
                window.push(v);
            }

            let last = window.len() - 1;
            let k = ((percentile / 100.0) * last as f32).round() as usize;
            let (_, value, _) = window.select_nth_unstable(k.min(last));
            output.put_pixel(x, y, Luma([*value]));
        }
    }
    output
}

/// Histogram of the flattened page restricted to areas with local variation
///
/// Falls back to the whole page when no such area stands out.
fn text_area_histogram(flat: &GrayImage, escale: f32) -> [u64; 256] {
    let sigma = escale * 20.0;
    let blurred = gaussian_blur_f32(flat, sigma);

    // squared deviation from the local mean, in 0-255
    let deviation = GrayImage::from_fn(flat.width(), flat.height(), |x, y| {
        let d = flat.get_pixel(x, y)[0] as f32 - blurred.get_pixel(x, y)[0] as f32;
        Luma([((d * d) / 255.0).min(255.0) as u8])
    });
    let energy = gaussian_blur_f32(&deviation, sigma);
    let peak = energy.pixels().map(|p| p[0]).max().unwrap_or(0);

    let mut histogram = [0u64; 256];
    if peak > 0 {
        let cutoff = (0.3 * peak as f32) as u8;
        for (value, mask) in flat.pixels().zip(energy.pixels()) {
            if mask[0] > cutoff {
                histogram[value[0] as usize] += 1;
            }
        }
    }

    if histogram.iter().all(|&c| c == 0) {
        for value in flat.pixels() {
            histogram[value[0] as usize] += 1;
        }
    }
    histogram
}

/// Value at `percentile` (0-100) of a 256-bin histogram
fn histogram_percentile(histogram: &[u64; 256], percentile: f32) -> u8 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }
    let rank = ((percentile / 100.0) * (total - 1) as f32).round() as u64;
    let mut seen = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen > rank {
            return value as u8;
        }
    }
    255
}
