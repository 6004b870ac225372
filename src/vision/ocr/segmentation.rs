// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page segmentation into text lines
//!
//! Works on a binarized page (ink = 0, paper = 255). Ink is labelled into
//! connected components, a character scale is estimated from the median
//! component size, components are grouped into lines by vertical overlap,
//! and lines are split into separate boxes at column-sized gaps.
//!
//! Reading order is top-to-bottom, then left-to-right. Multi-column and
//! rotated layouts are not reordered.

use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::binarization::PAPER;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Image too small to segment: {width}x{height} (min: {min}x{min})")]
    ImageTooSmall { width: u32, height: u32, min: u32 },
}

/// Tuning for the line segmenter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Components with a smaller bounding-box area are treated as noise
    pub min_component_area: u32,
    /// Components wider or taller than this many scales are dropped (rules, images)
    pub max_blob_scale: f32,
    /// Horizontal gap, in scales, that separates two boxes on the same line
    pub column_gap_scale: f32,
    /// Padding added around each line box, in pixels
    pub pad: u32,
    /// Smallest page side that can be segmented
    pub min_page_size: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_component_area: 4,
            max_blob_scale: 10.0,
            column_gap_scale: 3.0,
            pad: 2,
            min_page_size: 8,
        }
    }
}

/// Direction in which line boxes are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextDirection {
    HorizontalLr,
}

/// Axis-aligned line boundary in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl LineBox {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Ordered line boxes for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segmentation {
    pub text_direction: TextDirection,
    pub lines: Vec<LineBox>,
    /// Estimated character scale in pixels (0 when the page is empty)
    pub scale: f32,
}

impl Segmentation {
    fn empty() -> Self {
        Self {
            text_direction: TextDirection::HorizontalLr,
            lines: Vec::new(),
            scale: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Inclusive bounding box of a group of ink pixels
#[derive(Debug, Clone, Copy)]
struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Extent {
    fn point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Vertical overlap relative to the shorter of the two extents
    fn vertical_overlap(&self, other: &Extent) -> f32 {
        let top = self.min_y.max(other.min_y);
        let bottom = self.max_y.min(other.max_y);
        if bottom < top {
            return 0.0;
        }
        let shared = (bottom - top + 1) as f32;
        shared / self.height().min(other.height()) as f32
    }
}

/// Segment a binarized page into ordered line boxes
pub fn segment(binary: &GrayImage, config: &SegmentationConfig) -> Result<Segmentation, SegmentationError> {
    let (width, height) = binary.dimensions();
    if width < config.min_page_size || height < config.min_page_size {
        return Err(SegmentationError::ImageTooSmall {
            width,
            height,
            min: config.min_page_size,
        });
    }

    let components = component_extents(binary);
    let components: Vec<Extent> = components
        .into_iter()
        .filter(|c| c.area() >= u64::from(config.min_component_area))
        .collect();

    if components.is_empty() {
        debug!("No ink components found");
        return Ok(Segmentation::empty());
    }

    let scale = estimate_scale(&components);
    let max_side = config.max_blob_scale * scale;
    let components: Vec<Extent> = components
        .into_iter()
        .filter(|c| (c.width() as f32) <= max_side && (c.height() as f32) <= max_side)
        .collect();

    let lines = group_lines(components);
    let max_gap = config.column_gap_scale * scale;

    let mut boxes: Vec<LineBox> = lines
        .iter()
        .flat_map(|members| split_at_gaps(members, max_gap))
        .map(|extent| pad_box(&extent, config.pad, width, height))
        .collect();

    boxes.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));

    debug!(
        "Segmented {} line(s), scale {:.1}px ({}x{})",
        boxes.len(),
        scale,
        width,
        height
    );

    Ok(Segmentation {
        text_direction: TextDirection::HorizontalLr,
        lines: boxes,
        scale,
    })
}

/// Bounding boxes of 8-connected ink components
fn component_extents(binary: &GrayImage) -> Vec<Extent> {
    let labels = connected_components(binary, Connectivity::Eight, Luma([PAPER]));

    let mut extents: HashMap<u32, Extent> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|e| *e = e.union(&Extent::point(x, y)))
            .or_insert_with(|| Extent::point(x, y));
    }

    let mut extents: Vec<Extent> = extents.into_values().collect();
    extents.sort_by(|a, b| a.min_y.cmp(&b.min_y).then(a.min_x.cmp(&b.min_x)));
    extents
}

/// Median of the square root of component box areas
fn estimate_scale(components: &[Extent]) -> f32 {
    let mut sizes: Vec<f32> = components.iter().map(|c| (c.area() as f32).sqrt()).collect();
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sizes[sizes.len() / 2].max(1.0)
}

/// Group components into lines; each line is its list of member extents
fn group_lines(mut components: Vec<Extent>) -> Vec<Vec<Extent>> {
    components.sort_by(|a, b| a.min_y.cmp(&b.min_y).then(a.min_x.cmp(&b.min_x)));

    let mut lines: Vec<(Extent, Vec<Extent>)> = Vec::new();
    for component in components {
        match lines
            .iter_mut()
            .find(|(span, _)| span.vertical_overlap(&component) >= 0.5)
        {
            Some((span, members)) => {
                *span = span.union(&component);
                members.push(component);
            }
            None => lines.push((component, vec![component])),
        }
    }

    // Growing spans can make two lines overlap; fold them until stable
    loop {
        let mut merged = false;
        'outer: for i in 0..lines.len() {
            for j in (i + 1)..lines.len() {
                if lines[i].0.vertical_overlap(&lines[j].0) >= 0.5 {
                    let (span, members) = lines.remove(j);
                    lines[i].0 = lines[i].0.union(&span);
                    lines[i].1.extend(members);
                    merged = true;
                    break 'outer;
                }
            }
        }
        if !merged {
            break;
        }
    }

    lines.into_iter().map(|(_, members)| members).collect()
}

/// Split a line's members wherever the horizontal gap exceeds `max_gap`
fn split_at_gaps(members: &[Extent], max_gap: f32) -> Vec<Extent> {
    let mut sorted = members.to_vec();
    sorted.sort_by_key(|e| e.min_x);

    let mut boxes = Vec::new();
    let mut current: Option<Extent> = None;
    for member in sorted {
        current = match current {
            Some(run) if member.min_x > run.max_x && (member.min_x - run.max_x - 1) as f32 > max_gap => {
                boxes.push(run);
                Some(member)
            }
            Some(run) => Some(run.union(&member)),
            None => Some(member),
        };
    }
    boxes.extend(current);
    boxes
}

fn pad_box(extent: &Extent, pad: u32, page_width: u32, page_height: u32) -> LineBox {
    let x = extent.min_x.saturating_sub(pad);
    let y = extent.min_y.saturating_sub(pad);
    let right = (extent.max_x + 1 + pad).min(page_width);
    let bottom = (extent.max_y + 1 + pad).min(page_height);
    LineBox {
        x,
        y,
        width: right - x,
        height: bottom - y,
    }
}
