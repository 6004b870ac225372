// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR pipeline tests
//!
//! Binarize, segment and recognize synthetic pages with a stub recognizer.

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use lineocr_node::api::ocr::extract_text;
use lineocr_node::config::LimitsConfig;
use lineocr_node::vision::decode_image_bytes;
use lineocr_node::vision::ocr::{OcrPipeline, PipelineError};

use crate::common::{blank_page, encode, page_with_lines, text_line_page, StaticRecognizer};

fn hello_world() -> StaticRecognizer {
    StaticRecognizer {
        name: "stub".to_string(),
        text: "HELLO WORLD".to_string(),
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    /// Test 1: One text line gives one segment, one record and its text
    #[test]
    fn test_hello_world_line() {
        let pipeline = OcrPipeline::default();
        let image = DynamicImage::ImageLuma8(text_line_page());

        let binary = pipeline.binarize(&image).unwrap();
        let segmentation = pipeline.segment(&binary).unwrap();
        assert_eq!(segmentation.lines.len(), 1);

        let records = pipeline.run(&image, &hello_world()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(extract_text(&records), "HELLO WORLD");

        let line = records[0].bounding_box;
        assert!(line.y <= 48 && line.bottom() >= 72);
        assert!(line.x <= 20 && line.right() >= 248);
    }

    /// Test 2: Blank page gives no lines and empty text
    #[test]
    fn test_blank_page() {
        let pipeline = OcrPipeline::default();
        let image = DynamicImage::ImageLuma8(blank_page());

        let segmentation = pipeline.segment(&pipeline.binarize(&image).unwrap()).unwrap();
        assert!(segmentation.is_empty());

        let records = pipeline.run(&image, &hello_world()).unwrap();
        assert!(records.is_empty());
        assert_eq!(extract_text(&records), "");
    }

    /// Test 3: Record count equals segmented line count, top to bottom
    #[test]
    fn test_records_follow_segmentation() {
        let pipeline = OcrPipeline::default();
        let image = DynamicImage::ImageLuma8(page_with_lines(400, 300, &[30, 120, 220]));

        let binary = pipeline.binarize(&image).unwrap();
        let segmentation = pipeline.segment(&binary).unwrap();
        let records = pipeline.run(&image, &hello_world()).unwrap();

        assert_eq!(segmentation.lines.len(), 3);
        assert_eq!(records.len(), segmentation.lines.len());
        for (record, line) in records.iter().zip(&segmentation.lines) {
            assert_eq!(&record.bounding_box, line);
        }
        assert!(records
            .windows(2)
            .all(|pair| pair[0].bounding_box.y < pair[1].bounding_box.y));
        assert_eq!(
            extract_text(&records),
            "HELLO WORLD\nHELLO WORLD\nHELLO WORLD"
        );
    }

    /// Test 4: Dark text on a gradient background still segments as one line
    #[test]
    fn test_uneven_illumination() {
        let mut page = text_line_page();
        for (x, _, pixel) in page.enumerate_pixels_mut() {
            if pixel[0] == 255 {
                pixel[0] = 255 - (x * 100 / 400) as u8;
            }
        }
        let pipeline = OcrPipeline::default();
        let records = pipeline
            .run(&DynamicImage::ImageLuma8(page), &hello_world())
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    /// Test 5: Decoded JPEG and TIFF uploads run through the pipeline
    #[test]
    fn test_decoded_uploads() {
        let pipeline = OcrPipeline::default();
        for format in [ImageFormat::Jpeg, ImageFormat::Tiff, ImageFormat::Png] {
            let bytes = encode(&text_line_page(), format);
            let (image, info) = decode_image_bytes(&bytes, &LimitsConfig::default()).unwrap();
            assert_eq!(info.format, format);

            let records = pipeline.run(&image, &hello_world()).unwrap();
            assert_eq!(records.len(), 1, "{:?}", format);
        }
    }

    /// Test 6: A page too small to segment is a pipeline error
    #[test]
    fn test_tiny_page_fails() {
        let pipeline = OcrPipeline::default();
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([0])));

        let err = pipeline.run(&image, &hello_world()).unwrap_err();
        assert!(matches!(err, PipelineError::Segmentation(_)));
    }
}
