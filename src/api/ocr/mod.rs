// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR upload endpoints
//!
//! - `POST /ocr` form upload returning the HTML result page
//! - `POST /v1/ocr` multipart upload returning JSON
//! - `POST /download` extracted text as `ocr_output.txt`

pub mod handler;
pub mod presenter;
pub mod request;
pub mod response;

pub use handler::{download_handler, ocr_handler, ocr_page_handler, process_upload, ProcessedUpload};
pub use presenter::{extract_text, DOWNLOAD_FILE_NAME};
pub use request::{accept_upload, DownloadForm, UploadedFile};
pub use response::{HealthResponse, OcrResponse};
