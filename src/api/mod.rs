// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod ocr;

pub use errors::{ApiError, ApiErrorResponse, ErrorResponse};
pub use http_server::{create_router, start_server, AppState};
pub use ocr::{download_handler, ocr_handler, ocr_page_handler, HealthResponse, OcrResponse};
