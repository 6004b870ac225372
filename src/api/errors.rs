// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::vision::ocr::PipelineError;
use crate::vision::{ImageError, ModelLoadError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    UnsupportedFileType(String),
    PayloadTooLarge(String),
    DecodeFailed(String),
    ModelLoadFailed { model: String, message: String },
    PipelineFailed { stage: String, message: String },
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::UnsupportedFileType(_) => "unsupported_file_type",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::DecodeFailed(_) => "decode_failed",
            ApiError::ModelLoadFailed { .. } => "model_load_failed",
            ApiError::PipelineFailed { .. } => "pipeline_failed",
        }
    }

    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (message, details) = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::UnsupportedFileType(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::DecodeFailed(msg) => (msg.clone(), None),
            ApiError::ModelLoadFailed { model, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "model".to_string(),
                    serde_json::Value::String(model.clone()),
                );
                (message.clone(), Some(details))
            }
            ApiError::PipelineFailed { stage, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "stage".to_string(),
                    serde_json::Value::String(stage.clone()),
                );
                (message.clone(), Some(details))
            }
        };

        ErrorResponse {
            error_type: self.error_type().to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) | ApiError::DecodeFailed(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::UnsupportedFileType(_) => 415,
            ApiError::PipelineFailed { .. } => 500,
            ApiError::ModelLoadFailed { .. } => 503,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Attach a request id for the JSON body
    pub fn with_request_id(self, request_id: impl Into<String>) -> ApiErrorResponse {
        ApiErrorResponse {
            error: self,
            request_id: Some(request_id.into()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::UnsupportedFileType(msg) => write!(f, "Unsupported file type: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::DecodeFailed(msg) => write!(f, "Could not decode image: {}", msg),
            ApiError::ModelLoadFailed { model, message } => {
                write!(f, "Model '{}' failed to load: {}", model, message)
            }
            ApiError::PipelineFailed { stage, message } => {
                write!(f, "OCR {} failed: {}", stage, message)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::TooLarge(..) | ImageError::TooManyPixels { .. } => {
                ApiError::PayloadTooLarge(err.to_string())
            }
            ImageError::UnsupportedFormat | ImageError::UnsupportedExtension(_) => {
                ApiError::UnsupportedFileType(err.to_string())
            }
            ImageError::DecodeFailed(_) | ImageError::EmptyData => {
                ApiError::DecodeFailed(err.to_string())
            }
            ImageError::EncodeFailed(_) => ApiError::PipelineFailed {
                stage: "preview".to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<ModelLoadError> for ApiError {
    fn from(err: ModelLoadError) -> Self {
        let model = match &err {
            ModelLoadError::NotFound { name, .. } | ModelLoadError::Runtime { name, .. } => {
                name.clone()
            }
            _ => String::new(),
        };
        ApiError::ModelLoadFailed {
            model,
            message: err.to_string(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::PipelineFailed {
            stage: err.stage().to_string(),
            message: err.to_string(),
        }
    }
}

/// JSON error body with the request id it belongs to
#[derive(Debug)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub request_id: Option<String>,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let body = self.error.to_response(self.request_id);
        (self.error.status(), Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiErrorResponse {
            error: self,
            request_id: None,
        }
        .into_response()
    }
}
