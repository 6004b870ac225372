// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::ocr::presenter::render_index_page;
use super::ocr::{download_handler, ocr_handler, ocr_page_handler, HealthResponse};
use crate::config::ServerConfig;
use crate::version;
use crate::vision::ocr::OcrPipeline;
use crate::vision::ModelProvider;

/// Room for multipart boundaries and headers on top of the file itself
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub model_provider: Arc<ModelProvider>,
    pub pipeline: Arc<OcrPipeline>,
}

impl AppState {
    /// State backed by the ONNX model named in `config`
    pub fn new(config: ServerConfig) -> Self {
        let provider = ModelProvider::from_config(&config.model);
        Self::with_model_provider(config, Arc::new(provider))
    }

    pub fn with_model_provider(config: ServerConfig, model_provider: Arc<ModelProvider>) -> Self {
        let pipeline = OcrPipeline::new(config.binarization.clone(), config.segmentation.clone());
        Self {
            config: Arc::new(config),
            model_provider,
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.limits.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        // Upload page
        .route("/", get(index_handler))
        // Form upload, HTML result
        .route("/ocr", post(ocr_page_handler))
        // Multipart upload, JSON result
        .route("/v1/ocr", post(ocr_handler))
        // Extracted text as a file
        .route("/download", post(download_handler))
        // Health check
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.server.listen_addr;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn index_handler() -> Html<String> {
    render_index_page()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: state.model_provider.is_loaded(),
        model: state.model_provider.model_name().to_string(),
        version: version::get_version_info(),
    })
}
