// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use lineocr_node::{api::AppState, cli::Cli, start_server, version};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    tracing::info!("🚀 Starting {}", version::get_version_string());
    tracing::info!(
        "Model '{}' from {}, max upload {} bytes, max {} pixels",
        config.model.name,
        config.model.models_dir.display(),
        config.limits.max_upload_bytes,
        config.limits.max_pixels
    );

    let preload = config.model.preload;
    let state = AppState::new(config);

    if preload && state.model_provider.preload().await {
        tracing::info!("✅ Model preloaded");
    }

    start_server(state).await
}
