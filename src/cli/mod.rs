// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::ServerConfig;

/// Line OCR upload server
#[derive(Parser, Debug, Default)]
#[command(name = "lineocr-node")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Upload an image, get its text back", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "LINEOCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:8080)
    #[arg(long, env = "LINEOCR_LISTEN_ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// Directory holding named model directories
    #[arg(long, env = "LINEOCR_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Name of the recognition model to load
    #[arg(long, env = "LINEOCR_MODEL")]
    pub model: Option<String>,

    /// Largest accepted upload in bytes
    #[arg(long, env = "LINEOCR_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Largest accepted decoded image in pixels
    #[arg(long, env = "LINEOCR_MAX_PIXELS")]
    pub max_pixels: Option<u64>,

    /// Load the model at startup
    #[arg(long, env = "LINEOCR_PRELOAD_MODEL")]
    pub preload_model: bool,
}

impl Cli {
    /// Resolve the final configuration: defaults, then file, then flags
    pub fn load_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(addr) = self.listen_addr {
            config.server.listen_addr = addr;
        }
        if let Some(dir) = &self.models_dir {
            config.model.models_dir = dir.clone();
        }
        if let Some(name) = &self.model {
            config.model.name = name.clone();
        }
        if let Some(bytes) = self.max_upload_bytes {
            config.limits.max_upload_bytes = bytes;
        }
        if let Some(pixels) = self.max_pixels {
            config.limits.max_pixels = pixels;
        }
        if self.preload_model {
            config.model.preload = true;
        }
    }
}
