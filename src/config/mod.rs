// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Built-in defaults, optionally overridden by a TOML file, then by CLI
//! flags and environment variables (see [`crate::cli`]).

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::vision::model_provider::ModelConfig;
use crate::vision::ocr::{BinarizationConfig, SegmentationConfig};

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_addr: SocketAddr,
    /// Longest side of the preview image embedded in the result page
    pub preview_max_side: u32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            preview_max_side: 1024,
        }
    }
}

/// Upload bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    /// Largest accepted decoded image, in pixels
    pub max_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            max_pixels: 40_000_000,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub model: ModelConfig,
    pub limits: LimitsConfig,
    pub binarization: BinarizationConfig,
    pub segmentation: SegmentationConfig,
}

impl ServerConfig {
    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.model.name.trim().is_empty(), "model.name must not be empty");
        anyhow::ensure!(
            !self.model.name.contains(['/', '\\']) && self.model.name != "..",
            "model.name must be a directory name, got '{}'",
            self.model.name
        );
        anyhow::ensure!(self.model.intra_threads > 0, "model.intra_threads must be positive");
        anyhow::ensure!(
            self.limits.max_upload_bytes > 0,
            "limits.max_upload_bytes must be positive"
        );
        anyhow::ensure!(self.limits.max_pixels > 0, "limits.max_pixels must be positive");
        anyhow::ensure!(
            self.server.preview_max_side > 0,
            "server.preview_max_side must be positive"
        );
        self.binarization
            .validate()
            .context("Invalid [binarization] section")?;
        anyhow::ensure!(
            self.segmentation.min_page_size > 0,
            "segmentation.min_page_size must be positive"
        );
        anyhow::ensure!(
            self.segmentation.max_blob_scale > 0.0 && self.segmentation.column_gap_scale > 0.0,
            "segmentation scales must be positive"
        );
        Ok(())
    }
}
