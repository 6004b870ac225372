// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Recognition model provider
//!
//! Loads the configured line-recognition model on first use and hands out
//! the same shared instance for the rest of the process lifetime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::vision::ocr::{ModelManifest, OnnxLineRecognizer, Recognizer};

/// Recognition network file inside a model directory
pub const MODEL_FILE: &str = "rec_model.onnx";
/// Symbol dictionary file inside a model directory
pub const DICTIONARY_FILE: &str = "dict.txt";
/// Optional manifest file inside a model directory
pub const MANIFEST_FILE: &str = "manifest.toml";

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model '{name}' not found: {path} does not exist")]
    NotFound { name: String, path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Failed to initialize model '{name}': {message}")]
    Runtime { name: String, message: String },
}

/// Configuration for the recognition model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding one sub-directory per named model
    pub models_dir: PathBuf,
    /// Name of the model to load
    pub name: String,
    /// Load the model at startup instead of on the first request
    pub preload: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models/lineocr"),
            name: "default".to_string(),
            preload: false,
            intra_threads: 4,
        }
    }
}

/// Loads a named recognition model
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<Arc<dyn Recognizer>, ModelLoadError>;
}

/// Loads `<models_dir>/<name>/rec_model.onnx` through ONNX Runtime
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    models_dir: PathBuf,
    intra_threads: usize,
}

impl OnnxModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>, intra_threads: usize) -> Self {
        Self {
            models_dir: models_dir.into(),
            intra_threads,
        }
    }

    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.models_dir.join(name)
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self, name: &str) -> Result<Arc<dyn Recognizer>, ModelLoadError> {
        let dir = self.model_dir(name);
        if !dir.is_dir() {
            return Err(ModelLoadError::NotFound {
                name: name.to_string(),
                path: dir,
            });
        }

        let model_path = dir.join(MODEL_FILE);
        let dict_path = dir.join(DICTIONARY_FILE);
        for path in [&model_path, &dict_path] {
            if !path.is_file() {
                return Err(ModelLoadError::NotFound {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
        }

        let manifest = read_manifest(&dir.join(MANIFEST_FILE))?;

        let task_name = name.to_string();
        let intra_threads = self.intra_threads;
        let recognizer = tokio::task::spawn_blocking(move || {
            if let Some(expected) = manifest.sha256.as_deref() {
                verify_checksum(&model_path, expected)?;
            }
            OnnxLineRecognizer::load(&task_name, &model_path, &dict_path, manifest, intra_threads)
                .map_err(|e| ModelLoadError::Runtime {
                    name: task_name.clone(),
                    message: format!("{:#}", e),
                })
        })
        .await
        .map_err(|e| ModelLoadError::Runtime {
            name: name.to_string(),
            message: e.to_string(),
        })??;

        let manifest = recognizer.manifest();
        info!(
            "Model '{}': {} symbols, line height {}, max width {}",
            name,
            recognizer.dictionary_size(),
            manifest.input_height,
            manifest.max_width
        );

        Ok(Arc::new(recognizer))
    }
}

/// Read `manifest.toml`, falling back to defaults when it is absent
fn read_manifest(path: &Path) -> Result<ModelManifest, ModelLoadError> {
    if !path.exists() {
        return Ok(ModelManifest::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let manifest: ModelManifest =
        toml::from_str(&content).map_err(|e| ModelLoadError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    manifest
        .validate()
        .map_err(|e| ModelLoadError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(manifest)
}

/// Compare the SHA-256 of `path` against a hex digest
fn verify_checksum(path: &Path, expected: &str) -> Result<(), ModelLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let actual = hex::encode(Sha256::digest(&bytes));

    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(ModelLoadError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Process-wide cache for the configured recognition model
///
/// The first successful `get_model` call loads the model; concurrent first
/// callers wait on the same load. Failures are not cached.
pub struct ModelProvider {
    model_name: String,
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn Recognizer>>,
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("model_name", &self.model_name)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl ModelProvider {
    pub fn new(model_name: impl Into<String>, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            model_name: model_name.into(),
            loader,
            model: OnceCell::new(),
        }
    }

    /// Provider backed by [`OnnxModelLoader`]
    pub fn from_config(config: &ModelConfig) -> Self {
        let loader = OnnxModelLoader::new(&config.models_dir, config.intra_threads);
        Self::new(config.name.clone(), Arc::new(loader))
    }

    /// Get the shared model, loading it on first use
    pub async fn get_model(&self) -> Result<Arc<dyn Recognizer>, ModelLoadError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                info!("Loading recognition model '{}'", self.model_name);
                let model = self.loader.load(&self.model_name).await?;
                info!("✅ Recognition model '{}' ready", self.model_name);
                Ok::<_, ModelLoadError>(model)
            })
            .await?;

        Ok(Arc::clone(model))
    }

    /// Warm the cache; failures are logged and left for the next request
    pub async fn preload(&self) -> bool {
        match self.get_model().await {
            Ok(_) => true,
            Err(e) => {
                warn!("⚠️ Failed to preload model '{}': {}", self.model_name, e);
                false
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}
