// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text line recognition
//!
//! A [`Recognizer`] turns one cropped, binarized line image into text.
//! [`OnnxLineRecognizer`] runs a CTC line-recognition network through ONNX
//! Runtime on CPU and greedy-decodes its output against a symbol dictionary.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::GrayImage;
use ndarray::{ArrayView2, Ix2, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::preprocessing::{preprocess_line, REC_MIN_WIDTH};

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Line image is empty ({0}x{1})")]
    EmptyLine(u32, u32),

    #[error("Recognition session is unavailable (poisoned lock)")]
    SessionPoisoned,

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output shape: {0:?}")]
    UnexpectedOutput(Vec<usize>),
}

/// Input geometry of a recognition model, read from `manifest.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelManifest {
    /// Input height the network was trained on
    pub input_height: u32,
    /// Input planes: 1 (grey) or 3 (replicated RGB)
    pub channels: u32,
    /// Widest input the network accepts
    pub max_width: u32,
    /// Optional SHA-256 of `rec_model.onnx`, lowercase hex
    pub sha256: Option<String>,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            input_height: 48,
            channels: 3,
            max_width: 1024,
            sha256: None,
        }
    }
}

impl ModelManifest {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.input_height >= 8,
            "input_height must be at least 8, got {}",
            self.input_height
        );
        anyhow::ensure!(
            self.channels == 1 || self.channels == 3,
            "channels must be 1 or 3, got {}",
            self.channels
        );
        anyhow::ensure!(
            self.max_width >= REC_MIN_WIDTH,
            "max_width must be at least {}, got {}",
            REC_MIN_WIDTH,
            self.max_width
        );
        Ok(())
    }
}

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Overall confidence score (0.0-1.0)
    pub confidence: f32,
    /// Per-character confidences
    pub char_confidences: Vec<f32>,
}

impl RecognizedText {
    /// Create a new recognized text result
    pub fn new(text: String, confidence: f32) -> Self {
        Self {
            text,
            confidence,
            char_confidences: Vec::new(),
        }
    }

    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A loaded line-recognition model
///
/// Implementations are shared read-only between requests.
pub trait Recognizer: Send + Sync {
    /// Name the model was loaded under
    fn name(&self) -> &str;

    /// Recognize a single cropped line (ink = 0, paper = 255)
    fn recognize_line(&self, line: &GrayImage) -> Result<RecognizedText, RecognitionError>;
}

/// CTC line recognizer backed by ONNX Runtime
///
/// Runs on CPU only.
pub struct OnnxLineRecognizer {
    name: String,
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Symbol dictionary; index 0 is the CTC blank
    dictionary: Arc<Vec<char>>,
    input_name: String,
    manifest: ModelManifest,
}

impl std::fmt::Debug for OnnxLineRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxLineRecognizer")
            .field("name", &self.name)
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl OnnxLineRecognizer {
    /// Load the recognition network and its dictionary
    ///
    /// Blocking; call from `spawn_blocking` inside async code.
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or dictionary file not found
    /// - ONNX Runtime initialization fails
    pub fn load(
        name: &str,
        model_path: &Path,
        dict_path: &Path,
        manifest: ModelManifest,
        intra_threads: usize,
    ) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("Recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!("Symbol dictionary not found: {}", dict_path.display());
        }
        manifest.validate()?;

        info!("Loading recognition model '{}' from {}", name, model_path.display());

        let dictionary = load_dictionary(dict_path)?;
        info!("Loaded symbol dictionary with {} entries", dictionary.len());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load recognition model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("Recognition model expected input: {:?}", input.input_type);
        }

        info!("✅ Recognition model '{}' loaded (CPU-only)", name);

        Ok(Self {
            name: name.to_string(),
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
            manifest,
        })
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }
}

impl Recognizer for OnnxLineRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize_line(&self, line: &GrayImage) -> Result<RecognizedText, RecognitionError> {
        let (width, height) = line.dimensions();
        if width == 0 || height == 0 {
            return Err(RecognitionError::EmptyLine(width, height));
        }

        let input = preprocess_line(line, &self.manifest);

        let mut session = self
            .session
            .lock()
            .map_err(|_| RecognitionError::SessionPoisoned)?;

        let input_value =
            Value::from_array(input).map_err(|e| RecognitionError::Inference(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| RecognitionError::Inference(e.to_string()))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| RecognitionError::Inference(e.to_string()))?;

        let shape = output.shape().to_vec();
        debug!("Recognition output shape: {:?}", shape);

        // [batch, seq_len, classes] or [seq_len, classes]
        let probs = match shape.len() {
            3 => output
                .into_dimensionality::<Ix3>()
                .map_err(|_| RecognitionError::UnexpectedOutput(shape.clone()))?
                .index_axis_move(ndarray::Axis(0), 0),
            2 => output
                .into_dimensionality::<Ix2>()
                .map_err(|_| RecognitionError::UnexpectedOutput(shape.clone()))?,
            _ => return Err(RecognitionError::UnexpectedOutput(shape)),
        };

        Ok(ctc_greedy_decode(probs, &self.dictionary))
    }
}

/// Load symbol dictionary from file
///
/// Each line holds one symbol. Index 0 is reserved for the CTC blank, and a
/// space is appended when the file has none.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let file = File::open(path.as_ref()).context(format!(
        "Failed to open dictionary: {}",
        path.as_ref().display()
    ))?;

    let reader = BufReader::new(file);
    let mut dictionary = vec!['\0'];

    for line in reader.lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }

    if !dictionary[1..].contains(&' ') {
        dictionary.push(' ');
    }

    Ok(dictionary)
}

/// CTC greedy (best path) decoding
///
/// Takes the most likely class per timestep, collapses repeats and drops
/// blanks (index 0). Out-of-dictionary indices are skipped.
pub fn ctc_greedy_decode(probs: ArrayView2<f32>, dictionary: &[char]) -> RecognizedText {
    let mut text = String::new();
    let mut char_confidences = Vec::new();
    let mut prev_index: Option<usize> = None;

    for timestep in probs.rows() {
        let (max_index, max_prob) = timestep
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                char_confidences.push(max_prob);
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    let confidence = if char_confidences.is_empty() {
        0.0
    } else {
        let mean = char_confidences.iter().sum::<f32>() / char_confidences.len() as f32;
        // Some exports emit log-probabilities
        if mean < 0.0 {
            mean.exp()
        } else {
            mean.min(1.0)
        }
    };

    RecognizedText {
        text: text.trim().to_string(),
        confidence,
        char_confidences,
    }
}
