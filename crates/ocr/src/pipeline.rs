use std::path::Path;
use thiserror::Error;

use intake_core::{Config, FormRecord};

use crate::extract::Extractor;
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{EasyOcrCli, OcrBackend, OcrError, OcrInput};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("No OCR backend is enabled")]
    NoBackends,
}

/// What one backend produced for one image.
#[derive(Debug)]
pub struct OcrResult {
    pub backend: &'static str,
    /// Raw OCR text output.
    pub ocr_text: String,
    /// Structured fields extracted from the OCR text.
    pub record: FormRecord,
}

/// Outcome of one backend. An engine failure is confined to its own backend.
#[derive(Debug)]
pub struct BackendRun {
    pub backend: &'static str,
    pub outcome: Result<OcrResult, OcrError>,
}

/// Orchestrates: load image → (per backend) OCR → extract.
///
/// Backends run one after another in the order they were given; their
/// results are reported side by side and never merged.
pub struct FormPipeline {
    backends: Vec<Box<dyn OcrBackend>>,
    extractor: Extractor,
}

impl FormPipeline {
    pub fn new(backends: Vec<Box<dyn OcrBackend>>, extractor: Extractor) -> Self {
        Self { backends, extractor }
    }

    /// Build the enabled backends (tesseract first, then easyocr).
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let mut backends: Vec<Box<dyn OcrBackend>> = Vec::new();
        if config.tesseract.enabled {
            backends.push(tesseract_backend(config));
        }
        if config.easyocr.enabled {
            backends.push(Box::new(EasyOcrCli::new(&config.easyocr)));
        }
        if backends.is_empty() {
            return Err(PipelineError::NoBackends);
        }
        Ok(Self::new(backends, Extractor::new(config.preset)))
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Process one image file. Fails only if the image itself cannot be loaded.
    pub fn process_file(&self, path: &Path) -> Result<Vec<BackendRun>, PipelineError> {
        let image = preprocess::load_image(path)?;
        let input = OcrInput { path, image: &image };

        let runs = self
            .backends
            .iter()
            .map(|backend| {
                let name = backend.name();
                tracing::info!(backend = name, path = %path.display(), "Extracting text");
                let outcome = backend.recognize(&input).map(|ocr_text| {
                    let record = self.extractor.extract(&ocr_text);
                    OcrResult { backend: name, ocr_text, record }
                });
                if let Err(e) = &outcome {
                    tracing::warn!(backend = name, "OCR failed: {e}");
                }
                BackendRun { backend: name, outcome }
            })
            .collect();

        Ok(runs)
    }
}

/// With the `tesseract` feature Tesseract runs in-process, otherwise through
/// the configured executable.
#[cfg(feature = "tesseract")]
fn tesseract_backend(config: &Config) -> Box<dyn OcrBackend> {
    use crate::recognizer::tesseract_backend::LeptessRecognizer;
    let lang = config.tesseract.language.as_deref().unwrap_or("eng");
    Box::new(LeptessRecognizer::new(
        None,
        lang,
        config.tesseract.page_seg_mode,
        config.threshold_policy(),
    ))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_backend(config: &Config) -> Box<dyn OcrBackend> {
    Box::new(tesseract_cli(config))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_cli(config: &Config) -> crate::recognizer::TesseractCli {
    crate::recognizer::TesseractCli::new(&config.tesseract, config.threshold_policy())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
