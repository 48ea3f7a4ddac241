use image::DynamicImage;
use intake_core::{EasyOcrConfig, TesseractConfig, ThresholdPolicy};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::preprocess::{self, PreprocessError};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Failed to start OCR engine {command}: {source}")]
    Spawn {
        command: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// One image handed to a backend. Each backend decides which form it reads:
/// the decoded pixels or the original file on disk.
pub struct OcrInput<'a> {
    pub path: &'a Path,
    pub image: &'a DynamicImage,
}

/// Abstraction over an OCR backend: image in, raw text out.
pub trait OcrBackend: Send + Sync {
    /// Short name, also used as the JSON file suffix (`<image>_<name>.json`).
    fn name(&self) -> &'static str;

    fn recognize(&self, input: &OcrInput<'_>) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn recognize(&self, input: &OcrInput<'_>) -> Result<String, OcrError> {
        (**self).recognize(input)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string. Used to unit test the extraction pipeline
/// without requiring an OCR engine to be installed.
pub struct MockRecognizer {
    pub name: &'static str,
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { name: "mock", text: text.into() }
    }

    pub fn named(name: &'static str, text: impl Into<String>) -> Self {
        Self { name, text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recognize(&self, _input: &OcrInput<'_>) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract command line backend ────────────────────────────────────────────

/// Binarizes the image and pipes it as PNG to the `tesseract` executable,
/// treating the page as a single uniform block of text by default.
pub struct TesseractCli {
    command: PathBuf,
    page_seg_mode: u8,
    language: Option<String>,
    policy: ThresholdPolicy,
}

impl TesseractCli {
    pub fn new(config: &TesseractConfig, policy: ThresholdPolicy) -> Self {
        Self {
            command: config.command.clone(),
            page_seg_mode: config.page_seg_mode,
            language: config.language.clone(),
            policy,
        }
    }

    /// Threshold applied before the image is piped to the engine.
    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "--psm".to_string(),
            self.page_seg_mode.to_string(),
        ];
        if let Some(lang) = &self.language {
            args.push("-l".to_string());
            args.push(lang.clone());
        }
        args
    }
}

impl OcrBackend for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, input: &OcrInput<'_>) -> Result<String, OcrError> {
        let binarized = preprocess::binarize(input.image, self.policy);
        let png = preprocess::encode_as_png(&binarized)?;
        tracing::debug!(command = %self.command.display(), policy = ?self.policy, "Running tesseract");

        let mut child = Command::new(&self.command)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OcrError::Spawn { command: self.command.clone(), source })?;

        // Dropping stdin closes the pipe so tesseract sees end of input.
        let piped = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&png),
            None => Ok(()),
        };

        // Always reap the child, even when the engine hung up on us early.
        let output = child
            .wait_with_output()
            .map_err(|e| OcrError::Engine(e.to_string()))?;
        if let Err(e) = piped {
            return Err(OcrError::Engine(format!(
                "Failed to pipe image to tesseract ({}): {e}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !output.status.success() {
            return Err(OcrError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── EasyOCR command line backend ──────────────────────────────────────────────

/// Runs the `easyocr` command line tool on the original, unprocessed image
/// and keeps only the recognized text lines (no boxes, no confidences).
pub struct EasyOcrCli {
    command: PathBuf,
    language: String,
}

impl EasyOcrCli {
    pub fn new(config: &EasyOcrConfig) -> Self {
        Self { command: config.command.clone(), language: config.language.clone() }
    }
}

impl OcrBackend for EasyOcrCli {
    fn name(&self) -> &'static str {
        "easyocr"
    }

    fn recognize(&self, input: &OcrInput<'_>) -> Result<String, OcrError> {
        tracing::debug!(command = %self.command.display(), path = %input.path.display(), "Running easyocr");

        let output = Command::new(&self.command)
            .arg("-l")
            .arg(&self.language)
            .arg("-f")
            .arg(input.path)
            .arg("--detail")
            .arg("0")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| OcrError::Spawn { command: self.command.clone(), source })?;

        if !output.status.success() {
            return Err(OcrError::Engine(format!(
                "easyocr exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(join_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Keep non-empty lines, joined with `\n`.
fn join_lines(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tesseract library backend (optional, gated behind `tesseract` feature) ───

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError, OcrInput};
    use crate::preprocess;
    use intake_core::ThresholdPolicy;
    use leptess::{LepTess, Variable};

    /// In-process Tesseract via libtesseract; same input as [`super::TesseractCli`].
    pub struct LeptessRecognizer {
        data_path: Option<String>,
        lang: String,
        page_seg_mode: u8,
        policy: ThresholdPolicy,
    }

    impl LeptessRecognizer {
        pub fn new(data_path: Option<String>, lang: &str, page_seg_mode: u8, policy: ThresholdPolicy) -> Self {
            Self { data_path, lang: lang.to_string(), page_seg_mode, policy }
        }
    }

    impl OcrBackend for LeptessRecognizer {
        fn name(&self) -> &'static str {
            "tesseract"
        }

        fn recognize(&self, input: &OcrInput<'_>) -> Result<String, OcrError> {
            let png = preprocess::encode_as_png(&preprocess::binarize(input.image, self.policy))?;
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &self.page_seg_mode.to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma};

    fn blank() -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([255u8]));
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn mock_returns_preset_text() {
        let img = blank();
        let input = OcrInput { path: Path::new("form.png"), image: &img };
        let r = MockRecognizer::new("Patient Name: Jane Doe\nPain: 5");
        assert_eq!(r.recognize(&input).unwrap(), "Patient Name: Jane Doe\nPain: 5");
        assert_eq!(r.name(), "mock");
    }

    #[test]
    fn boxed_backend_delegates() {
        let img = blank();
        let input = OcrInput { path: Path::new("form.png"), image: &img };
        let r: Box<dyn OcrBackend> = Box::new(MockRecognizer::named("easyocr", "hello"));
        assert_eq!(r.name(), "easyocr");
        assert_eq!(r.recognize(&input).unwrap(), "hello");
    }

    #[test]
    fn tesseract_args_use_configured_psm_and_language() {
        let config = TesseractConfig {
            language: Some("eng".into()),
            ..TesseractConfig::default()
        };
        let backend = TesseractCli::new(&config, ThresholdPolicy::global());
        assert_eq!(backend.args(), ["stdin", "stdout", "--psm", "6", "-l", "eng"]);
    }

    #[test]
    fn missing_engine_binary_is_spawn_error() {
        let img = blank();
        let input = OcrInput { path: Path::new("form.png"), image: &img };

        let tess = TesseractCli::new(
            &TesseractConfig {
                command: PathBuf::from("/nonexistent/bin/tesseract"),
                ..TesseractConfig::default()
            },
            ThresholdPolicy::global(),
        );
        assert!(matches!(tess.recognize(&input), Err(OcrError::Spawn { .. })));

        let easy = EasyOcrCli::new(&EasyOcrConfig {
            command: PathBuf::from("/nonexistent/bin/easyocr"),
            ..EasyOcrConfig::default()
        });
        assert!(matches!(easy.recognize(&input), Err(OcrError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn early_engine_exit_reports_its_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tesseract");
        std::fs::write(&script, "#!/bin/sh\necho 'Error: unknown page segmentation mode' >&2\nexit 1\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let img = blank();
        let input = OcrInput { path: Path::new("form.png"), image: &img };
        let tess = TesseractCli::new(
            &TesseractConfig { command: script, ..TesseractConfig::default() },
            ThresholdPolicy::global(),
        );

        let err = tess.recognize(&input).unwrap_err();
        assert!(matches!(err, OcrError::Engine(_)));
        assert!(err.to_string().contains("unknown page segmentation mode"), "{err}");
    }

    #[test]
    fn join_lines_drops_blank_lines() {
        assert_eq!(
            join_lines("Patient Name: Jane Doe\n\n  \nDOB: 04/02/1990  \n"),
            "Patient Name: Jane Doe\nDOB: 04/02/1990"
        );
        assert_eq!(join_lines(""), "");
    }
}
