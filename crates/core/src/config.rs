use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown extraction preset: '{0}'")]
    UnknownPreset(String),
}

/// Which of the two form-reading variants to use.
///
/// `Flexible` accepts 1–2 digit day/month and 2–4 digit years and binarizes
/// with a fixed global cutoff. `Strict` only accepts `DD/MM/YYYY` and uses
/// blur + adaptive local thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPreset {
    Strict,
    #[default]
    Flexible,
}

impl ExtractionPreset {
    /// Regex fragment for the numeric date value after `DOB:` / `Date:`.
    pub fn date_pattern(self) -> &'static str {
        match self {
            ExtractionPreset::Strict => r"\d{2}/\d{2}/\d{4}",
            ExtractionPreset::Flexible => r"\d{1,2}/\d{1,2}/\d{2,4}",
        }
    }

    pub fn default_threshold(self) -> ThresholdPolicy {
        match self {
            ExtractionPreset::Strict => ThresholdPolicy::adaptive(),
            ExtractionPreset::Flexible => ThresholdPolicy::global(),
        }
    }
}

impl fmt::Display for ExtractionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionPreset::Strict => write!(f, "strict"),
            ExtractionPreset::Flexible => write!(f, "flexible"),
        }
    }
}

impl std::str::FromStr for ExtractionPreset {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ExtractionPreset::Strict),
            "flexible" => Ok(ExtractionPreset::Flexible),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

pub const DEFAULT_GLOBAL_CUTOFF: u8 = 127;
pub const DEFAULT_BLUR_SIGMA: f32 = 1.1;
/// 11×11 neighborhood.
pub const DEFAULT_BLOCK_RADIUS: u32 = 5;

/// Binarization policy applied before the Tesseract backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Gaussian blur, then threshold each pixel against its neighborhood.
    Adaptive {
        #[serde(default = "default_blur_sigma")]
        blur_sigma: f32,
        #[serde(default = "default_block_radius")]
        block_radius: u32,
    },
    /// Pixels strictly above `cutoff` become white, the rest black.
    Global {
        #[serde(default = "default_cutoff")]
        cutoff: u8,
    },
}

impl ThresholdPolicy {
    pub fn adaptive() -> Self {
        ThresholdPolicy::Adaptive {
            blur_sigma: DEFAULT_BLUR_SIGMA,
            block_radius: DEFAULT_BLOCK_RADIUS,
        }
    }

    pub fn global() -> Self {
        ThresholdPolicy::Global { cutoff: DEFAULT_GLOBAL_CUTOFF }
    }
}

fn default_blur_sigma() -> f32 {
    DEFAULT_BLUR_SIGMA
}

fn default_block_radius() -> u32 {
    DEFAULT_BLOCK_RADIUS
}

fn default_cutoff() -> u8 {
    DEFAULT_GLOBAL_CUTOFF
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub enabled: bool,
    /// Path to (or name of) the `tesseract` executable.
    pub command: PathBuf,
    /// `--psm` value; 6 = "assume a single uniform block of text".
    pub page_seg_mode: u8,
    pub language: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: PathBuf::from("tesseract"),
            page_seg_mode: 6,
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EasyOcrConfig {
    pub enabled: bool,
    /// Path to (or name of) the `easyocr` command line tool.
    pub command: PathBuf,
    pub language: String,
}

impl Default for EasyOcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: PathBuf::from("easyocr"),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preset: ExtractionPreset,
    pub database_path: PathBuf,
    /// Directory the per-backend JSON files are written to.
    pub output_dir: PathBuf,
    /// Overrides the preset's threshold policy when set.
    pub threshold: Option<ThresholdPolicy>,
    pub tesseract: TesseractConfig,
    pub easyocr: EasyOcrConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preset: ExtractionPreset::default(),
            database_path: PathBuf::from("ocr_results.db"),
            output_dir: PathBuf::from("."),
            threshold: None,
            tesseract: TesseractConfig::default(),
            easyocr: EasyOcrConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), preset = %config.preset, "Loaded configuration");
        Ok(config)
    }

    pub fn threshold_policy(&self) -> ThresholdPolicy {
        self.threshold.unwrap_or_else(|| self.preset.default_threshold())
    }
}
