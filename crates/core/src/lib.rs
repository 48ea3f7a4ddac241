pub mod config;
pub mod record;

pub use config::{
    Config, ConfigError, EasyOcrConfig, ExtractionPreset, TesseractConfig, ThresholdPolicy,
};
pub use record::{yes_no, FormRecord, StoredRecord, Symptom, Symptoms, UNKNOWN};
