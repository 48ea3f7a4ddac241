use std::sync::OnceLock;

use intake_core::{ExtractionPreset, FormRecord, Symptom, Symptoms, UNKNOWN};
use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Name runs to the end of the anchor's own line.
re!(re_patient_name, r"(?i)Patient Name:[^\S\n]*(.*)");

re!(re_dob_strict, &format!(r"DOB:\s*({})", ExtractionPreset::Strict.date_pattern()));
re!(re_dob_flexible, &format!(r"DOB:\s*({})", ExtractionPreset::Flexible.date_pattern()));
re!(re_visit_date_strict, &format!(r"Date:\s*({})", ExtractionPreset::Strict.date_pattern()));
re!(re_visit_date_flexible, &format!(r"Date:\s*({})", ExtractionPreset::Flexible.date_pattern()));

re!(re_injection, r"(?i)INJECTION:\s*YES");
re!(re_exercise_therapy, r"(?i)Exercise Therapy:\s*YES");

re!(re_pain, r"Pain:\s*(\d+)");
re!(re_numbness, r"Numbness:\s*(\d+)");
re!(re_tingling, r"Tingling:\s*(\d+)");
re!(re_burning, r"Burning:\s*(\d+)");
re!(re_tightness, r"Tightness:\s*(\d+)");

fn re_symptom(symptom: Symptom) -> &'static Regex {
    match symptom {
        Symptom::Pain => re_pain(),
        Symptom::Numbness => re_numbness(),
        Symptom::Tingling => re_tingling(),
        Symptom::Burning => re_burning(),
        Symptom::Tightness => re_tightness(),
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

/// Extract fields with the default (flexible) preset.
pub fn extract_fields(raw_text: &str) -> FormRecord {
    Extractor::default().extract(raw_text)
}

/// Applies the label-anchored field rules to raw OCR text.
///
/// Every rule is independent; a rule that finds nothing falls back to its
/// default and never fails the whole record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    preset: ExtractionPreset,
}

impl Extractor {
    pub fn new(preset: ExtractionPreset) -> Self {
        Self { preset }
    }

    pub fn preset(&self) -> ExtractionPreset {
        self.preset
    }

    /// Extract a [`FormRecord`] from raw OCR text.
    pub fn extract(&self, ocr_text: &str) -> FormRecord {
        let (dob_re, date_re) = match self.preset {
            ExtractionPreset::Strict => (re_dob_strict(), re_visit_date_strict()),
            ExtractionPreset::Flexible => (re_dob_flexible(), re_visit_date_flexible()),
        };

        let symptoms = Symptom::ALL.into_iter().fold(Symptoms::default(), |acc, symptom| {
            acc.with(symptom, extract_severity(ocr_text, symptom))
        });

        FormRecord {
            patient_name: extract_patient_name(ocr_text),
            date_of_birth: capture_or_unknown(dob_re, ocr_text, "dob"),
            visit_date: capture_or_unknown(date_re, ocr_text, "date"),
            injection_given: re_injection().is_match(ocr_text),
            exercise_therapy_given: re_exercise_therapy().is_match(ocr_text),
            symptoms,
        }
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

fn extract_patient_name(text: &str) -> String {
    let name = re_patient_name()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty());
    match name {
        Some(name) => name.to_string(),
        None => {
            tracing::debug!(field = "patient_name", "No match, using default");
            UNKNOWN.to_string()
        }
    }
}

fn capture_or_unknown(re: &Regex, text: &str, field: &'static str) -> String {
    match re.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => {
            tracing::debug!(field, "No match, using default");
            UNKNOWN.to_string()
        }
    }
}

/// First `<Label>: <digits>` occurrence; 0 when absent, non-numeric or out of range.
fn extract_severity(text: &str, symptom: Symptom) -> i64 {
    re_symptom(symptom)
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
        .unwrap_or_else(|| {
            tracing::debug!(field = symptom.key(), "No severity, using 0");
            0
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
