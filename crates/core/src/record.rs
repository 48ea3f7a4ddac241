use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel for textual fields the extractor could not find.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symptom {
    Pain,
    Numbness,
    Tingling,
    Burning,
    Tightness,
}

impl Symptom {
    pub const ALL: [Symptom; 5] = [
        Symptom::Pain,
        Symptom::Numbness,
        Symptom::Tingling,
        Symptom::Burning,
        Symptom::Tightness,
    ];

    /// The label printed on the intake form, without the trailing colon.
    pub fn label(self) -> &'static str {
        match self {
            Symptom::Pain => "Pain",
            Symptom::Numbness => "Numbness",
            Symptom::Tingling => "Tingling",
            Symptom::Burning => "Burning",
            Symptom::Tightness => "Tightness",
        }
    }

    /// Column / JSON key name.
    pub fn key(self) -> &'static str {
        match self {
            Symptom::Pain => "pain",
            Symptom::Numbness => "numbness",
            Symptom::Tingling => "tingling",
            Symptom::Burning => "burning",
            Symptom::Tightness => "tightness",
        }
    }
}

impl fmt::Display for Symptom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Severity per symptom. Missing severities are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptoms {
    #[serde(default)]
    pub pain: i64,
    #[serde(default)]
    pub numbness: i64,
    #[serde(default)]
    pub tingling: i64,
    #[serde(default)]
    pub burning: i64,
    #[serde(default)]
    pub tightness: i64,
}

impl Symptoms {
    pub fn get(&self, symptom: Symptom) -> i64 {
        match symptom {
            Symptom::Pain => self.pain,
            Symptom::Numbness => self.numbness,
            Symptom::Tingling => self.tingling,
            Symptom::Burning => self.burning,
            Symptom::Tightness => self.tightness,
        }
    }

    /// Builder-style setter, used while a record is being assembled.
    pub fn with(mut self, symptom: Symptom, severity: i64) -> Self {
        match symptom {
            Symptom::Pain => self.pain = severity,
            Symptom::Numbness => self.numbness = severity,
            Symptom::Tingling => self.tingling = severity,
            Symptom::Burning => self.burning = severity,
            Symptom::Tightness => self.tightness = severity,
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symptom, i64)> + '_ {
        Symptom::ALL.into_iter().map(|s| (s, self.get(s)))
    }
}

/// The structured contents of one scanned intake form.
///
/// Every field is always populated: unmatched text fields hold [`UNKNOWN`],
/// unmatched flags are `false` and unmatched severities are 0. The serialized
/// form keeps the key names used by the persisted JSON files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    pub patient_name: String,
    #[serde(rename = "dob")]
    pub date_of_birth: String,
    #[serde(rename = "date")]
    pub visit_date: String,
    #[serde(rename = "injection", with = "yes_no")]
    pub injection_given: bool,
    #[serde(rename = "exercise_therapy", with = "yes_no")]
    pub exercise_therapy_given: bool,
    #[serde(rename = "pain_symptoms")]
    pub symptoms: Symptoms,
}

impl Default for FormRecord {
    fn default() -> Self {
        Self {
            patient_name: UNKNOWN.to_string(),
            date_of_birth: UNKNOWN.to_string(),
            visit_date: UNKNOWN.to_string(),
            injection_given: false,
            exercise_therapy_given: false,
            symptoms: Symptoms::default(),
        }
    }
}

/// A record read back from the relational store, with its row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: FormRecord,
}

impl fmt::Display for StoredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        let s = &r.symptoms;
        write!(
            f,
            "({}, {:?}, {:?}, {:?}, {:?}, {:?}, {}, {}, {}, {}, {})",
            self.id,
            r.patient_name,
            r.date_of_birth,
            r.visit_date,
            yes_no::render(r.injection_given),
            yes_no::render(r.exercise_therapy_given),
            s.pain,
            s.numbness,
            s.tingling,
            s.burning,
            s.tightness,
        )
    }
}

/// `bool` <-> `"Yes"` / `"No"`, as stored in JSON files and TEXT columns.
pub mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn render(value: bool) -> &'static str {
        if value { "Yes" } else { "No" }
    }

    /// Case-insensitive; anything other than "yes" reads as `false`.
    pub fn parse(value: &str) -> bool {
        value.trim().eq_ignore_ascii_case("yes")
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(render(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(parse(&s))
    }
}
