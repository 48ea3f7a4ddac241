use intake_core::FormRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::StoreError;

/// `<dir>/<image stem>_<backend>.json`
pub fn json_output_path(output_dir: &Path, image_path: &Path, backend: &str) -> PathBuf {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output_dir.join(format!("{stem}_{backend}.json"))
}

/// Render a record as JSON indented with four spaces.
pub fn to_pretty_json(record: &FormRecord) -> Result<String, StoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write `record` to `path`, replacing any existing file.
pub fn save_json(path: &Path, record: &FormRecord) -> Result<(), StoreError> {
    let body = to_pretty_json(record)?;
    std::fs::write(path, body)?;
    tracing::debug!(path = %path.display(), "Wrote JSON record");
    Ok(())
}

pub fn load_json(path: &Path) -> Result<FormRecord, StoreError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
