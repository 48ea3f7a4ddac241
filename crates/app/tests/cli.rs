//! CLI test cases.
//!
//! Real OCR engines are not assumed to be installed. The end-to-end case
//! stands in a tiny shell script for the `tesseract` executable.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use predicates::prelude::*;

/// Create a new `Command` with our binary, isolated from any user config.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("intake").unwrap();
    cmd.env_remove("INTAKE_CONFIG");
    cmd
}

fn write_scan(dir: &Path) -> PathBuf {
    let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, _| Luma([if x < 8 { 0 } else { 255 }]));
    let path = dir.join("jane_doe.png");
    DynamicImage::ImageLuma8(img).save(&path).unwrap();
    path
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_image_path_is_required() {
    cmd().assert().failure();
}

#[test]
fn test_missing_image_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .arg(dir.path().join("absent.png"))
        .arg("--db")
        .arg(dir.path().join("ocr_results.db"))
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load image"));
    assert!(!dir.path().join("ocr_results.db").exists());
}

#[test]
fn test_missing_engines_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    cmd()
        .arg(&scan)
        .arg("--db")
        .arg(dir.path().join("ocr_results.db"))
        .arg("--output-dir")
        .arg(dir.path())
        .arg("--tesseract-cmd")
        .arg("/nonexistent/tesseract")
        .arg("--easyocr-cmd")
        .arg("/nonexistent/easyocr")
        .assert()
        .failure()
        .stdout(predicate::str::contains("tesseract failed"))
        .stdout(predicate::str::contains("easyocr failed"))
        .stderr(predicate::str::contains("All OCR engines failed"));
}

#[test]
fn test_query_mode_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .arg("--query")
        .arg("--db")
        .arg(dir.path().join("ocr_results.db"))
        .write_stdin("1\n5\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Interactive Database Query"))
        .stdout(predicate::str::contains("No results found."));
}

#[cfg(unix)]
#[test]
fn test_end_to_end_with_stand_in_tesseract() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());

    let fake = dir.path().join("fake-tesseract");
    std::fs::write(
        &fake,
        "#!/bin/sh\ncat > /dev/null\nprintf 'Patient Name: Jane Doe\\nDOB: 04/02/1990\\nDate: 10/10/2024\\nINJECTION: YES\\nExercise Therapy: NO\\nPain: 5\\nNumbness: 0\\nTingling: 2\\nBurning: 0\\nTightness: 1\\n'\n",
    )
    .unwrap();
    std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = dir.path().join("intake.toml");
    std::fs::write(&config, "[easyocr]\nenabled = false\n").unwrap();

    let db = dir.path().join("ocr_results.db");
    cmd()
        .arg(&scan)
        .arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("--output-dir")
        .arg(dir.path())
        .arg("--tesseract-cmd")
        .arg(&fake)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"patient_name\": \"Jane Doe\""))
        .stdout(predicate::str::contains("row 1"));

    let json = std::fs::read_to_string(dir.path().join("jane_doe_tesseract.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "patient_name": "Jane Doe",
            "dob": "04/02/1990",
            "date": "10/10/2024",
            "injection": "Yes",
            "exercise_therapy": "No",
            "pain_symptoms": {"pain": 5, "numbness": 0, "tingling": 2, "burning": 0, "tightness": 1}
        })
    );
    assert!(!dir.path().join("jane_doe_easyocr.json").exists());

    // The stored row is visible through the query menu.
    cmd()
        .arg("--query")
        .arg("--db")
        .arg(&db)
        .write_stdin("2\n4\n5\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"(1, "Jane Doe", "04/02/1990", "10/10/2024", "Yes", "No", 5, 0, 2, 0, 1)"#,
        ));
}
