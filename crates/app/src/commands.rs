use std::io::Write;
use std::path::Path;

use anyhow::Result;
use intake_core::Config;
use intake_ocr::{FormPipeline, OcrResult};

/// Counts for one image run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Engines that produced a record.
    pub records: usize,
    pub db_failures: usize,
    pub file_failures: usize,
}

/// Run every enabled engine over `image_path`, print each result and persist
/// it to the store and to its JSON file.
///
/// Only an unreadable image aborts the run. The two sinks are independent:
/// a failed insert does not stop the JSON file from being written, and
/// vice versa.
pub async fn process_image(
    pipeline: &FormPipeline,
    config: &Config,
    image_path: &Path,
    out: &mut impl Write,
) -> Result<RunSummary> {
    let runs = pipeline.process_file(image_path)?;
    let mut summary = RunSummary::default();

    for run in runs {
        match run.outcome {
            Ok(result) => {
                summary.records += 1;
                let (db_ok, file_ok) = persist(&result, config, image_path, out).await?;
                if !db_ok {
                    summary.db_failures += 1;
                }
                if !file_ok {
                    summary.file_failures += 1;
                }
            }
            Err(e) => {
                writeln!(out, "\n{} failed: {e}", run.backend)?;
            }
        }
    }

    Ok(summary)
}

async fn persist(
    result: &OcrResult,
    config: &Config,
    image_path: &Path,
    out: &mut impl Write,
) -> Result<(bool, bool)> {
    let backend = result.backend;
    writeln!(out, "\n{backend} output:\n{}", result.ocr_text.trim_end())?;
    writeln!(
        out,
        "Structured data ({backend}):\n{}",
        intake_storage::to_pretty_json(&result.record)?
    )?;

    let db_ok = match intake_storage::save_record(&config.database_path, &result.record).await {
        Ok(id) => {
            writeln!(out, "Saved {backend} record to database (row {id}).")?;
            true
        }
        Err(e) => {
            tracing::error!(backend, db = %config.database_path.display(), "Could not save record: {e}");
            writeln!(out, "Could not save {backend} record to database: {e}")?;
            false
        }
    };

    let json_path = intake_storage::json_output_path(&config.output_dir, image_path, backend);
    let file_ok = match intake_storage::save_json(&json_path, &result.record) {
        Ok(()) => {
            writeln!(out, "Saved {backend} record to {}.", json_path.display())?;
            true
        }
        Err(e) => {
            tracing::error!(backend, path = %json_path.display(), "Could not write JSON: {e}");
            writeln!(out, "Could not write {}: {e}", json_path.display())?;
            false
        }
    };

    Ok((db_ok, file_ok))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use intake_ocr::{Extractor, MockRecognizer, OcrBackend, OcrError, OcrInput};
    use std::path::PathBuf;

    const FORM_TEXT: &str = "Patient Name: Jane Doe\nDOB: 04/02/1990\nDate: 10/10/2024\nINJECTION: YES\nExercise Therapy: NO\nPain: 5\nNumbness: 0\nTingling: 2\nBurning: 0\nTightness: 1";

    struct Broken;

    impl OcrBackend for Broken {
        fn name(&self) -> &'static str {
            "easyocr"
        }

        fn recognize(&self, _input: &OcrInput<'_>) -> Result<String, OcrError> {
            Err(OcrError::Engine("model download failed".into()))
        }
    }

    fn scan(dir: &Path) -> PathBuf {
        let img: GrayImage = ImageBuffer::from_fn(8, 8, |_, _| Luma([230u8]));
        let path = dir.join("intake_form.png");
        DynamicImage::ImageLuma8(img).save(&path).unwrap();
        path
    }

    fn config_in(dir: &Path) -> Config {
        Config {
            database_path: dir.join("ocr_results.db"),
            output_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn persists_each_engine_to_store_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let pipeline = FormPipeline::new(
            vec![
                Box::new(MockRecognizer::named("tesseract", FORM_TEXT)),
                Box::new(MockRecognizer::named("easyocr", "Patient Name: Jane Doe")),
            ],
            Extractor::default(),
        );

        let mut out = Vec::new();
        let summary = process_image(&pipeline, &config, &scan(dir.path()), &mut out)
            .await
            .unwrap();
        assert_eq!(summary, RunSummary { records: 2, db_failures: 0, file_failures: 0 });

        let tess = intake_storage::load_json(&dir.path().join("intake_form_tesseract.json")).unwrap();
        assert_eq!(tess, intake_ocr::extract_fields(FORM_TEXT));
        let easy = intake_storage::load_json(&dir.path().join("intake_form_easyocr.json")).unwrap();
        assert_eq!(easy.patient_name, "Jane Doe");
        assert_eq!(easy.symptoms.pain, 0);

        let rows = intake_storage::all_records(&config.database_path).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record, tess);

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("tesseract output:\nPatient Name: Jane Doe"));
        assert!(printed.contains("\"injection\": \"Yes\""));
    }

    #[tokio::test]
    async fn store_failure_does_not_block_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("missing_dir").join("ocr_results.db"),
            ..config_in(dir.path())
        };
        let pipeline = FormPipeline::new(
            vec![Box::new(MockRecognizer::named("tesseract", FORM_TEXT))],
            Extractor::default(),
        );

        let mut out = Vec::new();
        let summary = process_image(&pipeline, &config, &scan(dir.path()), &mut out)
            .await
            .unwrap();
        assert_eq!(summary, RunSummary { records: 1, db_failures: 1, file_failures: 0 });
        assert!(dir.path().join("intake_form_tesseract.json").exists());
    }

    #[tokio::test]
    async fn engine_failure_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let pipeline = FormPipeline::new(
            vec![Box::new(MockRecognizer::named("tesseract", FORM_TEXT)), Box::new(Broken)],
            Extractor::default(),
        );

        let mut out = Vec::new();
        let summary = process_image(&pipeline, &config, &scan(dir.path()), &mut out)
            .await
            .unwrap();
        assert_eq!(summary.records, 1);
        assert!(!dir.path().join("intake_form_easyocr.json").exists());
        assert!(String::from_utf8(out).unwrap().contains("easyocr failed: OCR engine error: model download failed"));
    }

    #[tokio::test]
    async fn unreadable_image_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let pipeline = FormPipeline::new(
            vec![Box::new(MockRecognizer::named("tesseract", FORM_TEXT))],
            Extractor::default(),
        );

        let mut out = Vec::new();
        let err = process_image(&pipeline, &config, &dir.path().join("nope.png"), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load image"));
        assert!(!config.database_path.exists());
    }
}
