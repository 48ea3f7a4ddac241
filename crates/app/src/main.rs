use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context as _, Result};
use clap::Parser;
use intake_core::{Config, ExtractionPreset};
use intake_ocr::FormPipeline;
use tracing_subscriber::{filter::Directive, EnvFilter};

mod commands;
mod query;

/// Turn scanned clinical intake forms into structured records.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
Each enabled OCR engine reads the image separately. Every engine's result is
printed, appended to the SQLite store and written to
<output-dir>/<image>_<engine>.json.

Environment Variables:
  - INTAKE_CONFIG (optional): Path to a TOML configuration file.
  - RUST_LOG (optional): Log filter, e.g. `debug` or `intake_ocr=debug`.
"#
)]
struct Opts {
    /// Scanned intake form to process.
    #[clap(required_unless_present = "query")]
    image_path: Option<PathBuf>,

    /// Open the interactive, read-only query menu over the store.
    #[clap(long)]
    query: bool,

    /// TOML configuration file.
    #[clap(long, env = "INTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path.
    #[clap(long)]
    db: Option<PathBuf>,

    /// Directory for the per-engine JSON files.
    #[clap(long)]
    output_dir: Option<PathBuf>,

    /// Extraction preset: `strict` or `flexible`.
    #[clap(long)]
    preset: Option<ExtractionPreset>,

    /// Path to the `tesseract` executable.
    #[clap(long)]
    tesseract_cmd: Option<PathBuf>,

    /// Path to the `easyocr` executable.
    #[clap(long)]
    easyocr_cmd: Option<PathBuf>,
}

impl Opts {
    /// Load the configuration file (explicit, or the per-user default if it
    /// exists) and apply command line overrides on top.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Could not load configuration {}", path.display()))?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Config::load(&path)
                    .with_context(|| format!("Could not load configuration {}", path.display()))?,
                None => Config::default(),
            },
        };

        if let Some(db) = &self.db {
            config.database_path = db.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(preset) = self.preset {
            config.preset = preset;
        }
        if let Some(cmd) = &self.tesseract_cmd {
            config.tesseract.command = cmd.clone();
        }
        if let Some(cmd) = &self.easyocr_cmd {
            config.easyocr.command = cmd.clone();
        }
        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "intake", "intake")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the extracted records.
    let directive = Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    tracing::debug!("Parsed options: {:?}", opts);

    let config = opts.resolve_config()?;

    if opts.query {
        let stdin = std::io::stdin();
        return query::interactive(&config.database_path, stdin.lock(), std::io::stdout()).await;
    }

    let image_path = opts
        .image_path
        .as_deref()
        .context("An image path is required unless --query is given")?;
    let pipeline = FormPipeline::from_config(&config)?;
    let summary =
        commands::process_image(&pipeline, &config, image_path, &mut std::io::stdout()).await?;

    tracing::info!(
        records = summary.records,
        db_failures = summary.db_failures,
        file_failures = summary.file_failures,
        "Run complete"
    );
    if summary.records == 0 {
        anyhow::bail!("All OCR engines failed for {}", image_path.display());
    }
    Ok(())
}
