pub mod db;
pub mod json;

use thiserror::Error;

pub use db::{
    all_records, ensure_schema, records_with_pain_above, records_with_task_difficulty,
    run_read_only, save_record, QueryOutput,
};
pub use json::{json_output_path, load_json, save_json, to_pretty_json};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store has no '{0}' column")]
    MissingColumn(String),
}
